//! Dataset handlers

use axum::{
    extract::{Multipart, Path, State},
    Json,
};

use crate::models::{Dataset, DatasetContent};
use crate::{AppError, AppResult, AppState};

/// Multipart upload; the file is read from the `file` field
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<Dataset>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Uploaded file has no name".to_string()))?;
        state.datasets.check_filename(&filename)?;

        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let dataset = state
            .datasets
            .upload(&filename, data.to_vec(), content_type.as_deref())
            .await?;
        return Ok(Json(dataset));
    }

    Err(AppError::Unprocessable("Missing multipart field: file".to_string()))
}

/// List uploaded datasets
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Dataset>>> {
    let datasets = state.datasets.list().await?;
    Ok(Json(datasets))
}

/// Dataset content as text
pub async fn content(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> AppResult<Json<DatasetContent>> {
    let content = state.datasets.content(&dataset_id).await?;
    Ok(Json(DatasetContent { dataset_id, content }))
}
