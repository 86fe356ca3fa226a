//! JSON body extractor with field validation

use axum::extract::{rejection::JsonRejection, FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::AppError;

/// `Json<T>` that also runs `T::validate()`; both failures are a 422
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

fn describe(errors: &ValidationErrors) -> String {
    let mut messages = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{}: invalid value ({})", field, e.code),
            })
        })
        .collect::<Vec<_>>();
    messages.sort();
    messages.join("; ")
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| AppError::Unprocessable(e.body_text()))?;

        value
            .validate()
            .map_err(|e| AppError::Unprocessable(describe(&e)))?;

        Ok(ValidatedJson(value))
    }
}
