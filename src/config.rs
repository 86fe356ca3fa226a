//! Configuration module

use std::env;
use std::path::PathBuf;

/// Which model adapter serves predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    /// In-process model loaded from `MODEL_PATH`
    Local,
    /// HTTP forwarding to `MODEL_BASE_URL`
    Remote,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Service name reported at startup
    pub app_name: String,

    /// Version reported by the health endpoint
    pub app_version: String,

    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Model adapter selection
    pub model_backend: ModelBackend,

    /// Base URL of the remote model service
    pub model_base_url: String,

    /// Directory holding `best_model.*`, `features.json`, `scaler_params.json`
    pub model_path: PathBuf,

    /// Version tag stamped on every prediction
    pub model_version: String,

    /// Number of attribution pairs kept per prediction
    pub attribution_top_k: usize,

    /// Simulated duration of a training job
    pub training_duration_secs: u64,

    /// Object storage
    pub storage: StorageConfig,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Maximum upload size in bytes
    pub max_file_size: usize,

    /// Allowed upload extensions (lowercase, with leading dot)
    pub allowed_file_types: Vec<String>,

    /// Emit JSON log lines instead of the pretty formatter
    pub json_logs: bool,
}

/// S3-compatible object storage settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub secure: bool,
    pub bucket_datasets: String,
    pub bucket_feedback: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "ExoQuest Platform API"),
            app_version: env_or("APP_VERSION", "1.0.0"),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 8000),
            environment: env_or("ENVIRONMENT", "development"),

            model_backend: match env_or("MODEL_BACKEND", "local").to_lowercase().as_str() {
                "remote" => ModelBackend::Remote,
                _ => ModelBackend::Local,
            },
            model_base_url: env_or("MODEL_BASE_URL", "http://localhost:8001"),
            model_path: PathBuf::from(env_or("MODEL_PATH", "models")),
            model_version: env_or("MODEL_VERSION", "v1.0.0"),
            attribution_top_k: env_parse("ATTRIBUTION_TOP_K", 5),
            training_duration_secs: env_parse("TRAINING_DURATION_SECS", 45),

            storage: StorageConfig {
                endpoint: env_or("MINIO_ENDPOINT", "localhost:9000"),
                access_key: env_or("MINIO_ACCESS_KEY", "minioadmin"),
                secret_key: env_or("MINIO_SECRET_KEY", "minioadmin"),
                region: env_or("MINIO_REGION", "us-east-1"),
                secure: env_parse("MINIO_SECURE", false),
                bucket_datasets: env_or("MINIO_BUCKET_DATASETS", "datasets"),
                bucket_feedback: env_or("MINIO_BUCKET_FEEDBACK", "feedback"),
            },

            cors_origins: split_list(&env_or(
                "CORS_ORIGINS",
                "http://localhost:5173,http://localhost:3000",
            )),
            max_file_size: env_parse("MAX_FILE_SIZE", 100 * 1024 * 1024),
            allowed_file_types: split_list(&env_or("ALLOWED_FILE_TYPES", ".csv,.json,.txt"))
                .into_iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            json_logs: env_or("LOG_FORMAT", "pretty").eq_ignore_ascii_case("json"),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "ExoQuest Platform API".to_string(),
            app_version: "1.0.0".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: "development".to_string(),
            model_backend: ModelBackend::Local,
            model_base_url: "http://localhost:8001".to_string(),
            model_path: PathBuf::from("models"),
            model_version: "v1.0.0".to_string(),
            attribution_top_k: 5,
            training_duration_secs: 45,
            storage: StorageConfig::default(),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            max_file_size: 100 * 1024 * 1024,
            allowed_file_types: vec![".csv".to_string(), ".json".to_string(), ".txt".to_string()],
            json_logs: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            secure: false,
            bucket_datasets: "datasets".to_string(),
            bucket_feedback: "feedback".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_and_skips_empty() {
        assert_eq!(
            split_list(" .csv, .json,,.txt "),
            vec![".csv".to_string(), ".json".to_string(), ".txt".to_string()]
        );
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.attribution_top_k, 5);
        assert_eq!(config.model_backend, ModelBackend::Local);
        assert!(!config.is_production());
    }
}
