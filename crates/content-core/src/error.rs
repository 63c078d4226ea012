use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API origin is not configured (set SAVENEWS_API_ORIGIN or [api].origin)")]
    MissingOrigin,
    #[error("Invalid API origin {origin:?}: {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },
    #[error("API origin must use http or https, got {0:?}")]
    UnsupportedScheme(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Upload response has no recognized URL field (file_url, url, image_url)")]
    MissingUrl,
    #[error("Upload failed: {0}")]
    Failed(String),
}
