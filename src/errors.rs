use thiserror::Error;

/// Errors from talking to the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Command execution error: {0}")]
    CommandExecution(String),

    #[error("Output parsing error: {0}")]
    OutputParsing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from talking to an image registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("No tags found for {0}")]
    NoTags(String),

    #[error("Registry did not return a digest for {0}")]
    MissingDigest(String),

    #[error("Registry authentication error: {0}")]
    Auth(String),

    #[error("Invalid image reference: {0}")]
    InvalidReference(#[from] crate::domain::image_ref::ImageRefError),
}

/// Errors that end an update-check run early. Per-container failures never
/// show up here, they are rows in the report.
#[derive(Debug, Error)]
pub enum UpdateCheckError {
    #[error("Failed to list containers: {0}")]
    ListContainers(#[source] RuntimeError),

    #[error("Update check cancelled before all containers were checked")]
    Cancelled,

    #[error("Update check deadline exceeded before all containers were checked")]
    DeadlineExceeded,
}

/// Errors surfaced by the command line front end.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Check(#[from] UpdateCheckError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}
