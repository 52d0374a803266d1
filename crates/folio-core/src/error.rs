use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid tile configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Page {0} not in cache")]
    UnknownPage(u32),

    #[error("Unknown size mode: {0}")]
    UnknownMode(String),

    #[error("Render failed for page {page}: {message}")]
    RenderFailure { page: u32, message: String },

    #[error("Observer callback failed: {0}")]
    ObserverCallbackFailure(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn render_failure(page: u32, msg: impl Into<String>) -> Self {
        Self::RenderFailure {
            page,
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
