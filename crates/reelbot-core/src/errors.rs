/// Core error type for the relay bot.
///
/// Adapter crates should map their specific errors into this type so the core can
/// handle failures consistently. Download failures are *not* reported through this
/// type: they are classified into [`crate::download::ClassifiedError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
