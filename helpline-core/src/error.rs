use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelplineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// A JSON text column could not be decoded back into a structured value
    #[error("Failed to decode stored JSON field '{field}': {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode JSON field: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Voice service error: {0}")]
    Voice(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HelplineError>;
