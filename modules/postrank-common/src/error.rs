use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PostRankError {
    /// One bounded read for one post failed or timed out.
    #[error("Signal fetch error ({signal}): {message}")]
    SignalFetch {
        signal: &'static str,
        message: String,
    },

    #[error("Post evaluation error for {post_id}: {message}")]
    PostEvaluation { post_id: Uuid, message: String },

    #[error("Write-back error for {post_id}: {message}")]
    WriteBack { post_id: Uuid, message: String },

    #[error("Unauthorized: invalid job secret")]
    Unauthorized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
