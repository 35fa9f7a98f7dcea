use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForgeErr>;

#[derive(Debug, Error)]
pub enum ForgeErr {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("invalid build id `{0}`: use up to 64 ASCII letters, digits, `-` or `_`")]
    InvalidBuildId(String),

    #[error("no files to fix")]
    EmptyTree,

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure of a single language-model call. Always recovered by the caller.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("model returned an empty response")]
    Empty,

    #[error("model client error: {0}")]
    Client(#[from] forge_model_client::ClientError),

    #[error("{0}")]
    Other(String),
}
