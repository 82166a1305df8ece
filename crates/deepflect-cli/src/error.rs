use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] deepflect_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Task ID cannot be empty")]
    EmptyTaskId,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Refusing to delete the account without --yes")]
    ConfirmationRequired,
    #[error("{0} of {1} uploads failed")]
    UploadsFailed(usize, usize),
}
