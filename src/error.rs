use thiserror::Error;

pub mod exit_codes {
    pub const OPERATION_FAILED: i32 = 1;
    pub const USER_ERROR: i32 = 2;
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(char),

    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_)
            | Error::InvalidCatalog(_)
            | Error::UnknownCategory(_)
            | Error::UnknownTask(_) => exit_codes::USER_ERROR,

            Error::Storage(_) | Error::Json(_) | Error::Io(_) => exit_codes::OPERATION_FAILED,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
