use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("duplicate account")]
    Duplicate,

    #[error("storage error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound => "NOT_FOUND",
            StoreError::Duplicate => "DUPLICATE",
            StoreError::Database(_) => "STORAGE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
