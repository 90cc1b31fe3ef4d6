use thiserror::Error;

use super::types::PageId;

/// Storage engine error types
#[derive(Error, Debug)]
pub enum MinirelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no free buffer available in buffer pool")]
    NoFreeBuffer,

    #[error("duplicate key")]
    DuplicateKey,

    #[error("invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("corrupted node page: {0}")]
    Corrupted(String),

    #[error("pair of {size} bytes cannot fit a node page (max {max})")]
    PairTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, MinirelError>;
