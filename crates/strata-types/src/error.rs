use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("object index {0} does not fit in an i32")]
    IndexOverflow(usize),

    #[error("invalid file id {0}: negative ids other than the NONE sentinel are not allowed")]
    InvalidFileId(i32),

    #[error("file id space exhausted after {0}")]
    FileIdExhausted(i32),
}

pub type TypeResult<T> = Result<T, TypeError>;
