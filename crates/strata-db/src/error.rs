use std::path::PathBuf;

use strata_store::StoreError;
use strata_types::{FileId, Identity, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("database already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("file name already in manifest: {0}")]
    DuplicateFile(String),

    #[error("file id {0} is already in use")]
    FileIdInUse(FileId),

    #[error("file id {0} is not a reserved id")]
    NotReserved(FileId),

    #[error("file id {0} is not part of the database")]
    UnknownFile(FileId),

    #[error("file {path} was loaded as {file_id} but is not listed in the manifest")]
    UnlistedFile { file_id: FileId, path: PathBuf },

    #[error("object not found: {0}")]
    ObjectNotFound(Identity),
}

impl DbError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
