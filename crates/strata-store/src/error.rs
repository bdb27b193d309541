use std::path::PathBuf;

use strata_types::{FileId, Identity, ObjectIndex, ObjectType, TypeError};

/// How many matches a typed query accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    /// `one`: exactly one match.
    ExactlyOne,
    /// `one_opt`: zero or one match.
    AtMostOne,
    /// `root`: exactly one match without a parent.
    UniqueRoot,
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactlyOne => write!(f, "exactly one"),
            Self::AtMostOne => write!(f, "at most one"),
            Self::UniqueRoot => write!(f, "exactly one parentless"),
        }
    }
}

/// Errors from indexed file operations.
///
/// None of these are recoverable inside the store: a failed load or store
/// aborts the whole operation and the caller decides what to do next.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The header of `path` names a different file than the caller expected.
    #[error("file corruption detected: {path} stores file id {actual}, expected {expected}")]
    Corruption {
        path: PathBuf,
        expected: FileId,
        actual: FileId,
    },

    /// The file could not be opened, read, written or persisted.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The factory does not know how to allocate this type.
    #[error("unknown object type {object_type} for {identity}")]
    UnknownType {
        object_type: ObjectType,
        identity: Identity,
    },

    /// A typed query matched the wrong number of objects.
    #[error("query for {type_name} expected {expected} match, found {found}")]
    Cardinality {
        type_name: &'static str,
        expected: Cardinality,
        found: usize,
    },

    /// The byte stream could not be encoded or decoded.
    #[error("serialization error in {path}: {reason}")]
    Serialization { path: PathBuf, reason: String },

    /// A reference names a file that is not part of the load.
    #[error("reference from {path} to file {file_id}, which is not in the file table")]
    UnresolvedFile { path: PathBuf, file_id: FileId },

    /// Two different paths claim the same runtime file id.
    #[error("file id {file_id} is registered for {existing}, cannot also load {requested}")]
    FileIdConflict {
        file_id: FileId,
        existing: PathBuf,
        requested: PathBuf,
    },

    /// A reference points past the end of its file's object array.
    #[error("object index {index} out of range for file {file_id} with {len} objects")]
    IndexOutOfRange {
        file_id: FileId,
        index: ObjectIndex,
        len: usize,
    },

    /// A reference target exists but has the wrong type.
    #[error("object {identity} is not a {expected}")]
    TypeMismatch {
        identity: Identity,
        expected: &'static str,
    },

    /// A required reference was stored as null.
    #[error("null reference in {path} where an object was required")]
    NullReference { path: PathBuf },

    /// An object body does not start with the identity it was allocated under.
    #[error("identity mismatch in {path}: object table says {expected}, body says {actual}")]
    IdentityMismatch {
        path: PathBuf,
        expected: Identity,
        actual: Identity,
    },

    /// The object table is not a dense `[0, count)` array of this file's objects.
    #[error("invalid object table in {path}: {reason}")]
    InvalidObjectTable { path: PathBuf, reason: String },

    /// A reference was read before every file in the load had been allocated.
    #[error("reference in {path} read before the object shapes were allocated")]
    ShapesUnavailable { path: PathBuf },

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn from_bincode(path: impl Into<PathBuf>, err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(source) => Self::io(path, source),
            other => Self::Serialization {
                path: path.into(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
