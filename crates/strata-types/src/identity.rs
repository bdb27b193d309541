use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{FileId, ObjectIndex, ObjectType};

/// Permanent address of a persisted object.
///
/// An `Identity` is fixed when the object is constructed and never changes
/// afterwards. The `(file_id, index)` pair is unique across a loaded
/// database; `object_type` tells the factory which concrete variant to
/// allocate for that slot.
///
/// Identities order by file, then index. The type only breaks ties, which
/// cannot happen between two objects of one consistent database.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    object_type: ObjectType,
    file_id: FileId,
    index: ObjectIndex,
}

impl Identity {
    /// The unset identity.
    pub const NONE: Self = Self {
        object_type: ObjectType::NONE,
        file_id: FileId::NONE,
        index: ObjectIndex::NONE,
    };

    pub const fn new(object_type: ObjectType, file_id: FileId, index: ObjectIndex) -> Self {
        Self {
            object_type,
            file_id,
            index,
        }
    }

    pub const fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub const fn file_id(&self) -> FileId {
        self.file_id
    }

    pub const fn index(&self) -> ObjectIndex {
        self.index
    }

    /// The `(file, index)` pair that locates the object.
    pub const fn address(&self) -> (FileId, ObjectIndex) {
        (self.file_id, self.index)
    }

    /// Returns `true` when no component is a sentinel.
    pub const fn is_valid(&self) -> bool {
        !self.object_type.is_none() && !self.file_id.is_none() && self.index.get() >= 0
    }

    /// The same object as seen under a different file numbering.
    ///
    /// Used when a file written under one FileID is loaded under another;
    /// the original identity is left untouched.
    pub const fn relocated(&self, file_id: FileId) -> Self {
        Self {
            object_type: self.object_type,
            file_id,
            index: self.index,
        }
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.file_id
            .cmp(&other.file_id)
            .then(self.index.cmp(&other.index))
            .then(self.object_type.cmp(&other.object_type))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.object_type, self.file_id, self.index)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::NONE
    }
}
