use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Stable integer naming one physical database file.
///
/// Three values are reserved: [`FileId::MASTER`], [`FileId::ANALYSIS`] and
/// the [`FileId::NONE`] sentinel. Ordinary files are numbered upwards from
/// [`FileId::TU_FILES_BEGIN`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(i32);

impl FileId {
    /// "No file". Encodes a null object reference on disk.
    pub const NONE: Self = Self(-1);
    /// The master file.
    pub const MASTER: Self = Self(0);
    /// The analysis file.
    pub const ANALYSIS: Self = Self(1);
    /// First id handed out to ordinary files.
    pub const TU_FILES_BEGIN: Self = Self(2);

    /// Wrap a raw id.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Wrap a raw id, rejecting negative values other than the sentinel.
    pub fn try_new(raw: i32) -> TypeResult<Self> {
        if raw < -1 {
            return Err(TypeError::InvalidFileId(raw));
        }
        Ok(Self(raw))
    }

    /// The raw integer value.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Returns `true` for the [`FileId::NONE`] sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    /// Returns `true` for the master and analysis slots.
    pub const fn is_reserved(self) -> bool {
        self.0 == Self::MASTER.0 || self.0 == Self::ANALYSIS.0
    }

    /// The id following this one.
    pub fn next(self) -> TypeResult<Self> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or(TypeError::FileIdExhausted(self.0))
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => write!(f, "FileId(NONE)"),
            Self::MASTER => write!(f, "FileId(MASTER)"),
            Self::ANALYSIS => write!(f, "FileId(ANALYSIS)"),
            Self(raw) => write!(f, "FileId({raw})"),
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dense type tag naming the concrete object variant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType(i32);

impl ObjectType {
    /// "No type".
    pub const NONE: Self = Self(-1);

    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectType({})", self.0)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-based position of an object inside its file's object array.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectIndex(i32);

impl ObjectIndex {
    /// "No index".
    pub const NONE: Self = Self(-1);

    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Index for array position `position`.
    pub fn from_position(position: usize) -> TypeResult<Self> {
        i32::try_from(position)
            .map(Self)
            .map_err(|_| TypeError::IndexOverflow(position))
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    /// Array position, or `None` for negative indices.
    pub fn position(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Debug for ObjectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectIndex({})", self.0)
    }
}

impl fmt::Display for ObjectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_file_ids() {
        assert_eq!(FileId::NONE.get(), -1);
        assert_eq!(FileId::MASTER.get(), 0);
        assert_eq!(FileId::ANALYSIS.get(), 1);
        assert_eq!(FileId::TU_FILES_BEGIN.get(), 2);
        assert!(FileId::MASTER.is_reserved());
        assert!(FileId::ANALYSIS.is_reserved());
        assert!(!FileId::TU_FILES_BEGIN.is_reserved());
        assert!(FileId::NONE.is_none());
    }

    #[test]
    fn try_new_rejects_negative_ids() {
        assert_eq!(FileId::try_new(-1), Ok(FileId::NONE));
        assert_eq!(FileId::try_new(-5), Err(TypeError::InvalidFileId(-5)));
        assert_eq!(FileId::try_new(7), Ok(FileId::new(7)));
    }

    #[test]
    fn next_file_id() {
        assert_eq!(FileId::TU_FILES_BEGIN.next(), Ok(FileId::new(3)));
        assert_eq!(
            FileId::new(i32::MAX).next(),
            Err(TypeError::FileIdExhausted(i32::MAX))
        );
    }

    #[test]
    fn index_from_position() {
        assert_eq!(ObjectIndex::from_position(4), Ok(ObjectIndex::new(4)));
        assert_eq!(ObjectIndex::new(4).position(), Some(4));
        assert_eq!(ObjectIndex::NONE.position(), None);
        let too_big = i32::MAX as usize + 1;
        assert_eq!(
            ObjectIndex::from_position(too_big),
            Err(TypeError::IndexOverflow(too_big))
        );
    }

    #[test]
    fn debug_names_reserved_slots() {
        assert_eq!(format!("{:?}", FileId::MASTER), "FileId(MASTER)");
        assert_eq!(format!("{:?}", FileId::new(9)), "FileId(9)");
        assert_eq!(format!("{}", FileId::new(9)), "9");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&FileId::new(3)).unwrap();
        assert_eq!(json, "3");
        let back: ObjectType = serde_json::from_str("12").unwrap();
        assert_eq!(back, ObjectType::new(12));
    }
}
