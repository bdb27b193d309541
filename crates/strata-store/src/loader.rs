use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bincode::Options;
use serde::de::DeserializeOwned;
use strata_types::{FileId, Identity, ObjectIndex, ObjectType};

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectRef, RefTarget};

/// Type tags of every allocated object, per runtime file id.
///
/// Built once Phase A has finished for the whole dependency closure. The
/// loader resolves references against this table instead of the live
/// objects, so patching one object never needs to borrow another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShapeTable {
    files: BTreeMap<FileId, Vec<ObjectType>>,
}

impl ShapeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the object types of `file_id`, in index order.
    pub fn insert(&mut self, file_id: FileId, types: Vec<ObjectType>) {
        self.files.insert(file_id, types);
    }

    /// Types of every object in `file_id`.
    pub fn file(&self, file_id: FileId) -> Option<&[ObjectType]> {
        self.files.get(&file_id).map(Vec::as_slice)
    }

    /// Number of files with allocated shapes.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Total number of allocated objects.
    pub fn object_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Deserialization source for one database file.
///
/// Mirrors [`Storer`](crate::Storer) call for call. Every file id read from
/// the file is translated from the id it was stored under to the id the
/// file is loaded under, so identities and references always name runtime
/// files.
pub struct Loader {
    path: PathBuf,
    source: Box<dyn Read + Send>,
    /// Bytes left in the source. Caps every length prefix decoded from it.
    remaining: u64,
    translation: BTreeMap<FileId, FileId>,
    shapes: Option<Arc<ShapeTable>>,
}

impl Loader {
    /// Open the file at `path` for reading.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let len = file.metadata().map_err(|e| StoreError::io(path, e))?.len();
        Ok(Self::from_reader(path, BufReader::new(file), len))
    }

    /// Read from an in-memory buffer; `label` is used in error messages.
    pub fn from_bytes(label: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        Self::from_reader(label, Cursor::new(bytes), len)
    }

    fn from_reader(path: impl Into<PathBuf>, source: impl Read + Send + 'static, len: u64) -> Self {
        Self {
            path: path.into(),
            source: Box::new(source),
            remaining: len,
            translation: BTreeMap::new(),
            shapes: None,
        }
    }

    /// Attach the shape table used to resolve references.
    pub fn with_shapes(mut self, shapes: Arc<ShapeTable>) -> Self {
        self.shapes = Some(shapes);
        self
    }

    /// Load file ids stored as `stored` under `runtime` instead.
    pub fn with_translation(mut self, stored: FileId, runtime: FileId) -> Self {
        self.translation.insert(stored, runtime);
        self
    }

    pub(crate) fn set_shapes(&mut self, shapes: Arc<ShapeTable>) {
        self.shapes = Some(shapes);
    }

    pub(crate) fn set_translation(&mut self, translation: BTreeMap<FileId, FileId>) {
        self.translation = translation;
    }

    /// Source path of this loader.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runtime id for a file id read from this file.
    pub fn translate(&self, stored: FileId) -> FileId {
        self.translation.get(&stored).copied().unwrap_or(stored)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read a primitive value.
    ///
    /// A value that claims more bytes than the file has left is rejected
    /// before anything is allocated for it.
    pub fn load<T: DeserializeOwned>(&mut self) -> StoreResult<T> {
        let mut bounded = (&mut self.source).take(self.remaining);
        let value = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(self.remaining)
            .deserialize_from(&mut bounded);
        self.remaining = bounded.limit();
        value.map_err(|e| StoreError::from_bincode(&self.path, e))
    }

    /// Read a collection size prefix.
    pub fn load_count(&mut self) -> StoreResult<usize> {
        let count: u64 = self.load()?;
        usize::try_from(count).map_err(|_| StoreError::Serialization {
            path: self.path.clone(),
            reason: format!("count {count} does not fit in memory"),
        })
    }

    /// Read a presence flag, then the value if present.
    pub fn load_optional<T: DeserializeOwned>(&mut self) -> StoreResult<Option<T>> {
        if self.load::<bool>()? {
            Ok(Some(self.load()?))
        } else {
            Ok(None)
        }
    }

    /// Read an identity triple, translated to the runtime file numbering.
    pub fn load_identity(&mut self) -> StoreResult<Identity> {
        let object_type: ObjectType = self.load()?;
        let file_id: FileId = self.load()?;
        let index: ObjectIndex = self.load()?;
        Ok(Identity::new(object_type, self.translate(file_id), index))
    }

    /// Read an identity triple and check it against `expected`.
    pub fn verify_identity(&mut self, expected: Identity) -> StoreResult<()> {
        let actual = self.load_identity()?;
        if actual != expected {
            return Err(StoreError::IdentityMismatch {
                path: self.path.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Read a required reference.
    pub fn load_object_ref<T: RefTarget + ?Sized>(&mut self) -> StoreResult<ObjectRef<T>> {
        self.load_optional_ref()?
            .ok_or_else(|| StoreError::NullReference {
                path: self.path.clone(),
            })
    }

    /// Read an optional reference.
    ///
    /// The target only has to be shape-allocated; its own fields may not
    /// have been loaded yet. That is what lets references run forwards and
    /// around cycles.
    pub fn load_optional_ref<T: RefTarget + ?Sized>(&mut self) -> StoreResult<Option<ObjectRef<T>>> {
        let stored: FileId = self.load()?;
        if stored.is_none() {
            return Ok(None);
        }
        let index: ObjectIndex = self.load()?;
        let file_id = self.translate(stored);

        let shapes = self.shapes.as_ref().ok_or_else(|| StoreError::ShapesUnavailable {
            path: self.path.clone(),
        })?;
        let types = shapes.file(file_id).ok_or_else(|| StoreError::UnresolvedFile {
            path: self.path.clone(),
            file_id,
        })?;
        let object_type = index
            .position()
            .and_then(|position| types.get(position))
            .copied()
            .ok_or(StoreError::IndexOutOfRange {
                file_id,
                index,
                len: types.len(),
            })?;

        let identity = Identity::new(object_type, file_id, index);
        if !T::accepts(object_type) {
            return Err(StoreError::TypeMismatch {
                identity,
                expected: T::TARGET_NAME,
            });
        }
        Ok(Some(ObjectRef::from_identity(identity)))
    }

    pub fn load_object_vector<T: RefTarget + ?Sized>(&mut self) -> StoreResult<Vec<ObjectRef<T>>> {
        let count = self.load_count()?;
        let mut objects = Vec::with_capacity(count.min(PREALLOCATION_LIMIT));
        for _ in 0..count {
            objects.push(self.load_object_ref()?);
        }
        Ok(objects)
    }

    pub fn load_object_vector_vector<T: RefTarget + ?Sized>(
        &mut self,
    ) -> StoreResult<Vec<Vec<ObjectRef<T>>>> {
        let count = self.load_count()?;
        let mut groups = Vec::with_capacity(count.min(PREALLOCATION_LIMIT));
        for _ in 0..count {
            groups.push(self.load_object_vector()?);
        }
        Ok(groups)
    }

    pub fn load_object_set<T: RefTarget + ?Sized>(&mut self) -> StoreResult<BTreeSet<ObjectRef<T>>> {
        let count = self.load_count()?;
        let mut objects = BTreeSet::new();
        for _ in 0..count {
            objects.insert(self.load_object_ref()?);
        }
        Ok(objects)
    }

    pub fn load_object_map<K: RefTarget + ?Sized, V: RefTarget + ?Sized>(
        &mut self,
    ) -> StoreResult<BTreeMap<ObjectRef<K>, ObjectRef<V>>> {
        let count = self.load_count()?;
        let mut objects = BTreeMap::new();
        for _ in 0..count {
            let key = self.load_object_ref()?;
            let value = self.load_object_ref()?;
            objects.insert(key, value);
        }
        Ok(objects)
    }

    pub fn load_key_object_map<K: DeserializeOwned + Ord, V: RefTarget + ?Sized>(
        &mut self,
    ) -> StoreResult<BTreeMap<K, ObjectRef<V>>> {
        let count = self.load_count()?;
        let mut objects = BTreeMap::new();
        for _ in 0..count {
            let key = self.load()?;
            let value = self.load_object_ref()?;
            objects.insert(key, value);
        }
        Ok(objects)
    }

    /// Returns `true` once every byte of the source has been consumed.
    pub fn is_exhausted(&mut self) -> StoreResult<bool> {
        let mut probe = [0u8; 1];
        loop {
            match self.source.read(&mut probe) {
                Ok(n) => return Ok(n == 0),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StoreError::io(&self.path, e)),
            }
        }
    }
}

/// Upper bound on capacity reserved from an untrusted count prefix.
const PREALLOCATION_LIMIT: usize = 1024;

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("path", &self.path)
            .field("translation", &self.translation)
            .field("has_shapes", &self.shapes.is_some())
            .finish()
    }
}
