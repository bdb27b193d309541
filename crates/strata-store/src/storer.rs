use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use strata_types::{FileId, Identity};
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};
use crate::object::ObjectRef;

enum Sink {
    File(BufWriter<NamedTempFile>),
    Memory(Vec<u8>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(writer) => writer.write(buf),
            Self::Memory(bytes) => bytes.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(writer) => writer.flush(),
            Self::Memory(_) => Ok(()),
        }
    }
}

/// Serialization sink for one database file.
///
/// Values are appended in bincode's fixed-width little-endian encoding, in
/// exactly the order they are stored; [`Loader`](crate::Loader) must read
/// them back in the same order. Object references are written as
/// `(file, index)` only, never as the referenced object's fields.
///
/// File-backed storers write to a temporary file next to the target and
/// only replace the target in [`finish`](Self::finish). Dropping a storer
/// without finishing leaves the target untouched.
pub struct Storer {
    path: PathBuf,
    sink: Sink,
    written: u64,
    referenced: BTreeSet<FileId>,
}

impl Storer {
    /// Start writing the file at `path`.
    pub fn create(path: &Path) -> StoreResult<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".strata-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| StoreError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            sink: Sink::File(BufWriter::new(temp)),
            written: 0,
            referenced: BTreeSet::new(),
        })
    }

    /// A storer that collects bytes in memory.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            sink: Sink::Memory(Vec::new()),
            written: 0,
            referenced: BTreeSet::new(),
        }
    }

    /// Target path of this storer.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Every file id that an object reference written so far points into.
    pub fn referenced_files(&self) -> &BTreeSet<FileId> {
        &self.referenced
    }

    /// Append a primitive value.
    pub fn store<T: Serialize + ?Sized>(&mut self, value: &T) -> StoreResult<()> {
        let size = bincode::serialized_size(value)
            .map_err(|e| StoreError::from_bincode(&self.path, e))?;
        bincode::serialize_into(&mut self.sink, value)
            .map_err(|e| StoreError::from_bincode(&self.path, e))?;
        self.written += size;
        Ok(())
    }

    /// Append a collection size prefix.
    pub fn store_count(&mut self, count: usize) -> StoreResult<()> {
        self.store(&(count as u64))
    }

    /// Append a presence flag, then the value if present.
    pub fn store_optional<T: Serialize>(&mut self, value: &Option<T>) -> StoreResult<()> {
        match value {
            Some(value) => {
                self.store(&true)?;
                self.store(value)
            }
            None => self.store(&false),
        }
    }

    /// Append an identity triple.
    pub fn store_identity(&mut self, identity: Identity) -> StoreResult<()> {
        self.store(&identity.object_type())?;
        self.store(&identity.file_id())?;
        self.store(&identity.index())
    }

    /// Append a required reference.
    pub fn store_object_ref<T: ?Sized>(&mut self, object: &ObjectRef<T>) -> StoreResult<()> {
        if object.file_id().is_none() {
            return Err(StoreError::NullReference {
                path: self.path.clone(),
            });
        }
        self.store(&object.file_id())?;
        self.store(&object.index())?;
        self.referenced.insert(object.file_id());
        Ok(())
    }

    /// Append an optional reference; `None` is written as a lone `FileId::NONE`.
    pub fn store_optional_ref<T: ?Sized>(&mut self, object: &Option<ObjectRef<T>>) -> StoreResult<()> {
        match object {
            Some(object) => self.store_object_ref(object),
            None => self.store(&FileId::NONE),
        }
    }

    pub fn store_object_vector<T: ?Sized>(&mut self, objects: &[ObjectRef<T>]) -> StoreResult<()> {
        self.store_count(objects.len())?;
        for object in objects {
            self.store_object_ref(object)?;
        }
        Ok(())
    }

    pub fn store_object_vector_vector<T: ?Sized>(
        &mut self,
        groups: &[Vec<ObjectRef<T>>],
    ) -> StoreResult<()> {
        self.store_count(groups.len())?;
        for group in groups {
            self.store_object_vector(group)?;
        }
        Ok(())
    }

    pub fn store_object_set<T: ?Sized>(&mut self, objects: &BTreeSet<ObjectRef<T>>) -> StoreResult<()> {
        self.store_count(objects.len())?;
        for object in objects {
            self.store_object_ref(object)?;
        }
        Ok(())
    }

    /// Append an object-to-object map as `(key ref, value ref)` pairs.
    pub fn store_object_map<K: ?Sized, V: ?Sized>(
        &mut self,
        objects: &BTreeMap<ObjectRef<K>, ObjectRef<V>>,
    ) -> StoreResult<()> {
        self.store_count(objects.len())?;
        for (key, value) in objects {
            self.store_object_ref(key)?;
            self.store_object_ref(value)?;
        }
        Ok(())
    }

    /// Append a value-to-object map as `(key value, value ref)` pairs.
    pub fn store_key_object_map<K: Serialize, V: ?Sized>(
        &mut self,
        objects: &BTreeMap<K, ObjectRef<V>>,
    ) -> StoreResult<()> {
        self.store_count(objects.len())?;
        for (key, value) in objects {
            self.store(key)?;
            self.store_object_ref(value)?;
        }
        Ok(())
    }

    /// Flush and atomically move the file into place. Returns the file size.
    pub fn finish(self) -> StoreResult<u64> {
        let Self {
            path, sink, written, ..
        } = self;
        match sink {
            Sink::File(writer) => {
                let temp = writer
                    .into_inner()
                    .map_err(|e| StoreError::io(&path, e.into_error()))?;
                temp.as_file()
                    .sync_all()
                    .map_err(|e| StoreError::io(&path, e))?;
                temp.persist(&path)
                    .map_err(|e| StoreError::io(&path, e.error))?;
            }
            Sink::Memory(_) => {}
        }
        Ok(written)
    }

    /// The bytes of an in-memory storer.
    pub fn into_bytes(self) -> StoreResult<Vec<u8>> {
        match self.sink {
            Sink::Memory(bytes) => Ok(bytes),
            Sink::File(_) => Err(StoreError::Serialization {
                path: self.path,
                reason: "storer is file-backed; use finish()".into(),
            }),
        }
    }
}

impl std::fmt::Debug for Storer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storer")
            .field("path", &self.path)
            .field("written", &self.written)
            .field("referenced", &self.referenced)
            .finish()
    }
}
