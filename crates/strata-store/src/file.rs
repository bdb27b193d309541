use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use strata_types::{FileId, Identity, ObjectIndex, ObjectType};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::factory::ObjectFactory;
use crate::loader::{Loader, ShapeTable};
use crate::object::IndexedObject;
use crate::storer::Storer;

/// One row of a file's dependency table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub file_id: FileId,
    pub path: PathBuf,
}

/// Every loaded file of one load operation, keyed by runtime file id.
pub type FileMap = BTreeMap<FileId, IndexedFile>;

/// Header and object table of a database file, read without building objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub file_id: FileId,
    pub files: Vec<FileEntry>,
    pub identities: Vec<Identity>,
}

impl FileHeader {
    /// Number of objects per type tag.
    pub fn type_histogram(&self) -> BTreeMap<ObjectType, usize> {
        let mut histogram = BTreeMap::new();
        for identity in &self.identities {
            *histogram.entry(identity.object_type()).or_insert(0) += 1;
        }
        histogram
    }
}

/// The object array of one database file.
///
/// On disk a file is its own id, the dependency table, the identity of
/// every object and then every object body. Loading is split to match:
/// [`LoadContext::begin_loading_file`] reads everything up to the bodies
/// and allocates shapes, [`LoadContext::end_loading`] patches the bodies
/// once every file of the load has its shapes.
pub struct IndexedFile {
    path: PathBuf,
    file_id: FileId,
    stored_file_id: FileId,
    files: Vec<FileEntry>,
    objects: Vec<Box<dyn IndexedObject>>,
    loader: Option<Loader>,
}

impl IndexedFile {
    /// An empty file that has never been stored.
    pub fn new(path: impl Into<PathBuf>, file_id: FileId) -> Self {
        Self {
            path: path.into(),
            file_id,
            stored_file_id: file_id,
            files: Vec::new(),
            objects: Vec::new(),
            loader: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id this file is registered under.
    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Id found in the file's header; differs from [`file_id`](Self::file_id)
    /// when the file was remapped on load.
    pub fn stored_file_id(&self) -> FileId {
        self.stored_file_id
    }

    /// Dependency table as stored.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether Phase B has yet to run for this file.
    pub fn is_pending(&self) -> bool {
        self.loader.is_some()
    }

    pub fn objects(&self) -> &[Box<dyn IndexedObject>] {
        &self.objects
    }

    pub fn get(&self, index: ObjectIndex) -> Option<&dyn IndexedObject> {
        let position = index.position()?;
        self.objects.get(position).map(|object| object.as_ref())
    }

    pub fn get_mut(&mut self, index: ObjectIndex) -> Option<&mut dyn IndexedObject> {
        let position = index.position()?;
        self.objects.get_mut(position).map(dyn_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn IndexedObject> + '_ {
        self.objects.iter().map(|object| object.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut dyn IndexedObject> + '_ {
        self.objects.iter_mut().map(dyn_mut)
    }

    /// Type tag of every object, in index order.
    pub fn object_types(&self) -> Vec<ObjectType> {
        self.objects
            .iter()
            .map(|object| object.identity().object_type())
            .collect()
    }

    /// Index the next appended object must carry.
    pub fn next_index(&self) -> StoreResult<ObjectIndex> {
        Ok(ObjectIndex::from_position(self.objects.len())?)
    }

    /// Append a newly constructed object.
    pub fn push(&mut self, object: Box<dyn IndexedObject>) -> StoreResult<()> {
        let identity = object.identity();
        let expected = self.next_index()?;
        if identity.file_id() != self.file_id || identity.index() != expected {
            return Err(StoreError::InvalidObjectTable {
                path: self.path.clone(),
                reason: format!(
                    "object {identity} appended at slot {expected} of file {}",
                    self.file_id
                ),
            });
        }
        self.objects.push(object);
        Ok(())
    }

    /// Read only the id stored in the header of `path`.
    pub fn read_file_id(path: &Path) -> StoreResult<FileId> {
        Loader::open(path)?.load()
    }

    /// Read the header and object table of `path` without allocating objects.
    pub fn read_header(path: &Path) -> StoreResult<FileHeader> {
        let mut loader = Loader::open(path)?;
        let file_id = loader.load()?;
        let files = read_file_table(&mut loader)?;
        let count = loader.load_count()?;
        let mut identities = Vec::with_capacity(count.min(TABLE_PREALLOCATION));
        for _ in 0..count {
            identities.push(loader.load_identity()?);
        }
        Ok(FileHeader {
            file_id,
            files,
            identities,
        })
    }

    /// Load `path` and its whole dependency closure into `ctx`.
    ///
    /// Phase A runs for every file of the closure before Phase B runs for
    /// any of them. Returns the runtime id `path` was registered under. On
    /// error, every file this call registered is removed from `ctx` again.
    pub fn load(ctx: &mut LoadContext<'_>, path: &Path, file_id: FileId) -> StoreResult<FileId> {
        let before = ctx.registered();
        let result = ctx
            .begin_loading_file(path, file_id)
            .and_then(|runtime| ctx.end_loading().map(|()| runtime));
        if result.is_err() {
            ctx.discard_since(&before);
        }
        result
    }

    /// Write `objects` as file `file_id` at `path`.
    ///
    /// `files` is the dependency table; every file a stored reference points
    /// into must be `file_id` itself or appear in it. Object `i` must carry
    /// `(file_id, i)`. Returns the number of bytes written.
    pub fn store(
        path: &Path,
        file_id: FileId,
        files: &BTreeMap<FileId, PathBuf>,
        objects: &[Box<dyn IndexedObject>],
    ) -> StoreResult<u64> {
        for (position, object) in objects.iter().enumerate() {
            let identity = object.identity();
            if identity.file_id() != file_id || identity.index().position() != Some(position) {
                return Err(StoreError::InvalidObjectTable {
                    path: path.to_path_buf(),
                    reason: format!("object {identity} stored at slot {position} of file {file_id}"),
                });
            }
        }

        let mut storer = Storer::create(path)?;
        storer.store(&file_id)?;
        storer.store_count(files.len())?;
        for (id, file_path) in files {
            storer.store(id)?;
            storer.store(file_path.as_path())?;
        }
        storer.store_count(objects.len())?;
        for object in objects {
            storer.store_identity(object.identity())?;
        }
        for object in objects {
            object.store(&mut storer)?;
        }

        if let Some(&missing) = storer
            .referenced_files()
            .iter()
            .find(|&&id| id != file_id && !files.contains_key(&id))
        {
            return Err(StoreError::UnresolvedFile {
                path: path.to_path_buf(),
                file_id: missing,
            });
        }

        let size = storer.finish()?;
        debug!(path = %path.display(), file_id = %file_id, objects = objects.len(), bytes = size, "stored file");
        Ok(size)
    }

    /// Phase A: read everything up to the object bodies and allocate shapes.
    fn begin_load(ctx: &LoadContext<'_>, path: &Path, expected: FileId, runtime: FileId) -> StoreResult<Self> {
        let mut loader = Loader::open(path)?;
        let stored: FileId = loader.load()?;
        if stored != expected {
            return Err(StoreError::Corruption {
                path: path.to_path_buf(),
                expected,
                actual: stored,
            });
        }
        let files = read_file_table(&mut loader)?;

        let mut translation = BTreeMap::new();
        translation.insert(stored, runtime);
        for entry in &files {
            let resolved = ctx.resolve_path(&entry.path);
            translation
                .entry(entry.file_id)
                .or_insert_with(|| ctx.runtime_id(&resolved, entry.file_id));
        }
        loader.set_translation(translation);

        let count = loader.load_count()?;
        let mut slots: Vec<Option<Box<dyn IndexedObject>>> = Vec::new();
        slots.resize_with(count.min(TABLE_PREALLOCATION), || None);
        for _ in 0..count {
            let identity = loader.load_identity()?;
            let position = identity
                .index()
                .position()
                .filter(|&position| position < count && identity.file_id() == runtime)
                .ok_or_else(|| StoreError::InvalidObjectTable {
                    path: path.to_path_buf(),
                    reason: format!("object {identity} does not belong in file {runtime} with {count} objects"),
                })?;
            if position >= slots.len() {
                slots.resize_with(position + 1, || None);
            }
            if slots[position].is_some() {
                return Err(StoreError::InvalidObjectTable {
                    path: path.to_path_buf(),
                    reason: format!("slot {position} is occupied twice"),
                });
            }
            slots[position] = Some(ctx.factory.create(identity)?);
        }

        let objects = slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.ok_or_else(|| StoreError::InvalidObjectTable {
                    path: path.to_path_buf(),
                    reason: format!("slot {position} is empty"),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        if objects.len() != count {
            return Err(StoreError::InvalidObjectTable {
                path: path.to_path_buf(),
                reason: format!("{} of {count} slots filled", objects.len()),
            });
        }

        debug!(path = %path.display(), file_id = %runtime, objects = count, "allocated file");
        Ok(Self {
            path: path.to_path_buf(),
            file_id: runtime,
            stored_file_id: stored,
            files,
            objects,
            loader: Some(loader),
        })
    }

    /// Phase B: patch every object body. A no-op once done.
    fn end_load(&mut self, shapes: &Arc<ShapeTable>) -> StoreResult<()> {
        let Some(mut loader) = self.loader.take() else {
            return Ok(());
        };
        loader.set_shapes(Arc::clone(shapes));
        for object in &mut self.objects {
            object.load(&mut loader)?;
        }
        if !loader.is_exhausted()? {
            return Err(StoreError::Serialization {
                path: self.path.clone(),
                reason: "trailing bytes after the last object".into(),
            });
        }
        debug!(path = %self.path.display(), file_id = %self.file_id, "patched file");
        Ok(())
    }
}

fn dyn_mut(object: &mut Box<dyn IndexedObject>) -> &mut dyn IndexedObject {
    object.as_mut()
}

/// Upper bound on slots reserved from an untrusted object count.
const TABLE_PREALLOCATION: usize = 1 << 16;

fn read_file_table(loader: &mut Loader) -> StoreResult<Vec<FileEntry>> {
    let count = loader.load_count()?;
    let mut files = Vec::with_capacity(count.min(TABLE_PREALLOCATION));
    for _ in 0..count {
        let file_id = loader.load()?;
        let path = loader.load()?;
        files.push(FileEntry { file_id, path });
    }
    Ok(files)
}

impl fmt::Debug for IndexedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedFile")
            .field("path", &self.path)
            .field("file_id", &self.file_id)
            .field("stored_file_id", &self.stored_file_id)
            .field("files", &self.files)
            .field("objects", &self.objects.len())
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// State of one load operation.
///
/// Owns the file map and borrows the factory for exactly as long as the
/// load runs. Nothing is shared between two contexts.
pub struct LoadContext<'f> {
    factory: &'f dyn ObjectFactory,
    files: FileMap,
    base_dir: Option<PathBuf>,
    runtime_ids: BTreeMap<PathBuf, FileId>,
    stored_ids: BTreeMap<PathBuf, FileId>,
}

impl<'f> LoadContext<'f> {
    pub fn new(factory: &'f dyn ObjectFactory) -> Self {
        Self {
            factory,
            files: FileMap::new(),
            base_dir: None,
            runtime_ids: BTreeMap::new(),
            stored_ids: BTreeMap::new(),
        }
    }

    /// Resolve relative file-table paths against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Register the file at `path` under `file_id`, whatever id it was stored under.
    pub fn map_file(&mut self, path: impl Into<PathBuf>, file_id: FileId) -> &mut Self {
        self.runtime_ids.insert(path.into(), file_id);
        self
    }

    /// Expect `file_id` in the header of the file at `path`, whatever id the
    /// dependency tables of other files list it under.
    pub fn expect_stored_id(&mut self, path: impl Into<PathBuf>, file_id: FileId) -> &mut Self {
        self.stored_ids.insert(path.into(), file_id);
        self
    }

    /// Builder form of [`map_file`](Self::map_file).
    pub fn with_runtime_id(mut self, path: impl Into<PathBuf>, file_id: FileId) -> Self {
        self.map_file(path, file_id);
        self
    }

    pub fn files(&self) -> &FileMap {
        &self.files
    }

    pub fn into_files(self) -> FileMap {
        self.files
    }

    /// `path` as it will be opened.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Runtime id for the file at resolved path `path`, stored as `stored`.
    pub fn runtime_id(&self, path: &Path, stored: FileId) -> FileId {
        self.runtime_ids
            .iter()
            .find(|(mapped, _)| self.resolve_path(mapped) == path)
            .map(|(_, &file_id)| file_id)
            .unwrap_or(stored)
    }

    /// Phase A for `path` and, recursively, every file in its table.
    ///
    /// `file_id` is the id the file must carry in its header, unless
    /// [`expect_stored_id`](Self::expect_stored_id) names another. A file that
    /// is already registered is not read again, which is also what ends
    /// dependency cycles. The file is registered before its dependencies
    /// are visited. Returns the runtime id. A failure anywhere in the
    /// closure leaves the context as it was before the call.
    pub fn begin_loading_file(&mut self, path: &Path, file_id: FileId) -> StoreResult<FileId> {
        let before = self.registered();
        let result = self.visit(path, file_id);
        if result.is_err() {
            self.discard_since(&before);
        }
        result
    }

    fn visit(&mut self, path: &Path, file_id: FileId) -> StoreResult<FileId> {
        let resolved = self.resolve_path(path);
        let file_id = self
            .stored_ids
            .iter()
            .find(|(expected, _)| self.resolve_path(expected) == resolved)
            .map_or(file_id, |(_, &stored)| stored);
        let runtime = self.runtime_id(&resolved, file_id);
        if let Some(existing) = self.files.get(&runtime) {
            if existing.path() != resolved {
                return Err(StoreError::FileIdConflict {
                    file_id: runtime,
                    existing: existing.path().to_path_buf(),
                    requested: resolved,
                });
            }
            return Ok(runtime);
        }

        let file = IndexedFile::begin_load(self, &resolved, file_id, runtime)?;
        let dependencies = file.files().to_vec();
        self.files.insert(runtime, file);

        for entry in dependencies {
            self.visit(&entry.path, entry.file_id)?;
        }
        Ok(runtime)
    }

    fn registered(&self) -> BTreeSet<FileId> {
        self.files.keys().copied().collect()
    }

    fn discard_since(&mut self, before: &BTreeSet<FileId>) {
        self.files.retain(|file_id, _| before.contains(file_id));
    }

    /// Phase B for every registered file that has not been patched yet.
    pub fn end_loading(&mut self) -> StoreResult<()> {
        let mut shapes = ShapeTable::new();
        for (&file_id, file) in &self.files {
            shapes.insert(file_id, file.object_types());
        }
        let shapes = Arc::new(shapes);
        for file in self.files.values_mut() {
            file.end_load(&shapes)?;
        }
        Ok(())
    }
}

impl fmt::Debug for LoadContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("base_dir", &self.base_dir)
            .field("runtime_ids", &self.runtime_ids)
            .field("stored_ids", &self.stored_ids)
            .finish()
    }
}
