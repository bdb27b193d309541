use std::path::Path;

use strata_store::{
    query, FileMap, HasParent, IndexedFile, IndexedObject, LoadContext, ObjectClass,
    ObjectFactory, ObjectRef, StoreError,
};
use strata_types::{FileId, Identity};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use crate::manifest::Manifest;

/// A loaded (or newly created) set of database files.
///
/// Objects are owned by their files; everything else refers to them by
/// [`ObjectRef`]. Iteration and queries visit objects in `(file, index)`
/// order.
pub struct Database {
    config: DatabaseConfig,
    manifest: Manifest,
    files: FileMap,
}

impl Database {
    /// Start an empty database in `config.root`.
    pub fn create(config: DatabaseConfig) -> DbResult<Self> {
        config.validate()?;
        let manifest_path = config.manifest_path();
        if manifest_path.exists() {
            return Err(DbError::AlreadyExists(config.root.clone()));
        }
        std::fs::create_dir_all(&config.root).map_err(|e| DbError::io(&config.root, e))?;
        info!(root = %config.root.display(), "created database");
        Ok(Self {
            config,
            manifest: Manifest::new(),
            files: FileMap::new(),
        })
    }

    /// Load every file listed in the manifest.
    ///
    /// All files go through one [`LoadContext`], so every object of every
    /// file is allocated before any is patched. Renumbered files are
    /// registered under their manifest id.
    pub fn open(config: DatabaseConfig, factory: &dyn ObjectFactory) -> DbResult<Self> {
        config.validate()?;
        let manifest = Manifest::load(&config.manifest_path())?;

        if config.verify_headers {
            for entry in manifest.entries() {
                let path = config.file_path(&entry.name);
                let actual = IndexedFile::read_file_id(&path)?;
                if actual != entry.stored_file_id() {
                    return Err(StoreError::Corruption {
                        path,
                        expected: entry.stored_file_id(),
                        actual,
                    }
                    .into());
                }
            }
        }

        let mut ctx = LoadContext::new(factory).with_base_dir(&config.root);
        for entry in manifest.entries() {
            if entry.is_remapped() {
                warn!(
                    file = %entry.name,
                    stored = %entry.stored_file_id(),
                    runtime = %entry.file_id,
                    "remapping file id"
                );
            }
            ctx.map_file(&entry.name, entry.file_id)
                .expect_stored_id(&entry.name, entry.stored_file_id());
        }
        for entry in manifest.entries() {
            ctx.begin_loading_file(Path::new(&entry.name), entry.stored_file_id())?;
        }
        ctx.end_loading()?;
        let files = ctx.into_files();

        if let Some((&file_id, file)) = files
            .iter()
            .find(|(file_id, _)| manifest.entry(**file_id).is_none())
        {
            return Err(DbError::UnlistedFile {
                file_id,
                path: file.path().to_path_buf(),
            });
        }

        let database = Self {
            config,
            manifest,
            files,
        };
        info!(
            root = %database.config.root.display(),
            files = database.files.len(),
            objects = database.object_count(),
            "opened database"
        );
        Ok(database)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Add an empty file named `stem` plus the configured extension.
    pub fn add_file(&mut self, stem: &str) -> DbResult<FileId> {
        let name = self.config.file_name(stem);
        let file_id = self.manifest.add_file(name.as_str())?;
        self.files
            .insert(file_id, IndexedFile::new(self.config.file_path(&name), file_id));
        debug!(file = %name, file_id = %file_id, "added file");
        Ok(file_id)
    }

    /// Add an empty file in the reserved slot `file_id`.
    pub fn add_reserved_file(&mut self, file_id: FileId, stem: &str) -> DbResult<()> {
        let name = self.config.file_name(stem);
        self.manifest.insert_reserved(file_id, name.as_str())?;
        self.files
            .insert(file_id, IndexedFile::new(self.config.file_path(&name), file_id));
        Ok(())
    }

    /// Append a new `T` to `file`. `build` fills in its fields.
    pub fn construct<T: ObjectClass>(
        &mut self,
        file: FileId,
        build: impl FnOnce(&mut T),
    ) -> DbResult<ObjectRef<T>> {
        let target = self.files.get_mut(&file).ok_or(DbError::UnknownFile(file))?;
        let identity = Identity::new(T::TYPE, file, target.next_index()?);
        let mut object = T::shape(identity);
        build(&mut object);
        target.push(Box::new(object))?;
        Ok(ObjectRef::from_identity(identity))
    }

    pub fn file(&self, file_id: FileId) -> DbResult<&IndexedFile> {
        self.files.get(&file_id).ok_or(DbError::UnknownFile(file_id))
    }

    pub fn files(&self) -> &FileMap {
        &self.files
    }

    pub fn get_any(&self, identity: Identity) -> DbResult<&dyn IndexedObject> {
        self.files
            .get(&identity.file_id())
            .and_then(|file| file.get(identity.index()))
            .filter(|object| object.identity() == identity)
            .ok_or(DbError::ObjectNotFound(identity))
    }

    pub fn get<T: ObjectClass>(&self, object: ObjectRef<T>) -> DbResult<&T> {
        self.get_any(object.identity())?
            .as_class::<T>()
            .ok_or_else(|| type_mismatch::<T>(object.identity()))
    }

    pub fn get_mut<T: ObjectClass>(&mut self, object: ObjectRef<T>) -> DbResult<&mut T> {
        let identity = object.identity();
        self.files
            .get_mut(&identity.file_id())
            .and_then(|file| file.get_mut(identity.index()))
            .filter(|object| object.identity() == identity)
            .ok_or(DbError::ObjectNotFound(identity))?
            .as_class_mut::<T>()
            .ok_or_else(|| type_mismatch::<T>(identity))
    }

    /// Every object, in `(file, index)` order.
    pub fn objects(&self) -> impl Iterator<Item = &dyn IndexedObject> + '_ {
        self.files.values().flat_map(|file| file.iter())
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut dyn IndexedObject> + '_ {
        self.files.values_mut().flat_map(|file| file.iter_mut())
    }

    pub fn file_objects(&self, file_id: FileId) -> DbResult<impl Iterator<Item = &dyn IndexedObject> + '_> {
        Ok(self.file(file_id)?.iter())
    }

    pub fn object_count(&self) -> usize {
        self.files.values().map(IndexedFile::len).sum()
    }

    pub fn many<T: ObjectClass>(&self) -> Vec<&T> {
        query::many(self.objects())
    }

    pub fn one<T: ObjectClass>(&self) -> DbResult<&T> {
        Ok(query::one(self.objects())?)
    }

    pub fn one_opt<T: ObjectClass>(&self) -> DbResult<Option<&T>> {
        Ok(query::one_opt(self.objects())?)
    }

    pub fn root<T: ObjectClass + HasParent>(&self) -> DbResult<&T> {
        Ok(query::root(self.objects())?)
    }

    pub fn many_mut<T: ObjectClass>(&mut self) -> Vec<&mut T> {
        query::many_mut(self.objects_mut())
    }

    pub fn one_mut<T: ObjectClass>(&mut self) -> DbResult<&mut T> {
        Ok(query::one_mut(self.objects_mut())?)
    }

    pub fn one_opt_mut<T: ObjectClass>(&mut self) -> DbResult<Option<&mut T>> {
        Ok(query::one_opt_mut(self.objects_mut())?)
    }

    pub fn root_mut<T: ObjectClass + HasParent>(&mut self) -> DbResult<&mut T> {
        Ok(query::root_mut(self.objects_mut())?)
    }

    pub fn many_in<T: ObjectClass>(&self, file_id: FileId) -> DbResult<Vec<&T>> {
        Ok(query::many(self.file_objects(file_id)?))
    }

    pub fn one_in<T: ObjectClass>(&self, file_id: FileId) -> DbResult<&T> {
        Ok(query::one(self.file_objects(file_id)?)?)
    }

    pub fn one_opt_in<T: ObjectClass>(&self, file_id: FileId) -> DbResult<Option<&T>> {
        Ok(query::one_opt(self.file_objects(file_id)?)?)
    }

    pub fn root_in<T: ObjectClass + HasParent>(&self, file_id: FileId) -> DbResult<&T> {
        Ok(query::root(self.file_objects(file_id)?)?)
    }

    /// Write every file, then the manifest. Returns the bytes written to
    /// database files.
    ///
    /// Each file carries the whole manifest as its dependency table, so any
    /// file can be loaded on its own and pulls in whatever it references.
    /// The manifest records the id each file was actually written under, so
    /// if a file fails to store, the database stays loadable and the next
    /// `store` finishes the renumbering.
    pub fn store(&mut self) -> DbResult<u64> {
        std::fs::create_dir_all(&self.config.root)
            .map_err(|e| DbError::io(&self.config.root, e))?;
        let table = self.manifest.dependency_table();

        let mut total = 0;
        let mut failure = None;
        for (&file_id, file) in &self.files {
            let Some(name) = self.manifest.file_name(file_id) else {
                failure = Some(DbError::UnknownFile(file_id));
                break;
            };
            match IndexedFile::store(&self.config.file_path(name), file_id, &table, file.objects()) {
                Ok(size) => {
                    total += size;
                    self.manifest.mark_stored(file_id);
                }
                Err(e) => {
                    failure = Some(e.into());
                    break;
                }
            }
        }

        self.manifest.save(&self.config.manifest_path())?;
        if let Some(e) = failure {
            return Err(e);
        }
        info!(
            root = %self.config.root.display(),
            files = self.files.len(),
            objects = self.object_count(),
            bytes = total,
            "stored database"
        );
        Ok(total)
    }
}

fn type_mismatch<T: ObjectClass>(identity: Identity) -> DbError {
    StoreError::TypeMismatch {
        identity,
        expected: T::NAME,
    }
    .into()
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("root", &self.config.root)
            .field("files", &self.files.len())
            .field("objects", &self.object_count())
            .finish()
    }
}
