use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_types::{FileId, TypeError};

use crate::error::{DbError, DbResult};

const MANIFEST_VERSION: u32 = 1;

/// One database file listed in the manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file_id: FileId,
    /// File name relative to the database root.
    pub name: String,
    /// Id the file was last stored under, when it has been renumbered since.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_as: Option<FileId>,
}

impl ManifestEntry {
    /// Id expected in the file's header.
    pub fn stored_file_id(&self) -> FileId {
        self.stored_as.unwrap_or(self.file_id)
    }

    /// Whether the next load registers this file under a different id.
    pub fn is_remapped(&self) -> bool {
        self.stored_file_id() != self.file_id
    }
}

#[derive(Serialize, Deserialize)]
struct ManifestDocument {
    version: u32,
    files: Vec<ManifestEntry>,
}

/// The list of files making up a database.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    files: BTreeMap<FileId, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ordinary file and allocate the next free id for it.
    pub fn add_file(&mut self, name: impl Into<String>) -> DbResult<FileId> {
        let name = name.into();
        self.check_name(&name)?;
        let file_id = match self.files.keys().next_back() {
            Some(&last) if last >= FileId::TU_FILES_BEGIN => last.next()?,
            _ => FileId::TU_FILES_BEGIN,
        };
        self.files.insert(
            file_id,
            ManifestEntry {
                file_id,
                name,
                stored_as: None,
            },
        );
        Ok(file_id)
    }

    /// Fill one of the reserved slots (`MASTER` or `ANALYSIS`).
    pub fn insert_reserved(&mut self, file_id: FileId, name: impl Into<String>) -> DbResult<()> {
        if !file_id.is_reserved() || file_id.is_none() {
            return Err(DbError::NotReserved(file_id));
        }
        if self.files.contains_key(&file_id) {
            return Err(DbError::FileIdInUse(file_id));
        }
        let name = name.into();
        self.check_name(&name)?;
        self.files.insert(
            file_id,
            ManifestEntry {
                file_id,
                name,
                stored_as: None,
            },
        );
        Ok(())
    }

    /// Renumber a file. The file itself is untouched; the next load
    /// registers it under `to` and rewrites every reference into it.
    pub fn reassign(&mut self, from: FileId, to: FileId) -> DbResult<()> {
        let to = FileId::try_new(to.get())?;
        if to.is_none() {
            return Err(TypeError::InvalidFileId(to.get()).into());
        }
        if self.files.contains_key(&to) {
            return Err(DbError::FileIdInUse(to));
        }
        let mut entry = self.files.remove(&from).ok_or(DbError::UnknownFile(from))?;
        entry.stored_as = Some(entry.stored_file_id());
        entry.file_id = to;
        if !entry.is_remapped() {
            entry.stored_as = None;
        }
        self.files.insert(to, entry);
        Ok(())
    }

    /// Record that `file_id` has been written under its current id.
    pub fn mark_stored(&mut self, file_id: FileId) {
        if let Some(entry) = self.files.get_mut(&file_id) {
            entry.stored_as = None;
        }
    }

    pub fn file_id(&self, name: &str) -> Option<FileId> {
        self.files
            .values()
            .find(|entry| entry.name == name)
            .map(|entry| entry.file_id)
    }

    pub fn file_name(&self, file_id: FileId) -> Option<&str> {
        self.files.get(&file_id).map(|entry| entry.name.as_str())
    }

    pub fn entry(&self, file_id: FileId) -> Option<&ManifestEntry> {
        self.files.get(&file_id)
    }

    /// Entries in file id order.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Dependency table written into every file: id to root-relative name.
    pub fn dependency_table(&self) -> BTreeMap<FileId, PathBuf> {
        self.files
            .values()
            .map(|entry| (entry.file_id, PathBuf::from(&entry.name)))
            .collect()
    }

    /// Read a manifest from its JSON file.
    pub fn load(path: &Path) -> DbResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DbError::io(path, e))?;
        let document: ManifestDocument =
            serde_json::from_str(&text).map_err(|e| manifest_error(path, e.to_string()))?;
        if document.version != MANIFEST_VERSION {
            return Err(manifest_error(
                path,
                format!("unsupported version {}", document.version),
            ));
        }

        let mut manifest = Self::new();
        for entry in document.files {
            for id in std::iter::once(entry.file_id).chain(entry.stored_as) {
                FileId::try_new(id.get())
                    .map_err(|e| manifest_error(path, format!("{}: {e}", entry.name)))?;
            }
            if entry.file_id.is_none() {
                return Err(manifest_error(path, format!("{} has no file id", entry.name)));
            }
            if manifest.files.contains_key(&entry.file_id) {
                return Err(manifest_error(
                    path,
                    format!("file id {} listed twice", entry.file_id),
                ));
            }
            if manifest.file_id(&entry.name).is_some() {
                return Err(manifest_error(path, format!("{} listed twice", entry.name)));
            }
            manifest.files.insert(entry.file_id, entry);
        }
        Ok(manifest)
    }

    /// Write the manifest as pretty JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> DbResult<()> {
        let document = ManifestDocument {
            version: MANIFEST_VERSION,
            files: self.files.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| manifest_error(path, e.to_string()))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DbError::io(path, e))?;
        temp.write_all(json.as_bytes())
            .and_then(|()| temp.write_all(b"\n"))
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| DbError::io(path, e))?;
        temp.persist(path).map_err(|e| DbError::io(path, e.error))?;
        Ok(())
    }

    fn check_name(&self, name: &str) -> DbResult<()> {
        if self.file_id(name).is_some() {
            return Err(DbError::DuplicateFile(name.to_string()));
        }
        Ok(())
    }
}

fn manifest_error(path: &Path, reason: String) -> DbError {
    DbError::Manifest {
        path: path.to_path_buf(),
        reason,
    }
}
