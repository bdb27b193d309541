use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

/// Where a database lives and how it is opened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding the manifest and every database file.
    pub root: PathBuf,
    /// File name of the manifest inside `root`.
    pub manifest_name: String,
    /// Extension appended to file names passed to `Database::add_file`.
    pub file_extension: String,
    /// Check every file's header id against the manifest before loading.
    pub verify_headers: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            manifest_name: "manifest.json".into(),
            file_extension: "sdb".into(),
            verify_headers: true,
        }
    }
}

impl DatabaseConfig {
    /// Default settings for a database in `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Parse a TOML document. Missing keys take their default.
    pub fn from_toml(text: &str) -> DbResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| DbError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> DbResult<String> {
        toml::to_string_pretty(self).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> DbResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DbError::io(path, e))?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.manifest_name.is_empty() {
            return Err(DbError::Config("manifest_name must not be empty".into()));
        }
        if self.file_extension.starts_with('.') {
            return Err(DbError::Config(format!(
                "file_extension must not start with a dot: {}",
                self.file_extension
            )));
        }
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest_name)
    }

    /// File name for a database file called `stem`.
    pub fn file_name(&self, stem: &str) -> String {
        if self.file_extension.is_empty() {
            stem.to_string()
        } else {
            format!("{stem}.{}", self.file_extension)
        }
    }

    /// Full path of the manifest entry `name`.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = DatabaseConfig::default();
        assert_eq!(c.root, PathBuf::from("."));
        assert_eq!(c.manifest_name, "manifest.json");
        assert_eq!(c.file_extension, "sdb");
        assert!(c.verify_headers);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let c = DatabaseConfig::from_toml("root = \"/var/db\"\nverify_headers = false\n").unwrap();
        assert_eq!(c.root, PathBuf::from("/var/db"));
        assert!(!c.verify_headers);
        assert_eq!(c.manifest_name, "manifest.json");
        assert_eq!(c.manifest_path(), PathBuf::from("/var/db/manifest.json"));
    }

    #[test]
    fn toml_round_trip() {
        let c = DatabaseConfig {
            file_extension: "db".into(),
            ..DatabaseConfig::at("/tmp/x")
        };
        let parsed = DatabaseConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            DatabaseConfig::from_toml("manifest_name = \"\""),
            Err(DbError::Config(_))
        ));
        assert!(DatabaseConfig::from_toml("file_extension = \".sdb\"").is_err());
        assert!(DatabaseConfig::from_toml("verify_headers = 3").is_err());
    }

    #[test]
    fn file_names() {
        let c = DatabaseConfig::at("/db");
        assert_eq!(c.file_name("unit"), "unit.sdb");
        assert_eq!(c.file_path("unit.sdb"), PathBuf::from("/db/unit.sdb"));

        let bare = DatabaseConfig {
            file_extension: String::new(),
            ..DatabaseConfig::at("/db")
        };
        assert_eq!(bare.file_name("unit"), "unit");
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.toml");
        std::fs::write(&path, "file_extension = \"bin\"\n").unwrap();
        assert_eq!(DatabaseConfig::load(&path).unwrap().file_extension, "bin");
        assert!(DatabaseConfig::load(&dir.path().join("absent.toml")).is_err());
    }
}
