//! Database facade for Strata.
//!
//! A [`Database`] is a directory holding a JSON [`Manifest`] and one binary
//! file per manifest entry. Opening a database loads every listed file
//! through a single two-phase load; storing writes every file and then the
//! manifest. Files renumbered in the manifest are remapped on load and
//! rewritten under their new id on the next store.

pub mod config;
pub mod database;
pub mod error;
pub mod manifest;

#[cfg(test)]
pub(crate) mod schema;

pub use config::DatabaseConfig;
pub use database::Database;
pub use error::{DbError, DbResult};
pub use manifest::{Manifest, ManifestEntry};
