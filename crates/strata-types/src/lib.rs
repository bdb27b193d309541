//! Foundation types for the Strata object database.
//!
//! Every persisted object in Strata is addressed by an [`Identity`]: the
//! concrete object type, the file that owns the object, and the object's
//! position inside that file's object array. Every other Strata crate
//! depends on `strata-types`.
//!
//! # Key Types
//!
//! - [`FileId`]: Stable integer naming one physical database file
//! - [`ObjectType`]: Dense type tag assigned by the schema
//! - [`ObjectIndex`]: Zero-based position inside a file's object array
//! - [`Identity`]: The permanent `(type, file, index)` address of an object

pub mod error;
pub mod identity;
pub mod ids;

pub use error::{TypeError, TypeResult};
pub use identity::Identity;
pub use ids::{FileId, ObjectIndex, ObjectType};
