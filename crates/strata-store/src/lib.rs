//! Indexed multi-file object storage for Strata.
//!
//! A database is a set of files. Each file owns an array of objects, and
//! every object is addressed by a permanent [`Identity`]. Objects refer to
//! each other through [`ObjectRef`] handles, across files and in cycles.
//!
//! # Architecture
//!
//! - **IndexedObject**: the load/store capability every schema type implements
//! - **ObjectFactory**: allocates a field-default object from an identity alone
//! - **Storer / Loader**: positional binary encoding of fields and references
//! - **IndexedFile**: one file's layout and its two-phase load protocol
//! - **LoadContext**: the file map and settings of a single load operation
//! - **query**: `many`, `one`, `one_opt` and `root` over any object set
//!
//! Loading first allocates the shape of every object in the whole dependency
//! closure (Phase A) and only then patches fields (Phase B), so a reference
//! can always be resolved even when its target has not been read yet.

pub mod error;
pub mod factory;
pub mod file;
pub mod loader;
pub mod object;
pub mod query;
pub mod storer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{Cardinality, StoreError, StoreResult};
pub use factory::{FactoryRegistry, ObjectFactory};
pub use file::{FileEntry, FileHeader, FileMap, IndexedFile, LoadContext};
pub use loader::{Loader, ShapeTable};
pub use object::{AnyRef, HasParent, IndexedObject, ObjectClass, ObjectRef, RefTarget};
pub use storer::Storer;
pub use strata_types::{FileId, Identity, ObjectIndex, ObjectType};
