use std::collections::BTreeMap;
use std::fmt;

use strata_types::{Identity, ObjectType};

use crate::error::{StoreError, StoreResult};
use crate::object::{IndexedObject, ObjectClass};

/// Polymorphic construction capability used by the loader.
///
/// Given only an identity, allocate a field-default object of the concrete
/// type named by `identity.object_type()`. Fields are patched later by
/// [`IndexedObject::load`]. Unknown types are an error, never a fallback.
pub trait ObjectFactory: Send + Sync {
    /// Allocate the shape of the object addressed by `identity`.
    fn create(&self, identity: Identity) -> StoreResult<Box<dyn IndexedObject>>;

    /// Name of the type registered for `object_type`, if any.
    fn type_name(&self, _object_type: ObjectType) -> Option<&'static str> {
        None
    }
}

type Constructor = fn(Identity) -> Box<dyn IndexedObject>;

fn construct<T: ObjectClass>(identity: Identity) -> Box<dyn IndexedObject> {
    Box::new(T::shape(identity))
}

/// Table-driven [`ObjectFactory`]: one constructor per registered type tag.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    constructors: BTreeMap<ObjectType, (&'static str, Constructor)>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its type tag, replacing any earlier registration.
    pub fn register<T: ObjectClass>(&mut self) -> &mut Self {
        let constructor: Constructor = construct::<T>;
        if let Some((previous, _)) = self.constructors.insert(T::TYPE, (T::NAME, constructor)) {
            tracing::warn!(
                object_type = %T::TYPE,
                previous,
                replacement = T::NAME,
                "object type registered twice"
            );
        }
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<T: ObjectClass>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns true if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Whether `object_type` is registered.
    pub fn contains(&self, object_type: ObjectType) -> bool {
        self.constructors.contains_key(&object_type)
    }
}

impl ObjectFactory for FactoryRegistry {
    fn create(&self, identity: Identity) -> StoreResult<Box<dyn IndexedObject>> {
        let &(name, constructor) = self
            .constructors
            .get(&identity.object_type())
            .ok_or(StoreError::UnknownType {
                object_type: identity.object_type(),
                identity,
            })?;
        let object = constructor(identity);
        if object.identity() != identity {
            return Err(StoreError::TypeMismatch {
                identity: object.identity(),
                expected: name,
            });
        }
        Ok(object)
    }

    fn type_name(&self, object_type: ObjectType) -> Option<&'static str> {
        self.constructors.get(&object_type).map(|(name, _)| *name)
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.constructors.iter().map(|(ty, (name, _))| (ty, name)))
            .finish()
    }
}
