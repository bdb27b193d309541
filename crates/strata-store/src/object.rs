use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use strata_types::{FileId, Identity, ObjectIndex, ObjectType};

use crate::error::StoreResult;
use crate::loader::Loader;
use crate::storer::Storer;

/// A persistable entity with a permanent [`Identity`].
///
/// Schema types implement this trait to (de)serialize their fields. `load`
/// and `store` must visit the fields in exactly the same order: the file
/// format is positional, not self-describing. The default implementations
/// persist only the identity triple.
///
/// Objects never own other objects. Fields that point at other objects hold
/// [`ObjectRef`] handles, which stay valid across files and cycles.
pub trait IndexedObject: Any + Send + Sync + fmt::Debug {
    /// The identity assigned when this object was allocated.
    fn identity(&self) -> Identity;

    /// Patch this object's fields from `loader`.
    fn load(&mut self, loader: &mut Loader) -> StoreResult<()> {
        loader.verify_identity(self.identity())
    }

    /// Write this object's fields to `storer`.
    fn store(&self, storer: &mut Storer) -> StoreResult<()> {
        storer.store_identity(self.identity())
    }

    /// Name of the concrete type, for diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn IndexedObject {
    /// Downcast to a concrete type.
    pub fn downcast_ref<T: IndexedObject>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    /// Downcast to a concrete type, mutably.
    pub fn downcast_mut<T: IndexedObject>(&mut self) -> Option<&mut T> {
        (self as &mut dyn Any).downcast_mut::<T>()
    }

    /// Tag check followed by a downcast.
    pub fn as_class<T: ObjectClass>(&self) -> Option<&T> {
        if self.identity().object_type() == T::TYPE {
            self.downcast_ref::<T>()
        } else {
            None
        }
    }

    /// Mutable counterpart of [`as_class`](Self::as_class).
    pub fn as_class_mut<T: ObjectClass>(&mut self) -> Option<&mut T> {
        if self.identity().object_type() == T::TYPE {
            self.downcast_mut::<T>()
        } else {
            None
        }
    }
}

/// A concrete schema type with a fixed type tag.
pub trait ObjectClass: IndexedObject + Sized {
    /// Tag stored in [`Identity::object_type`] for every instance.
    const TYPE: ObjectType;
    /// Human-readable name used in errors and reports.
    const NAME: &'static str;

    /// Allocate a field-default instance carrying `identity`.
    fn shape(identity: Identity) -> Self;
}

/// Types with a logical parent, for [`root`](crate::query::root) queries.
pub trait HasParent {
    /// Identity of the parent object, or `None` for a root.
    fn parent(&self) -> Option<Identity>;
}

/// Something an [`ObjectRef`] may point at.
///
/// Implemented for every [`ObjectClass`] (tag must match) and for
/// `dyn IndexedObject` (any tag).
pub trait RefTarget {
    /// Name used in type mismatch errors.
    const TARGET_NAME: &'static str;

    /// Whether an object tagged `object_type` satisfies this target.
    fn accepts(object_type: ObjectType) -> bool;
}

impl<T: ObjectClass> RefTarget for T {
    const TARGET_NAME: &'static str = T::NAME;

    fn accepts(object_type: ObjectType) -> bool {
        object_type == T::TYPE
    }
}

impl RefTarget for dyn IndexedObject {
    const TARGET_NAME: &'static str = "IndexedObject";

    fn accepts(_object_type: ObjectType) -> bool {
        true
    }
}

/// Non-owning handle to an object, possibly in another file.
///
/// A handle is just the target's identity plus a static type. It is
/// resolved through the database, never dereferenced directly.
pub struct ObjectRef<T: ?Sized> {
    identity: Identity,
    _target: PhantomData<fn() -> *const T>,
}

/// Untyped handle accepting any target.
pub type AnyRef = ObjectRef<dyn IndexedObject>;

impl<T: ?Sized> ObjectRef<T> {
    /// Wrap an identity without checking its type tag.
    ///
    /// The loader only hands out handles whose target has been checked;
    /// code building handles by hand is responsible for the tag.
    pub const fn from_identity(identity: Identity) -> Self {
        Self {
            identity,
            _target: PhantomData,
        }
    }

    pub const fn identity(&self) -> Identity {
        self.identity
    }

    pub const fn file_id(&self) -> FileId {
        self.identity.file_id()
    }

    pub const fn index(&self) -> ObjectIndex {
        self.identity.index()
    }

    /// Forget the static target type.
    pub const fn erase(&self) -> AnyRef {
        ObjectRef::from_identity(self.identity)
    }
}

impl<T: ObjectClass> ObjectRef<T> {
    /// Handle to an existing object.
    pub fn of(object: &T) -> Self {
        Self::from_identity(object.identity())
    }
}

impl AnyRef {
    /// Recover a typed handle if the tag matches.
    pub fn downcast<T: ObjectClass>(&self) -> Option<ObjectRef<T>> {
        (self.identity.object_type() == T::TYPE).then(|| ObjectRef::from_identity(self.identity))
    }
}

impl<T: ?Sized> Clone for ObjectRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ObjectRef<T> {}

impl<T: ?Sized> PartialEq for ObjectRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl<T: ?Sized> Eq for ObjectRef<T> {}

impl<T: ?Sized> PartialOrd for ObjectRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for ObjectRef<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity.cmp(&other.identity)
    }
}

impl<T: ?Sized> Hash for ObjectRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for ObjectRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Comp, Root};

    fn comp_identity(index: i32) -> Identity {
        Identity::new(Comp::TYPE, FileId::new(2), ObjectIndex::new(index))
    }

    #[test]
    fn downcast_by_tag() {
        let comp: Box<dyn IndexedObject> = Box::new(Comp::shape(comp_identity(0)));
        assert!(comp.as_class::<Comp>().is_some());
        assert!(comp.as_class::<Root>().is_none());
        assert!(comp.downcast_ref::<Root>().is_none());
    }

    #[test]
    fn as_class_requires_matching_tag() {
        // Right concrete type, wrong tag: the tag wins.
        let wrong_tag = Identity::new(Root::TYPE, FileId::new(2), ObjectIndex::new(0));
        let comp: Box<dyn IndexedObject> = Box::new(Comp::shape(wrong_tag));
        assert!(comp.downcast_ref::<Comp>().is_some());
        assert!(comp.as_class::<Comp>().is_none());
    }

    #[test]
    fn refs_compare_by_identity() {
        let a: ObjectRef<Comp> = ObjectRef::from_identity(comp_identity(0));
        let b: ObjectRef<Comp> = ObjectRef::from_identity(comp_identity(1));
        assert!(a < b);
        let copy = a;
        assert_eq!(a, copy);
        assert_eq!(a.index(), ObjectIndex::new(0));
        assert_eq!(a.file_id(), FileId::new(2));
    }

    #[test]
    fn erase_and_downcast() {
        let typed: ObjectRef<Comp> = ObjectRef::from_identity(comp_identity(3));
        let any = typed.erase();
        assert_eq!(any.downcast::<Comp>(), Some(typed));
        assert!(any.downcast::<Root>().is_none());
    }

    #[test]
    fn ref_targets() {
        assert!(Comp::accepts(Comp::TYPE));
        assert!(!Comp::accepts(Root::TYPE));
        assert!(<dyn IndexedObject as RefTarget>::accepts(Root::TYPE));
    }

    #[test]
    fn type_name_defaults_to_rust_type() {
        let comp: Box<dyn IndexedObject> = Box::new(Comp::shape(comp_identity(0)));
        assert!(comp.type_name().ends_with("Comp"));
    }
}
