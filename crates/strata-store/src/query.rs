//! Typed queries over a set of objects.
//!
//! Matching is by type tag: an object matches `T` when its identity carries
//! `T::TYPE` and it downcasts to `T`. Results keep the input order. Nothing
//! is cached; every call walks the input again.

use crate::error::{Cardinality, StoreError, StoreResult};
use crate::object::{HasParent, IndexedObject, ObjectClass};

/// Every object of type `T`.
pub fn many<'a, T: ObjectClass>(objects: impl IntoIterator<Item = &'a dyn IndexedObject>) -> Vec<&'a T> {
    objects
        .into_iter()
        .filter_map(|object| object.as_class::<T>())
        .collect()
}

/// The only object of type `T`.
pub fn one<'a, T: ObjectClass>(objects: impl IntoIterator<Item = &'a dyn IndexedObject>) -> StoreResult<&'a T> {
    let matches = objects.into_iter().filter_map(|object| object.as_class::<T>());
    required::<T, _>(at_most_one::<T, _>(matches, Cardinality::ExactlyOne)?, Cardinality::ExactlyOne)
}

/// The object of type `T`, if there is one.
pub fn one_opt<'a, T: ObjectClass>(
    objects: impl IntoIterator<Item = &'a dyn IndexedObject>,
) -> StoreResult<Option<&'a T>> {
    let matches = objects.into_iter().filter_map(|object| object.as_class::<T>());
    at_most_one::<T, _>(matches, Cardinality::AtMostOne)
}

/// The only object of type `T` without a parent.
pub fn root<'a, T: ObjectClass + HasParent>(
    objects: impl IntoIterator<Item = &'a dyn IndexedObject>,
) -> StoreResult<&'a T> {
    let matches = objects
        .into_iter()
        .filter_map(|object| object.as_class::<T>())
        .filter(|object| object.parent().is_none());
    required::<T, _>(at_most_one::<T, _>(matches, Cardinality::UniqueRoot)?, Cardinality::UniqueRoot)
}

pub fn many_mut<'a, T: ObjectClass>(
    objects: impl IntoIterator<Item = &'a mut dyn IndexedObject>,
) -> Vec<&'a mut T> {
    objects
        .into_iter()
        .filter_map(|object| object.as_class_mut::<T>())
        .collect()
}

pub fn one_mut<'a, T: ObjectClass>(
    objects: impl IntoIterator<Item = &'a mut dyn IndexedObject>,
) -> StoreResult<&'a mut T> {
    let matches = objects.into_iter().filter_map(|object| object.as_class_mut::<T>());
    required::<T, _>(at_most_one::<T, _>(matches, Cardinality::ExactlyOne)?, Cardinality::ExactlyOne)
}

pub fn one_opt_mut<'a, T: ObjectClass>(
    objects: impl IntoIterator<Item = &'a mut dyn IndexedObject>,
) -> StoreResult<Option<&'a mut T>> {
    let matches = objects.into_iter().filter_map(|object| object.as_class_mut::<T>());
    at_most_one::<T, _>(matches, Cardinality::AtMostOne)
}

pub fn root_mut<'a, T: ObjectClass + HasParent>(
    objects: impl IntoIterator<Item = &'a mut dyn IndexedObject>,
) -> StoreResult<&'a mut T> {
    let matches = objects
        .into_iter()
        .filter_map(|object| object.as_class_mut::<T>())
        .filter(|object| object.parent().is_none());
    required::<T, _>(at_most_one::<T, _>(matches, Cardinality::UniqueRoot)?, Cardinality::UniqueRoot)
}

fn at_most_one<T: ObjectClass, X>(
    mut matches: impl Iterator<Item = X>,
    expected: Cardinality,
) -> StoreResult<Option<X>> {
    let first = matches.next();
    let rest = matches.count();
    if rest > 0 {
        return Err(StoreError::Cardinality {
            type_name: T::NAME,
            expected,
            found: rest + 1,
        });
    }
    Ok(first)
}

fn required<T: ObjectClass, X>(found: Option<X>, expected: Cardinality) -> StoreResult<X> {
    found.ok_or(StoreError::Cardinality {
        type_name: T::NAME,
        expected,
        found: 0,
    })
}
