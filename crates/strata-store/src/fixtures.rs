//! Small schema shared by the unit tests of this crate.

use std::collections::{BTreeMap, BTreeSet};

use strata_types::{FileId, Identity, ObjectIndex, ObjectType};

use crate::error::StoreResult;
use crate::factory::FactoryRegistry;
use crate::loader::Loader;
use crate::object::{AnyRef, HasParent, IndexedObject, ObjectClass, ObjectRef};
use crate::storer::Storer;

pub(crate) fn identity(object_type: ObjectType, file: i32, index: i32) -> Identity {
    Identity::new(object_type, FileId::new(file), ObjectIndex::new(index))
}

pub(crate) fn factory() -> FactoryRegistry {
    FactoryRegistry::new().with::<Comp>().with::<Root>().with::<Node>()
}

#[derive(Debug)]
pub(crate) struct Comp {
    identity: Identity,
    pub name: String,
}

impl Comp {
    pub fn new(file: i32, index: i32, name: &str) -> Self {
        Self {
            identity: identity(Self::TYPE, file, index),
            name: name.to_string(),
        }
    }
}

impl IndexedObject for Comp {
    fn identity(&self) -> Identity {
        self.identity
    }

    fn load(&mut self, loader: &mut Loader) -> StoreResult<()> {
        loader.verify_identity(self.identity)?;
        self.name = loader.load()?;
        Ok(())
    }

    fn store(&self, storer: &mut Storer) -> StoreResult<()> {
        storer.store_identity(self.identity)?;
        storer.store(&self.name)
    }
}

impl ObjectClass for Comp {
    const TYPE: ObjectType = ObjectType::new(1);
    const NAME: &'static str = "Comp";

    fn shape(identity: Identity) -> Self {
        Self {
            identity,
            name: String::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Root {
    identity: Identity,
    pub component: ObjectRef<Comp>,
}

impl Root {
    pub fn new(file: i32, index: i32, component: ObjectRef<Comp>) -> Self {
        Self {
            identity: identity(Self::TYPE, file, index),
            component,
        }
    }
}

impl IndexedObject for Root {
    fn identity(&self) -> Identity {
        self.identity
    }

    fn load(&mut self, loader: &mut Loader) -> StoreResult<()> {
        loader.verify_identity(self.identity)?;
        self.component = loader.load_object_ref()?;
        Ok(())
    }

    fn store(&self, storer: &mut Storer) -> StoreResult<()> {
        storer.store_identity(self.identity)?;
        storer.store_object_ref(&self.component)
    }
}

impl ObjectClass for Root {
    const TYPE: ObjectType = ObjectType::new(2);
    const NAME: &'static str = "Root";

    fn shape(identity: Identity) -> Self {
        Self {
            identity,
            component: ObjectRef::from_identity(Identity::NONE),
        }
    }
}

/// Exercises every reference container the storer and loader support.
#[derive(Debug)]
pub(crate) struct Node {
    identity: Identity,
    pub label: String,
    pub parent: Option<ObjectRef<Node>>,
    pub children: Vec<ObjectRef<Node>>,
    pub peers: BTreeSet<ObjectRef<Node>>,
    pub tagged: BTreeMap<String, ObjectRef<Comp>>,
    pub links: BTreeMap<ObjectRef<Node>, ObjectRef<Comp>>,
    pub groups: Vec<Vec<ObjectRef<Comp>>>,
    pub anything: Option<AnyRef>,
    pub weight: Option<u32>,
    /// Number of times `load` ran; not persisted.
    pub patched: u32,
}

impl Node {
    pub fn new(file: i32, index: i32, label: &str) -> Self {
        let mut node = Self::shape(identity(Self::TYPE, file, index));
        node.label = label.to_string();
        node
    }
}

impl IndexedObject for Node {
    fn identity(&self) -> Identity {
        self.identity
    }

    fn load(&mut self, loader: &mut Loader) -> StoreResult<()> {
        loader.verify_identity(self.identity)?;
        self.label = loader.load()?;
        self.parent = loader.load_optional_ref()?;
        self.children = loader.load_object_vector()?;
        self.peers = loader.load_object_set()?;
        self.tagged = loader.load_key_object_map()?;
        self.links = loader.load_object_map()?;
        self.groups = loader.load_object_vector_vector()?;
        self.anything = loader.load_optional_ref()?;
        self.weight = loader.load_optional()?;
        self.patched += 1;
        Ok(())
    }

    fn store(&self, storer: &mut Storer) -> StoreResult<()> {
        storer.store_identity(self.identity)?;
        storer.store(&self.label)?;
        storer.store_optional_ref(&self.parent)?;
        storer.store_object_vector(&self.children)?;
        storer.store_object_set(&self.peers)?;
        storer.store_key_object_map(&self.tagged)?;
        storer.store_object_map(&self.links)?;
        storer.store_object_vector_vector(&self.groups)?;
        storer.store_optional_ref(&self.anything)?;
        storer.store_optional(&self.weight)
    }
}

impl ObjectClass for Node {
    const TYPE: ObjectType = ObjectType::new(3);
    const NAME: &'static str = "Node";

    fn shape(identity: Identity) -> Self {
        Self {
            identity,
            label: String::new(),
            parent: None,
            children: Vec::new(),
            peers: BTreeSet::new(),
            tagged: BTreeMap::new(),
            links: BTreeMap::new(),
            groups: Vec::new(),
            anything: None,
            weight: None,
            patched: 0,
        }
    }
}

impl HasParent for Node {
    fn parent(&self) -> Option<Identity> {
        self.parent.map(|parent| parent.identity())
    }
}
