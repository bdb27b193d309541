//! Minimal schema for the database tests.

use strata_store::{
    FactoryRegistry, HasParent, IndexedObject, Loader, ObjectClass, ObjectRef, StoreResult, Storer,
};
use strata_types::{Identity, ObjectType};

pub(crate) fn factory() -> FactoryRegistry {
    FactoryRegistry::new().with::<Comp>().with::<Root>().with::<Part>()
}

#[derive(Debug)]
pub(crate) struct Comp {
    identity: Identity,
    pub name: String,
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
    const TYPE: ObjectType = ObjectType::new(10);
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
    const TYPE: ObjectType = ObjectType::new(11);
    const NAME: &'static str = "Root";

    fn shape(identity: Identity) -> Self {
        Self {
            identity,
            component: ObjectRef::from_identity(Identity::NONE),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Part {
    identity: Identity,
    pub label: String,
    pub parent: Option<ObjectRef<Part>>,
}

impl IndexedObject for Part {
    fn identity(&self) -> Identity {
        self.identity
    }

    fn load(&mut self, loader: &mut Loader) -> StoreResult<()> {
        loader.verify_identity(self.identity)?;
        self.label = loader.load()?;
        self.parent = loader.load_optional_ref()?;
        Ok(())
    }

    fn store(&self, storer: &mut Storer) -> StoreResult<()> {
        storer.store_identity(self.identity)?;
        storer.store(&self.label)?;
        storer.store_optional_ref(&self.parent)
    }
}

impl ObjectClass for Part {
    const TYPE: ObjectType = ObjectType::new(12);
    const NAME: &'static str = "Part";

    fn shape(identity: Identity) -> Self {
        Self {
            identity,
            label: String::new(),
            parent: None,
        }
    }
}

impl HasParent for Part {
    fn parent(&self) -> Option<Identity> {
        self.parent.map(|parent| parent.identity())
    }
}
