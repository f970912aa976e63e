/// Entity store interface
///
/// The scene only reads entities; creating and storing them is the store's
/// business. `MemoryStore` is a plain in-process store that records every
/// resolution request it receives.
use crate::descriptor::Paper;
use crate::error::{PaperError, PaperResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Record carrying an optional paper descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<Paper>,
}

impl Entity {
    pub fn new(uuid: impl Into<String>, paper: Paper) -> Self {
        Self {
            uuid: uuid.into(),
            paper: Some(paper),
        }
    }

    pub fn into_ref(self) -> EntityRef {
        Rc::new(RefCell::new(self))
    }
}

/// Shared handle to an entity owned by the store
pub type EntityRef = Rc<RefCell<Entity>>;

/// Handle passed to callbacks and used by the scene to read the store
pub type System = Rc<dyn EntityStore>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Every entity carrying a paper descriptor
    Paper,
    /// The entity with exactly this uuid
    Uuid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Request {
    /// Lazily materialize content rooted at this uuid prefix
    Load(String),
}

pub trait EntityStore {
    fn query(&self, filter: &Query) -> Vec<EntityRef>;

    fn resolve(&self, request: Request);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RefCell<Vec<EntityRef>>,
    requests: RefCell<Vec<Request>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load entities from a JSON array of `{ "uuid", "paper" }` records
    pub fn from_json(json: &str) -> PaperResult<Self> {
        let entities: Vec<Entity> = serde_json::from_str(json).map_err(PaperError::Descriptor)?;
        let store = Self::new();
        for entity in entities {
            store.insert(entity);
        }
        Ok(store)
    }

    pub fn insert(&self, entity: Entity) -> EntityRef {
        let entity = entity.into_ref();
        self.entities.borrow_mut().push(entity.clone());
        entity
    }

    pub fn get(&self, uuid: &str) -> Option<EntityRef> {
        self.entities
            .borrow()
            .iter()
            .find(|e| e.try_borrow().map_or(false, |e| e.uuid == uuid))
            .cloned()
    }

    /// Resolution requests received so far, oldest first
    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }
}

impl EntityStore for MemoryStore {
    fn query(&self, filter: &Query) -> Vec<EntityRef> {
        self.entities
            .borrow()
            .iter()
            // Entities mid-evaluation are mutably borrowed and skipped
            .filter(|entity| {
                entity.try_borrow().map_or(false, |entity| match filter {
                    Query::Paper => entity.paper.is_some(),
                    Query::Uuid(uuid) => &entity.uuid == uuid,
                })
            })
            .cloned()
            .collect()
    }

    fn resolve(&self, request: Request) {
        debug!(?request, "Store received resolution request");
        self.requests.borrow_mut().push(request);
    }
}
