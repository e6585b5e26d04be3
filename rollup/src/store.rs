// ─────────────────────────────────────────────────────────────────────────────
// Entity store contract
// ─────────────────────────────────────────────────────────────────────────────

use std::any::Any;
use std::collections::HashMap;

use crate::schema::Entity;

/// Key-value load/save keyed by `(entity type, id)`.
///
/// Saves are upserts. Nothing is ever deleted.
pub trait EntityStore {
    fn load<E: Entity>(&self, id: &str) -> Option<E>;

    fn save<E: Entity>(&mut self, entity: &E);

    fn exists<E: Entity>(&self, id: &str) -> bool {
        self.load::<E>(id).is_some()
    }
}

/// In-memory store, used by the tests and by local replays
#[derive(Default)]
pub struct MemoryStore {
    rows: HashMap<(&'static str, String), Box<dyn Any>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows of one entity type
    pub fn count<E: Entity>(&self) -> usize {
        self.rows
            .keys()
            .filter(|(entity_type, _)| *entity_type == E::ENTITY_TYPE)
            .count()
    }
}

impl EntityStore for MemoryStore {
    fn load<E: Entity>(&self, id: &str) -> Option<E> {
        self.rows
            .get(&(E::ENTITY_TYPE, id.to_string()))
            .and_then(|row| row.downcast_ref::<E>())
            .cloned()
    }

    fn save<E: Entity>(&mut self, entity: &E) {
        self.rows.insert(
            (E::ENTITY_TYPE, entity.id().to_string()),
            Box::new(entity.clone()),
        );
    }

    fn exists<E: Entity>(&self, id: &str) -> bool {
        self.rows.contains_key(&(E::ENTITY_TYPE, id.to_string()))
    }
}
