//! Live mapping collection.
//!
//! Readers take an `Arc` snapshot of an immutable vector and never block on
//! each other. Writers build a new vector and swap it in.

use super::{Mapping, MappingError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub type Snapshot = Arc<Vec<Arc<Mapping>>>;

#[derive(Debug, Default)]
pub struct MappingRegistry {
    current: RwLock<Snapshot>,
    /// Serializes writers so concurrent upserts don't lose each other.
    writer: Mutex<()>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping, or replace the one with the same id in place.
    pub fn upsert(&self, mapping: Mapping) -> Result<Arc<Mapping>, MappingError> {
        mapping.validate()?;
        let mapping = Arc::new(mapping);

        let _guard = self.writer.lock();
        let mut next: Vec<Arc<Mapping>> = self.snapshot().as_ref().clone();
        match next.iter().position(|m| m.id == mapping.id) {
            Some(index) => {
                next[index] = Arc::clone(&mapping);
                info!(id = %mapping.id, title = ?mapping.title, "Replaced mapping");
            }
            None => {
                next.push(Arc::clone(&mapping));
                info!(id = %mapping.id, title = ?mapping.title, "Added mapping");
            }
        }
        self.publish(next);
        Ok(mapping)
    }

    pub fn remove(&self, id: Uuid) -> Option<Arc<Mapping>> {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        let index = current.iter().position(|m| m.id == id)?;

        let mut next = current.as_ref().clone();
        let removed = next.remove(index);
        self.publish(next);
        info!(id = %id, "Removed mapping");
        Some(removed)
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Mapping>> {
        self.current.read().iter().find(|m| m.id == id).cloned()
    }

    /// All mappings in insertion order.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.current.read())
    }

    pub fn reset(&self) {
        let _guard = self.writer.lock();
        self.publish(Vec::new());
        info!("Removed all mappings");
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap in `next`. The gauge is shared by every registry in the process,
    /// so it moves by the difference only.
    fn publish(&self, next: Vec<Arc<Mapping>>) {
        let count = next.len() as i64;
        let previous = std::mem::replace(&mut *self.current.write(), Arc::new(next));
        crate::metrics::REGISTERED_MAPPINGS.add(count - previous.len() as i64);
    }
}

impl Drop for MappingRegistry {
    fn drop(&mut self) {
        crate::metrics::REGISTERED_MAPPINGS.sub(self.current.get_mut().len() as i64);
    }
}
