//! Per-step facade over the Object Store (spec §4.3).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use graphrunner_model::{Entity, Relationship};
use graphrunner_store::{ObjectStore, StoreError};

/// Routes a single step's adds into the shared `ObjectStore` under its own
/// `stepId`, and records the `_type` of everything it successfully adds
/// into that step's `encounteredTypes` (spec §4.3, §3 invariant I4).
pub struct JobState {
    store: Arc<ObjectStore>,
    step_id: String,
    encountered: Mutex<HashSet<String>>,
}

impl JobState {
    pub fn new(store: Arc<ObjectStore>, step_id: impl Into<String>) -> Self {
        JobState {
            store,
            step_id: step_id.into(),
            encountered: Mutex::new(HashSet::new()),
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub async fn add_entity(&self, entity: Entity) -> Result<Entity, StoreError> {
        let added = self.store.add_entity(&self.step_id, entity).await?;
        self.encountered.lock().unwrap().insert(added.type_name.clone());
        Ok(added)
    }

    pub async fn add_entities(&self, entities: Vec<Entity>) -> Result<Vec<Entity>, StoreError> {
        let added = self.store.add_entities(&self.step_id, entities).await?;
        let mut encountered = self.encountered.lock().unwrap();
        for entity in &added {
            encountered.insert(entity.type_name.clone());
        }
        Ok(added)
    }

    pub async fn add_relationship(
        &self,
        relationship: Relationship,
    ) -> Result<Relationship, StoreError> {
        let added = self
            .store
            .add_relationship(&self.step_id, relationship)
            .await?;
        self.encountered
            .lock()
            .unwrap()
            .insert(added.type_name().to_string());
        Ok(added)
    }

    pub async fn add_relationships(
        &self,
        relationships: Vec<Relationship>,
    ) -> Result<Vec<Relationship>, StoreError> {
        let added = self
            .store
            .add_relationships(&self.step_id, relationships)
            .await?;
        let mut encountered = self.encountered.lock().unwrap();
        for relationship in &added {
            encountered.insert(relationship.type_name().to_string());
        }
        Ok(added)
    }

    /// Spans all prior steps, not just this one (spec §4.3).
    pub fn find_entity(&self, key: &str) -> Result<Option<Entity>, StoreError> {
        self.store.find_entity(key)
    }

    pub async fn iterate_entities<F, Fut>(&self, type_name: &str, f: F) -> Result<(), StoreError>
    where
        F: FnMut(Entity) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        self.store.iterate_entities(type_name, f).await
    }

    pub async fn iterate_relationships<F, Fut>(
        &self,
        type_name: &str,
        f: F,
    ) -> Result<(), StoreError>
    where
        F: FnMut(Relationship) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        self.store.iterate_relationships(type_name, f).await
    }

    pub fn encountered_types(&self) -> Vec<String> {
        self.encountered.lock().unwrap().iter().cloned().collect()
    }

    pub fn finalize(&self) -> Result<(), StoreError> {
        self.store.finalize_step(&self.step_id)
    }
}
