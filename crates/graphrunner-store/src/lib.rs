//! Buffered, type-indexed, deduplicating Object Store (spec §4.1).
//!
//! Grounded on the teacher's `storage.rs` `MemoryWorkflowStorage` (an
//! `Arc<RwLock<HashMap<...>>>` wrapped behind an async trait surface),
//! generalized with a `DashMap` secondary index the way `n8n-core` uses
//! `dashmap` elsewhere for concurrent lookup structures, and backed by
//! `graphrunner-persist` for the on-disk half of the contract once a
//! type's partition has been flushed.

mod error;
mod hooks;

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
pub use error::StoreError;
pub use hooks::{EntityHook, PermissiveValidator, RelationshipHook, SchemaValidator};

use graphrunner_model::{Entity, FlushedFile, Relationship};
use graphrunner_persist::StagingRoot;

const SCHEMA_VALIDATION_ENV_VAR: &str = "ENABLE_GRAPH_OBJECT_SCHEMA_VALIDATION";

#[derive(Default)]
struct StepBuffer {
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
}

/// One entry in a type's flush log: which file holds entities/relationships
/// of that type, in the order they were written, so `iterate*` can replay
/// insertion order across flushed and still-buffered objects alike.
struct FlushLogEntry {
    step_id: String,
    path: std::path::PathBuf,
}

pub struct ObjectStoreConfig {
    pub flush_threshold: usize,
    pub before_add_entity: Option<Arc<dyn EntityHook>>,
    pub before_add_relationship: Option<Arc<dyn RelationshipHook>>,
    pub schema_validator: Arc<dyn SchemaValidator>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        ObjectStoreConfig {
            flush_threshold: 500,
            before_add_entity: None,
            before_add_relationship: None,
            schema_validator: Arc::new(PermissiveValidator),
        }
    }
}

/// Spec §4.1's Object Store. One instance per run, shared across steps
/// through `graphrunner-core`'s Job State facade.
pub struct ObjectStore {
    persist: Arc<StagingRoot>,
    config: ObjectStoreConfig,

    step_buffers: DashMap<String, Mutex<StepBuffer>>,
    entity_key_index: DashMap<String, String>,
    relationship_key_index: DashMap<String, String>,
    entity_flush_log: Mutex<Vec<FlushLogEntry>>,
    relationship_flush_log: Mutex<Vec<FlushLogEntry>>,

    pending_entities: AtomicUsize,
    pending_relationships: AtomicUsize,
}

impl ObjectStore {
    pub fn new(persist: Arc<StagingRoot>, config: ObjectStoreConfig) -> Self {
        ObjectStore {
            persist,
            config,
            step_buffers: DashMap::new(),
            entity_key_index: DashMap::new(),
            relationship_key_index: DashMap::new(),
            entity_flush_log: Mutex::new(Vec::new()),
            relationship_flush_log: Mutex::new(Vec::new()),
            pending_entities: AtomicUsize::new(0),
            pending_relationships: AtomicUsize::new(0),
        }
    }

    fn schema_validation_enabled() -> bool {
        env::var(SCHEMA_VALIDATION_ENV_VAR).is_ok()
    }

    fn step_buffer(&self, step_id: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<StepBuffer>> {
        self.step_buffers
            .entry(step_id.to_string())
            .or_insert_with(|| Mutex::new(StepBuffer::default()));
        self.step_buffers.get(step_id).unwrap()
    }

    /// Add a single entity under `step_id`'s buffer (spec §4.1, `addEntity`).
    pub async fn add_entity(&self, step_id: &str, entity: Entity) -> Result<Entity, StoreError> {
        if self.entity_key_index.contains_key(&entity.key) {
            return Err(StoreError::DuplicateKey(entity.key.clone()));
        }

        let entity = match &self.config.before_add_entity {
            Some(hook) => hook.call(entity).await,
            None => entity,
        };

        if Self::schema_validation_enabled() {
            if let Err(diagnostic) = self.config.schema_validator.validate_entity(&entity) {
                tracing::warn!(key = %entity.key, %diagnostic, "entity failed schema validation");
            }
        }

        self.entity_key_index
            .insert(entity.key.clone(), entity.type_name.clone());

        {
            let buffer = self.step_buffer(step_id);
            let mut buffer = buffer.lock().unwrap();
            buffer.entities.push(entity.clone());
        }

        self.pending_entities.fetch_add(1, Ordering::SeqCst);
        self.maybe_flush_entities()?;
        Ok(entity)
    }

    /// Add a batch of entities. Aborts at the first duplicate, retaining
    /// every entity added before it (spec §4.1, `addEntities`).
    pub async fn add_entities(
        &self,
        step_id: &str,
        entities: Vec<Entity>,
    ) -> Result<Vec<Entity>, StoreError> {
        let mut added = Vec::with_capacity(entities.len());
        for entity in entities {
            added.push(self.add_entity(step_id, entity).await?);
        }
        Ok(added)
    }

    pub async fn add_relationship(
        &self,
        step_id: &str,
        relationship: Relationship,
    ) -> Result<Relationship, StoreError> {
        let key = relationship.key().to_string();
        if self.relationship_key_index.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }

        let relationship = match &self.config.before_add_relationship {
            Some(hook) => hook.call(relationship).await,
            None => relationship,
        };

        if Self::schema_validation_enabled() {
            if let Err(diagnostic) = self
                .config
                .schema_validator
                .validate_relationship(&relationship)
            {
                tracing::warn!(%key, %diagnostic, "relationship failed schema validation");
            }
        }

        self.relationship_key_index
            .insert(relationship.key().to_string(), relationship.type_name().to_string());

        {
            let buffer = self.step_buffer(step_id);
            let mut buffer = buffer.lock().unwrap();
            buffer.relationships.push(relationship.clone());
        }

        self.pending_relationships.fetch_add(1, Ordering::SeqCst);
        self.maybe_flush_relationships()?;
        Ok(relationship)
    }

    pub async fn add_relationships(
        &self,
        step_id: &str,
        relationships: Vec<Relationship>,
    ) -> Result<Vec<Relationship>, StoreError> {
        let mut added = Vec::with_capacity(relationships.len());
        for relationship in relationships {
            added.push(self.add_relationship(step_id, relationship).await?);
        }
        Ok(added)
    }

    fn maybe_flush_entities(&self) -> Result<(), StoreError> {
        if self.pending_entities.load(Ordering::SeqCst) <= self.config.flush_threshold {
            return Ok(());
        }
        let step_ids: Vec<String> = self.step_buffers.iter().map(|e| e.key().clone()).collect();
        for step_id in step_ids {
            self.flush_step_entities(&step_id)?;
        }
        self.pending_entities.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn maybe_flush_relationships(&self) -> Result<(), StoreError> {
        if self.pending_relationships.load(Ordering::SeqCst) <= self.config.flush_threshold {
            return Ok(());
        }
        let step_ids: Vec<String> = self.step_buffers.iter().map(|e| e.key().clone()).collect();
        for step_id in step_ids {
            self.flush_step_relationships(&step_id)?;
        }
        self.pending_relationships.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn flush_step_entities(&self, step_id: &str) -> Result<(), StoreError> {
        let entities = {
            let Some(buffer) = self.step_buffers.get(step_id) else {
                return Ok(());
            };
            let mut buffer = buffer.lock().unwrap();
            std::mem::take(&mut buffer.entities)
        };
        if entities.is_empty() {
            return Ok(());
        }
        let file = FlushedFile::entities(entities);
        let path = self.persist.write_flush(step_id, &file)?;
        self.entity_flush_log.lock().unwrap().push(FlushLogEntry {
            step_id: step_id.to_string(),
            path,
        });
        Ok(())
    }

    fn flush_step_relationships(&self, step_id: &str) -> Result<(), StoreError> {
        let relationships = {
            let Some(buffer) = self.step_buffers.get(step_id) else {
                return Ok(());
            };
            let mut buffer = buffer.lock().unwrap();
            std::mem::take(&mut buffer.relationships)
        };
        if relationships.is_empty() {
            return Ok(());
        }
        let file = FlushedFile::relationships(relationships);
        let path = self.persist.write_flush(step_id, &file)?;
        self.relationship_flush_log.lock().unwrap().push(FlushLogEntry {
            step_id: step_id.to_string(),
            path,
        });
        Ok(())
    }

    /// Flush whatever remains buffered for `step_id`, regardless of
    /// threshold (spec §4.1: "a final flush occurs at step completion").
    pub fn finalize_step(&self, step_id: &str) -> Result<(), StoreError> {
        self.flush_step_entities(step_id)?;
        self.flush_step_relationships(step_id)
    }

    /// `findEntity(key)` (spec §4.1): in-memory buffers first, then the
    /// on-disk index for a key whose type partition has already flushed.
    pub fn find_entity(&self, key: &str) -> Result<Option<Entity>, StoreError> {
        for buffer in self.step_buffers.iter() {
            let buffer = buffer.value().lock().unwrap();
            if let Some(entity) = buffer.entities.iter().find(|e| e.key == key) {
                return Ok(Some(entity.clone()));
            }
        }

        if self.entity_key_index.contains_key(key) {
            for entry in self.entity_flush_log.lock().unwrap().iter() {
                if let FlushedFile::Entities { entities } = self.persist.read_flush(&entry.path)? {
                    if let Some(entity) = entities.into_iter().find(|e| e.key == key) {
                        return Ok(Some(entity));
                    }
                }
            }
        }

        Ok(None)
    }

    /// `iterateEntities({_type}, fn)` (spec §4.1): flushed entities of the
    /// given type in flush order, then still-buffered ones in insertion
    /// order, mirroring when each was written.
    pub async fn iterate_entities<F, Fut>(&self, type_name: &str, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(Entity) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let entries: Vec<std::path::PathBuf> = self
            .entity_flush_log
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.path.clone())
            .collect();
        for path in entries {
            if let FlushedFile::Entities { entities } = self.persist.read_flush(&path)? {
                for entity in entities.into_iter().filter(|e| e.type_name == type_name) {
                    f(entity).await;
                }
            }
        }

        let step_ids: Vec<String> = self.step_buffers.iter().map(|e| e.key().clone()).collect();
        for step_id in step_ids {
            let pending: Vec<Entity> = {
                let buffer = self.step_buffers.get(&step_id).unwrap();
                let buffer = buffer.lock().unwrap();
                buffer
                    .entities
                    .iter()
                    .filter(|e| e.type_name == type_name)
                    .cloned()
                    .collect()
            };
            for entity in pending {
                f(entity).await;
            }
        }
        Ok(())
    }

    pub async fn iterate_relationships<F, Fut>(
        &self,
        type_name: &str,
        mut f: F,
    ) -> Result<(), StoreError>
    where
        F: FnMut(Relationship) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let entries: Vec<std::path::PathBuf> = self
            .relationship_flush_log
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.path.clone())
            .collect();
        for path in entries {
            if let FlushedFile::Relationships { relationships } = self.persist.read_flush(&path)? {
                for relationship in relationships
                    .into_iter()
                    .filter(|r| r.type_name() == type_name)
                {
                    f(relationship).await;
                }
            }
        }

        let step_ids: Vec<String> = self.step_buffers.iter().map(|e| e.key().clone()).collect();
        for step_id in step_ids {
            let pending: Vec<Relationship> = {
                let buffer = self.step_buffers.get(&step_id).unwrap();
                let buffer = buffer.lock().unwrap();
                buffer
                    .relationships
                    .iter()
                    .filter(|r| r.type_name() == type_name)
                    .cloned()
                    .collect()
            };
            for relationship in pending {
                f(relationship).await;
            }
        }
        Ok(())
    }
}
