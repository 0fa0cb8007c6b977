//! Add-time collaborators the invocation config may supply (spec §4.1,
//! §6). Rust has no "value or deferred value" union the way the spec's
//! design notes describe (§9, "Dynamic hook signatures") — every hook here
//! is simply async, and a synchronous hook is one whose future resolves
//! immediately.

use async_trait::async_trait;
use graphrunner_model::{Entity, Relationship};

#[async_trait]
pub trait EntityHook: Send + Sync {
    async fn call(&self, entity: Entity) -> Entity;
}

#[async_trait]
pub trait RelationshipHook: Send + Sync {
    async fn call(&self, relationship: Relationship) -> Relationship;
}

/// Schema validation against `_class` (spec §6,
/// `ENABLE_GRAPH_OBJECT_SCHEMA_VALIDATION`). A validator failure is a
/// recoverable diagnostic — the object is still admitted (spec §4.1).
pub trait SchemaValidator: Send + Sync {
    fn validate_entity(&self, entity: &Entity) -> Result<(), String>;
    fn validate_relationship(&self, relationship: &Relationship) -> Result<(), String>;
}

/// Admits everything. The default when no embedder-supplied validator is
/// configured; this is the boundary the root crate's `SchemaValidator`
/// Non-goal (no entity-class schema validators shipped) is defined at.
pub struct PermissiveValidator;

impl SchemaValidator for PermissiveValidator {
    fn validate_entity(&self, _entity: &Entity) -> Result<(), String> {
        Ok(())
    }

    fn validate_relationship(&self, _relationship: &Relationship) -> Result<(), String> {
        Ok(())
    }
}
