//! Step declarations (spec §3, Step) and the invariants derived from them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A declared entity output of a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepEntityMetadata {
    #[serde(rename = "_type")]
    pub type_name: String,
    #[serde(rename = "_class")]
    pub class: Vec<String>,
    #[serde(default)]
    pub partial: bool,
}

/// A declared relationship output of a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepRelationshipMetadata {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub source_type: String,
    pub target_type: String,
    #[serde(rename = "_class")]
    pub class: Vec<String>,
    #[serde(default)]
    pub partial: bool,
}

/// The declarative part of a step: id, dependencies, and declared outputs.
///
/// The executable part (`executionHandler` in the spec) is supplied
/// separately as a `StepHandler` trait object bound to this declaration by
/// `graphrunner-core`'s scheduler, keeping the data model free of behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub entities: Vec<StepEntityMetadata>,
    #[serde(default)]
    pub relationships: Vec<StepRelationshipMetadata>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_source_id: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entities: Vec::new(),
            relationships: Vec::new(),
            depends_on: Vec::new(),
            ingestion_source_id: None,
        }
    }

    pub fn with_entity(mut self, meta: StepEntityMetadata) -> Self {
        self.entities.push(meta);
        self
    }

    pub fn with_relationship(mut self, meta: StepRelationshipMetadata) -> Self {
        self.relationships.push(meta);
        self
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    /// Union of `_type` across declared entities and relationships.
    pub fn declared_types(&self) -> HashSet<String> {
        let mut types: HashSet<String> = self.entities.iter().map(|e| e.type_name.clone()).collect();
        types.extend(self.relationships.iter().map(|r| r.type_name.clone()));
        types
    }

    /// The subset of declared types whose `partial` flag is set.
    pub fn partial_types(&self) -> HashSet<String> {
        let mut types: HashSet<String> = self
            .entities
            .iter()
            .filter(|e| e.partial)
            .map(|e| e.type_name.clone())
            .collect();
        types.extend(
            self.relationships
                .iter()
                .filter(|r| r.partial)
                .map(|r| r.type_name.clone()),
        );
        types
    }
}
