//! Entities: the node side of the graph data model (spec §3).

use serde::{Deserialize, Serialize};

use crate::Properties;

/// `_class` may be a single domain class or an ordered list of classes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EntityClass {
    Single(String),
    Multiple(Vec<String>),
}

impl EntityClass {
    /// Normalize to a slice regardless of which variant was used.
    pub fn as_slice(&self) -> &[String] {
        match self {
            EntityClass::Single(s) => std::slice::from_ref(s),
            EntityClass::Multiple(v) => v,
        }
    }
}

impl From<&str> for EntityClass {
    fn from(s: &str) -> Self {
        EntityClass::Single(s.to_string())
    }
}

impl From<String> for EntityClass {
    fn from(s: String) -> Self {
        EntityClass::Single(s)
    }
}

impl From<Vec<String>> for EntityClass {
    fn from(v: Vec<String>) -> Self {
        EntityClass::Multiple(v)
    }
}

/// A graph entity: `_key`/`_type`/`_class` plus arbitrary scalar/array/object
/// properties (spec §3, Entity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub type_name: String,
    #[serde(rename = "_class")]
    pub class: EntityClass,
    #[serde(flatten)]
    pub properties: Properties,
}

impl Entity {
    pub fn new(key: impl Into<String>, type_name: impl Into<String>, class: impl Into<EntityClass>) -> Self {
        Self {
            key: key.into(),
            type_name: type_name.into(),
            class: class.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
