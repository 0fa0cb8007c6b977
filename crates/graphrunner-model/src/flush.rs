//! On-disk shape of a flushed buffer (spec §3, FlushedFile) and the
//! top-level run summary (spec §4.2).

use serde::{Deserialize, Serialize};

use crate::result::{PartialDatasetMetadata, StepResult};
use crate::{Entity, Relationship};

/// One flushed file: either an entity batch or a relationship batch, never
/// both (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FlushedFile {
    Entities { entities: Vec<Entity> },
    Relationships { relationships: Vec<Relationship> },
}

impl FlushedFile {
    pub fn entities(items: Vec<Entity>) -> Self {
        FlushedFile::Entities { entities: items }
    }

    pub fn relationships(items: Vec<Relationship>) -> Self {
        FlushedFile::Relationships { relationships: items }
    }

    pub fn len(&self) -> usize {
        match self {
            FlushedFile::Entities { entities } => entities.len(),
            FlushedFile::Relationships { relationships } => relationships.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `summary.json` (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub integration_step_results: Vec<StepResult>,
    pub metadata: RunSummaryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunSummaryMetadata {
    pub partial_datasets: PartialDatasetMetadata,
}

impl RunSummary {
    pub fn new(step_results: Vec<StepResult>) -> Self {
        let partial_datasets = PartialDatasetMetadata::from_step_results(&step_results);
        RunSummary {
            integration_step_results: step_results,
            metadata: RunSummaryMetadata { partial_datasets },
        }
    }
}
