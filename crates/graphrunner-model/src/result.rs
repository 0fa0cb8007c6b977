//! Step results and the run-level partial-dataset metadata (spec §3, §8).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Terminal status of a step (spec §3, StepResult).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
    #[serde(rename = "PARTIAL_SUCCESS_DUE_TO_DEPENDENCY_FAILURE")]
    PartialSuccessDueToDependencyFailure,
    #[serde(rename = "DISABLED")]
    Disabled,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl StepStatus {
    /// Statuses that mark the step's declared types as incomplete for the
    /// purposes of partial-dataset aggregation (spec §3, §8).
    pub fn contributes_declared_types_to_partial_dataset(self) -> bool {
        matches!(
            self,
            StepStatus::Failure | StepStatus::PartialSuccessDueToDependencyFailure
        )
    }
}

/// Outcome of running a single step (spec §3, StepResult).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub id: String,
    pub name: String,
    pub declared_types: Vec<String>,
    pub partial_types: Vec<String>,
    pub encountered_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    pub status: StepStatus,
}

/// `{types: [string]}` — the union described in spec §3:
///
/// declaredTypes of FAILED steps ∪ declaredTypes of
/// PARTIAL_SUCCESS_DUE_TO_DEPENDENCY_FAILURE steps ∪ partialTypes of any
/// step regardless of status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PartialDatasetMetadata {
    pub types: Vec<String>,
}

impl PartialDatasetMetadata {
    /// Compute partial-dataset metadata over a run's step results.
    ///
    /// Ordering preserves per-step encounter order (spec §4.5: "not
    /// semantically significant") by walking results in the order given and
    /// deduplicating with a set seen-so-far rather than sorting.
    pub fn from_step_results(results: &[StepResult]) -> Self {
        let mut seen = BTreeSet::new();
        let mut types = Vec::new();
        let mut push = |t: &str, seen: &mut BTreeSet<String>, types: &mut Vec<String>| {
            if seen.insert(t.to_string()) {
                types.push(t.to_string());
            }
        };

        for result in results {
            if result.status.contributes_declared_types_to_partial_dataset() {
                for t in &result.declared_types {
                    push(t, &mut seen, &mut types);
                }
            }
            for t in &result.partial_types {
                push(t, &mut seen, &mut types);
            }
        }

        PartialDatasetMetadata { types }
    }
}
