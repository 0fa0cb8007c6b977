//! Plain data types shared by every other `graphrunner` crate: entities,
//! relationships, step declarations, step results, and the on-disk shapes
//! they're flushed into.

pub mod entity;
pub mod flush;
pub mod relationship;
pub mod result;
pub mod step;

pub use entity::{Entity, EntityClass};
pub use flush::{FlushedFile, RunSummary, RunSummaryMetadata};
pub use relationship::{
    DirectRelationship, MappedRelationship, Relationship, RelationshipDirection,
    RelationshipMapping,
};
pub use result::{PartialDatasetMetadata, StepResult, StepStatus};
pub use step::{Step, StepEntityMetadata, StepRelationshipMetadata};

/// Arbitrary scalar/array/object properties flattened onto entities and
/// direct relationships (spec §3).
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Either graph object, for code that needs to treat both uniformly
/// (flush buffers, iteration) without losing the type distinction the
/// spec draws everywhere else.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphObject {
    Entity(Entity),
    Relationship(Relationship),
}

impl GraphObject {
    pub fn key(&self) -> &str {
        match self {
            GraphObject::Entity(e) => &e.key,
            GraphObject::Relationship(r) => r.key(),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            GraphObject::Entity(e) => &e.type_name,
            GraphObject::Relationship(r) => r.type_name(),
        }
    }
}

impl From<Entity> for GraphObject {
    fn from(e: Entity) -> Self {
        GraphObject::Entity(e)
    }
}

impl From<Relationship> for GraphObject {
    fn from(r: Relationship) -> Self {
        GraphObject::Relationship(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_class_normalizes_single_and_multiple() {
        let single: EntityClass = "Host".into();
        assert_eq!(single.as_slice(), &["Host".to_string()]);

        let multiple: EntityClass = vec!["Host".to_string(), "Device".to_string()].into();
        assert_eq!(multiple.as_slice().len(), 2);
    }

    #[test]
    fn entity_round_trips_flattened_properties() {
        let entity = Entity::new("host:1", "aws_host", "Host").with_property("name", "web-1");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["_key"], "host:1");
        assert_eq!(json["name"], "web-1");

        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn relationship_untagged_enum_picks_direct_then_mapped() {
        let direct = Relationship::Direct(DirectRelationship {
            key: "a:b".into(),
            type_name: "uses".into(),
            class: "USES".into(),
            from_entity_key: "a".into(),
            to_entity_key: "b".into(),
            properties: Properties::new(),
        });
        let json = serde_json::to_value(&direct).unwrap();
        let back: Relationship = serde_json::from_value(json).unwrap();
        assert!(matches!(back, Relationship::Direct(_)));

        let mapped_json = serde_json::json!({
            "_key": "a:mapped",
            "_type": "uses",
            "_class": "USES",
            "_mapping": {
                "relationshipDirection": "FORWARD",
                "sourceEntityKey": "a",
                "targetEntity": {"_type": "device", "_class": "Device"},
                "targetFilterKeys": ["_type", "name"],
            }
        });
        let back: Relationship = serde_json::from_value(mapped_json).unwrap();
        assert!(matches!(back, Relationship::Mapped(_)));
    }

    #[test]
    fn partial_dataset_metadata_unions_and_dedups_in_order() {
        let results = vec![
            StepResult {
                id: "step-a".into(),
                name: "a".into(),
                declared_types: vec!["aws_host".into()],
                partial_types: vec![],
                encountered_types: vec![],
                depends_on: None,
                status: StepStatus::Failure,
            },
            StepResult {
                id: "step-b".into(),
                name: "b".into(),
                declared_types: vec!["aws_device".into()],
                partial_types: vec![],
                encountered_types: vec![],
                depends_on: None,
                status: StepStatus::PartialSuccessDueToDependencyFailure,
            },
            StepResult {
                id: "step-c".into(),
                name: "c".into(),
                declared_types: vec!["aws_vpc".into()],
                partial_types: vec!["aws_host".into()],
                encountered_types: vec![],
                depends_on: None,
                status: StepStatus::Success,
            },
        ];

        let metadata = PartialDatasetMetadata::from_step_results(&results);
        assert_eq!(metadata.types, vec!["aws_host", "aws_device"]);
    }

    #[test]
    fn partial_dataset_metadata_ignores_declared_types_of_successful_steps() {
        let results = vec![StepResult {
            id: "step-a".into(),
            name: "a".into(),
            declared_types: vec!["aws_host".into()],
            partial_types: vec![],
            encountered_types: vec!["aws_host".into()],
            depends_on: None,
            status: StepStatus::Success,
        }];

        let metadata = PartialDatasetMetadata::from_step_results(&results);
        assert!(metadata.types.is_empty());
    }

    #[test]
    fn flushed_file_shapes_are_mutually_exclusive_on_the_wire() {
        let entities = FlushedFile::entities(vec![Entity::new("h:1", "host", "Host")]);
        let json = serde_json::to_value(&entities).unwrap();
        assert!(json.get("entities").is_some());
        assert!(json.get("relationships").is_none());
    }

    #[test]
    fn step_result_and_summary_wire_fields_are_camel_case() {
        let result = StepResult {
            id: "step-a".into(),
            name: "a".into(),
            declared_types: vec!["aws_host".into()],
            partial_types: vec![],
            encountered_types: vec![],
            depends_on: Some(vec!["step-z".into()]),
            status: StepStatus::Success,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["declaredTypes"], serde_json::json!(["aws_host"]));
        assert_eq!(json["partialTypes"], serde_json::json!([]));
        assert_eq!(json["encounteredTypes"], serde_json::json!([]));
        assert_eq!(json["dependsOn"], serde_json::json!(["step-z"]));
        assert!(json.get("declared_types").is_none());

        let summary = RunSummary::new(vec![result]);
        let summary_json = serde_json::to_value(&summary).unwrap();
        assert!(summary_json.get("integrationStepResults").is_some());
        assert!(summary_json["metadata"].get("partialDatasets").is_some());

        let step = Step::new("step-a", "a")
            .with_relationship(crate::step::StepRelationshipMetadata {
                type_name: "uses".into(),
                source_type: "aws_host".into(),
                target_type: "aws_vpc".into(),
                class: vec!["USES".into()],
                partial: false,
            })
            .depends_on("step-z");
        let step_json = serde_json::to_value(&step).unwrap();
        assert_eq!(step_json["dependsOn"], serde_json::json!(["step-z"]));
        assert_eq!(step_json["relationships"][0]["sourceType"], "aws_host");
        assert_eq!(step_json["relationships"][0]["targetType"], "aws_vpc");
    }
}
