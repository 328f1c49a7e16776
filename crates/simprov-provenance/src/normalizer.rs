//! Schema-driven normalization of extracted activities.
//!
//! Rules produce entities carrying only a name and raw attributes. Before
//! chaining, every entity is matched against the study schema: declared
//! attributes missing from the event are filled with `null`, the primary
//! key is computed from the key attributes, and style hints are copied into
//! the entity's metadata.

use crate::error::{ProvenanceError, Result};
use crate::types::{Activity, Attributes, Entity, PrimaryKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub trait ActivityNormalizer: Send + Sync {
    fn normalize(&self, activity: Activity) -> Result<Activity>;
}

/// Declaration of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Attributes whose values identify versions of the same artifact.
    pub primary_key: Vec<String>,
    /// Further attributes every entity of this type carries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: Attributes,
}

impl EntitySchema {
    pub fn new<I, S>(primary_key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { primary_key: primary_key.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn with_style(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.style.insert(key.to_string(), value.into());
        self
    }
}

/// Entity type name to declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudySchema {
    #[serde(default)]
    pub entities: BTreeMap<String, EntitySchema>,
}

impl StudySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_entity(mut self, name: impl Into<String>, schema: EntitySchema) -> Self {
        self.entities.insert(name.into(), schema);
        self
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaNormalizer {
    schema: StudySchema,
}

impl SchemaNormalizer {
    pub fn new(schema: StudySchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &StudySchema {
        &self.schema
    }

    pub fn normalize_entity(&self, entity: &mut Entity) -> Result<()> {
        let schema = self
            .schema
            .entity(&entity.name)
            .ok_or_else(|| ProvenanceError::UnknownEntityType { name: entity.name.clone() })?;

        for attribute in schema.primary_key.iter().chain(schema.attributes.iter()) {
            entity.attributes.entry(attribute.clone()).or_insert(Value::Null);
        }
        let values = schema
            .primary_key
            .iter()
            .map(|attribute| match entity.attributes.get(attribute) {
                Some(Value::Null) | None => Err(ProvenanceError::MissingPrimaryKeyAttribute {
                    entity: entity.name.clone(),
                    attribute: attribute.clone(),
                }),
                Some(value) => Ok(value),
            })
            .collect::<Result<Vec<_>>>()?;
        let key = PrimaryKey::from_values(values);
        entity.primary_key = Some(key);

        for (name, value) in &schema.style {
            entity.meta.entry(name.clone()).or_insert_with(|| value.clone());
        }
        Ok(())
    }
}

impl ActivityNormalizer for SchemaNormalizer {
    fn normalize(&self, mut activity: Activity) -> Result<Activity> {
        for entity in activity.entities_mut() {
            self.normalize_entity(entity)?;
        }
        Ok(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{ActivityBuilder, EntityBuilder};
    use crate::vocabulary::style;
    use serde_json::json;

    fn schema() -> StudySchema {
        StudySchema::new().with_entity(
            "Simulation Model",
            EntitySchema::new(["File Path"])
                .with_attribute("Content")
                .with_style(style::BACKGROUND_COLOR, "#d7ecff"),
        )
    }

    #[test]
    fn fills_declared_attributes_and_computes_key() {
        let normalizer = SchemaNormalizer::new(schema());
        let mut entity = EntityBuilder::new("Simulation Model").attr("File Path", "/demo/path").build();

        normalizer.normalize_entity(&mut entity).unwrap();

        assert_eq!(entity.attributes["Content"], Value::Null);
        assert_eq!(entity.primary_key, Some(PrimaryKey::new(["/demo/path"])));
        assert_eq!(entity.meta[style::BACKGROUND_COLOR], json!("#d7ecff"));
    }

    #[test]
    fn null_key_attribute_is_missing() {
        let normalizer = SchemaNormalizer::new(schema());
        let mut entity = EntityBuilder::new("Simulation Model").attr("File Path", Value::Null).build();

        let err = normalizer.normalize_entity(&mut entity).unwrap_err();
        assert!(matches!(
            err,
            ProvenanceError::MissingPrimaryKeyAttribute { attribute, .. } if attribute == "File Path"
        ));
    }

    #[test]
    fn unknown_entity_type_fails_whole_activity() {
        let normalizer = SchemaNormalizer::new(schema());
        let activity = ActivityBuilder::new("Fitting")
            .uses_with("Simulation Model", |e| e.attr("File Path", "m.ml3"))
            .generates_with("Fooo", |e| e)
            .build();

        let err = normalizer.normalize(activity).unwrap_err();
        assert!(matches!(err, ProvenanceError::UnknownEntityType { name } if name == "Fooo"));
    }

    #[test]
    fn schema_parses_from_json() {
        let schema = StudySchema::from_json_str(
            r#"{"entities": {"File": {"primary_key": ["path"], "style": {"border-width": 2}}}}"#,
        )
        .unwrap();
        let file = schema.entity("File").unwrap();
        assert_eq!(file.primary_key, vec!["path".to_string()]);
        assert_eq!(file.style[style::BORDER_WIDTH], json!(2));
    }
}
