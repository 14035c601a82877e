//! Request body validation against named definitions.

use std::collections::HashMap;
use std::fmt;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::config::validation::ValidationErrors;
use crate::routing::RouteIndex;

/// Validates a JSON body against a named definition.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, definition: &str, body: &Value) -> Result<(), String>;
}

/// JSON-schema validator with every definition of one generation compiled up front.
#[derive(Default)]
pub struct JsonSchemaValidator {
    schemas: HashMap<String, Option<JSONSchema>>,
}

impl JsonSchemaValidator {
    /// Compile all definitions of `index`. An empty schema accepts any body.
    pub fn compile(index: &RouteIndex) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let mut schemas = HashMap::new();

        for definition in index.definitions() {
            let location = format!("definition '{}'", definition.name);
            if definition.schema.trim().is_empty() {
                schemas.insert(definition.name.clone(), None);
                continue;
            }
            let document: Value = match serde_json::from_str(&definition.schema) {
                Ok(document) => document,
                Err(e) => {
                    errors.push(location, format!("schema is not JSON: {}", e));
                    continue;
                }
            };
            match JSONSchema::compile(&document) {
                Ok(schema) => {
                    schemas.insert(definition.name.clone(), Some(schema));
                }
                Err(e) => errors.push(location, format!("invalid schema: {}", e)),
            }
        }

        if errors.is_empty() {
            Ok(Self { schemas })
        } else {
            Err(errors)
        }
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, definition: &str, body: &Value) -> Result<(), String> {
        let schema = self
            .schemas
            .get(definition)
            .ok_or_else(|| format!("definition '{}' is not loaded", definition))?;
        let Some(schema) = schema else {
            return Ok(());
        };
        schema.validate(body).map_err(|errors| {
            errors
                .map(|e| format!("{} at '{}'", e, e.instance_path))
                .collect::<Vec<_>>()
                .join("; ")
        })
    }
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("definitions", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}
