use std::fmt;

use jsonschema::{Draft, JSONSchema};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// How schema violations in `RECORD` payloads are treated.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// A violation aborts the run.
    #[default]
    Strict,
    /// A violation is logged and the record is still published.
    Advisory,
    /// Schemas are not compiled and records are never checked.
    Disabled,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("failed to compile JSON Schema: {0}")]
pub struct SchemaCompileError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer into the record; empty for the record root.
    pub instance_path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// A Draft 4 JSON Schema compiled once per `SCHEMA` message.
pub struct RecordValidator {
    schema: JSONSchema,
}

impl fmt::Debug for RecordValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordValidator").finish_non_exhaustive()
    }
}

impl RecordValidator {
    pub fn compile(schema: &Value) -> Result<Self, SchemaCompileError> {
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft4)
            .compile(schema)
            .map_err(|e| SchemaCompileError(e.to_string()))?;
        Ok(Self { schema })
    }

    /// Checks `record` and returns every violation, ordered by instance path.
    pub fn validate(&self, record: &Value) -> Result<(), Vec<ValidationIssue>> {
        let Err(errors) = self.schema.validate(record) else {
            return Ok(());
        };
        let mut issues = errors
            .map(|e| ValidationIssue {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect::<Vec<_>>();
        issues.sort_by(|a, b| {
            a.instance_path
                .cmp(&b.instance_path)
                .then_with(|| a.message.cmp(&b.message))
        });
        Err(issues)
    }
}
