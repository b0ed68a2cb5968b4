use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use singer_events::SchemaMessage;
use tracing::warn;

use crate::validator::{RecordValidator, SchemaCompileError, ValidationIssue, ValidationMode};

/// The current declaration of one stream, as carried by its latest `SCHEMA` line.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRecord {
    pub stream: String,
    pub schema: Value,
    pub key_properties: Vec<String>,
    pub bookmark_properties: Option<Vec<String>>,
    /// Lowercase hex SHA-256 of the raw `SCHEMA` line.
    pub schema_hash: String,
}

#[derive(Debug)]
struct RegisteredStream {
    schema: SchemaRecord,
    validator: Option<RecordValidator>,
}

/// Per-run mapping from stream name to its schema and compiled validator.
///
/// Streams keep the position of their first registration; re-registering
/// replaces the schema and validator in place.
#[derive(Debug)]
pub struct StreamRegistry {
    streams: IndexMap<String, RegisteredStream>,
    mode: ValidationMode,
}

impl StreamRegistry {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            streams: IndexMap::new(),
            mode,
        }
    }

    pub fn register_schema(
        &mut self,
        message: SchemaMessage,
        raw_line: &str,
    ) -> Result<&SchemaRecord, SchemaCompileError> {
        let validator = match self.mode {
            ValidationMode::Disabled => None,
            ValidationMode::Strict => Some(RecordValidator::compile(&message.schema)?),
            ValidationMode::Advisory => match RecordValidator::compile(&message.schema) {
                Ok(validator) => Some(validator),
                Err(err) => {
                    warn!(stream = %message.stream, "records will not be validated: {err}");
                    None
                }
            },
        };

        let SchemaMessage {
            stream,
            schema,
            key_properties,
            bookmark_properties,
        } = message;
        let record = SchemaRecord {
            stream: stream.clone(),
            schema,
            key_properties,
            bookmark_properties,
            schema_hash: schema_hash(raw_line),
        };

        let entry = RegisteredStream {
            schema: record,
            validator,
        };
        let slot = match self.streams.entry(stream) {
            indexmap::map::Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                occupied.into_mut()
            }
            indexmap::map::Entry::Vacant(vacant) => vacant.insert(entry),
        };
        Ok(&slot.schema)
    }

    pub fn lookup(&self, stream: &str) -> Option<&SchemaRecord> {
        self.streams.get(stream).map(|registered| &registered.schema)
    }

    /// Validates `record` against the stream's schema. Streams without a
    /// compiled validator (unknown, disabled, or uncompilable in advisory
    /// mode) always pass.
    pub fn validate(&self, stream: &str, record: &Value) -> Result<(), Vec<ValidationIssue>> {
        match self.streams.get(stream).and_then(|s| s.validator.as_ref()) {
            Some(validator) => validator.validate(record),
            None => Ok(()),
        }
    }

    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

pub fn schema_hash(raw_line: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_line.as_bytes());
    hex::encode(hasher.finalize())
}
