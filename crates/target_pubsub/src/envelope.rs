use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::SchemaRecord;

/// The payload published for every `RECORD`: the record itself bundled with
/// the schema that was current for its stream when it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope<'a> {
    pub stream: Cow<'a, str>,
    pub key_properties: Cow<'a, [String]>,
    pub record: Cow<'a, Value>,
    pub schema: Cow<'a, Value>,
    pub schema_hash: Cow<'a, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark_properties: Option<Cow<'a, [String]>>,
}

impl<'a> RecordEnvelope<'a> {
    /// Borrows everything from the registered schema; nothing is cloned until
    /// the envelope is serialized.
    pub fn new(schema: &'a SchemaRecord, record: &'a Value) -> Self {
        Self {
            stream: Cow::Borrowed(&schema.stream),
            key_properties: Cow::Borrowed(&schema.key_properties),
            record: Cow::Borrowed(record),
            schema: Cow::Borrowed(&schema.schema),
            schema_hash: Cow::Borrowed(&schema.schema_hash),
            bookmark_properties: schema.bookmark_properties.as_deref().map(Cow::Borrowed),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
