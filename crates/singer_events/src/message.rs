use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ParseErrorCode;
use crate::line_parser::{ClassifiedParserError, LineParser};

/// A `SCHEMA` message: declares (or re-declares) the shape of one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaMessage {
    pub stream: String,
    pub schema: Value,
    pub key_properties: Vec<String>,
    pub bookmark_properties: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordMessage {
    pub stream: String,
    pub record: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateMessage {
    pub value: Value,
}

/// One classified line of Singer tap output.
#[derive(Debug, Clone, PartialEq)]
pub enum SingerMessage {
    Schema(SchemaMessage),
    Record(RecordMessage),
    State(StateMessage),
    /// Any `type` this target does not handle (e.g. `ACTIVATE_VERSION`).
    Unrecognized { message_type: String },
}

impl SingerMessage {
    pub fn kind(&self) -> &str {
        match self {
            SingerMessage::Schema(_) => "SCHEMA",
            SingerMessage::Record(_) => "RECORD",
            SingerMessage::State(_) => "STATE",
            SingerMessage::Unrecognized { message_type } => message_type,
        }
    }
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("unable to parse line as JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),
    #[error("line is not a JSON object")]
    NotAnObject,
    #[error("line is missing required key '{field}'")]
    MissingField { field: &'static str },
    #[error("key '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

impl ClassifiedParserError for MessageError {
    fn code(&self) -> ParseErrorCode {
        match self {
            MessageError::MissingField { .. } => ParseErrorCode::MissingField,
            MessageError::MalformedJson(_)
            | MessageError::NotAnObject
            | MessageError::InvalidField { .. } => ParseErrorCode::MalformedInput,
        }
    }
}

/// Stateless classifier for Singer protocol lines.
///
/// Lines arrive from [`crate::LineIngestor`] with `\r` already stripped and
/// blank lines already skipped.
#[derive(Debug, Clone, Default)]
pub struct SingerMessageParser;

impl SingerMessageParser {
    pub fn new() -> Self {
        Self
    }
}

impl LineParser for SingerMessageParser {
    type Event = SingerMessage;
    type Error = MessageError;

    fn parse_line(&mut self, line: &str) -> Result<Option<SingerMessage>, MessageError> {
        parse_message(line).map(Some)
    }
}

/// Parses and classifies a single non-blank line.
pub fn parse_message(line: &str) -> Result<SingerMessage, MessageError> {
    let value: Value = serde_json::from_str(line).map_err(MessageError::MalformedJson)?;
    let Value::Object(mut obj) = value else {
        return Err(MessageError::NotAnObject);
    };

    let message_type = match obj.remove("type") {
        None => return Err(MessageError::MissingField { field: "type" }),
        Some(Value::String(t)) => t,
        Some(_) => {
            return Err(MessageError::InvalidField {
                field: "type",
                expected: "a string",
            })
        }
    };

    match message_type.as_str() {
        "SCHEMA" => {
            let stream = take_string(&mut obj, "stream")?;
            let schema = take_required(&mut obj, "schema")?;
            let key_properties = take_string_list(&mut obj, "key_properties")?
                .ok_or(MessageError::MissingField {
                    field: "key_properties",
                })?;
            let bookmark_properties = take_string_list(&mut obj, "bookmark_properties")?;
            Ok(SingerMessage::Schema(SchemaMessage {
                stream,
                schema,
                key_properties,
                bookmark_properties,
            }))
        }
        "RECORD" => {
            let stream = take_string(&mut obj, "stream")?;
            let record = take_required(&mut obj, "record")?;
            if !record.is_object() {
                return Err(MessageError::InvalidField {
                    field: "record",
                    expected: "an object",
                });
            }
            Ok(SingerMessage::Record(RecordMessage { stream, record }))
        }
        "STATE" => {
            let value = take_required(&mut obj, "value")?;
            Ok(SingerMessage::State(StateMessage { value }))
        }
        _ => Ok(SingerMessage::Unrecognized { message_type }),
    }
}

fn take_required(obj: &mut Map<String, Value>, field: &'static str) -> Result<Value, MessageError> {
    obj.remove(field).ok_or(MessageError::MissingField { field })
}

fn take_string(obj: &mut Map<String, Value>, field: &'static str) -> Result<String, MessageError> {
    match take_required(obj, field)? {
        Value::String(s) => Ok(s),
        _ => Err(MessageError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

/// `Ok(None)` when the key is absent or `null`.
fn take_string_list(
    obj: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<Vec<String>>, MessageError> {
    let invalid = || MessageError::InvalidField {
        field,
        expected: "an array of strings",
    };
    match obj.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(line: &str) -> Result<SingerMessage, MessageError> {
        parse_message(line)
    }

    #[test]
    fn classifies_schema_with_bookmarks() {
        let msg = parse(
            r#"{"type":"SCHEMA","stream":"locations","schema":{"type":"object"},"key_properties":["id"],"bookmark_properties":["updated_at"]}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            SingerMessage::Schema(SchemaMessage {
                stream: "locations".to_string(),
                schema: json!({"type": "object"}),
                key_properties: vec!["id".to_string()],
                bookmark_properties: Some(vec!["updated_at".to_string()]),
            })
        );
    }

    #[test]
    fn null_bookmark_properties_are_absent() {
        let msg = parse(
            r#"{"type":"SCHEMA","stream":"s","schema":{},"key_properties":[],"bookmark_properties":null}"#,
        )
        .unwrap();
        match msg {
            SingerMessage::Schema(schema) => {
                assert!(schema.key_properties.is_empty());
                assert!(schema.bookmark_properties.is_none());
            }
            other => panic!("expected schema, got {other:?}"),
        }
    }

    #[test]
    fn classifies_record_and_state() {
        let record = parse(r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#).unwrap();
        assert_eq!(record.kind(), "RECORD");

        let state = parse(r#"{"type":"STATE","value":{"users":5}}"#).unwrap();
        assert_eq!(
            state,
            SingerMessage::State(StateMessage {
                value: json!({"users": 5})
            })
        );
    }

    #[test]
    fn unknown_type_is_unrecognized_not_an_error() {
        let msg = parse(r#"{"type":"ACTIVATE_VERSION","stream":"users","version":3}"#).unwrap();
        assert_eq!(
            msg,
            SingerMessage::Unrecognized {
                message_type: "ACTIVATE_VERSION".to_string()
            }
        );
    }

    #[test]
    fn invalid_json_is_malformed_input() {
        let err = parse("{not-json}").unwrap_err();
        assert!(matches!(err, MessageError::MalformedJson(_)));
        assert_eq!(err.code(), ParseErrorCode::MalformedInput);

        let err = parse("[1,2,3]").unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::MalformedInput);
    }

    #[test]
    fn required_fields_are_enforced_per_kind() {
        let cases = [
            (r#"{"stream":"users"}"#, "type"),
            (r#"{"type":"RECORD","record":{}}"#, "stream"),
            (r#"{"type":"RECORD","stream":"users"}"#, "record"),
            (r#"{"type":"SCHEMA","schema":{},"key_properties":[]}"#, "stream"),
            (r#"{"type":"SCHEMA","stream":"users","schema":{}}"#, "key_properties"),
            (r#"{"type":"STATE"}"#, "value"),
        ];
        for (line, expected) in cases {
            match parse(line) {
                Err(MessageError::MissingField { field }) => assert_eq!(field, expected, "{line}"),
                other => panic!("expected missing {expected} for {line}, got {other:?}"),
            }
        }
    }

    #[test]
    fn wrongly_shaped_fields_are_malformed() {
        let err = parse(r#"{"type":"SCHEMA","stream":"s","schema":{},"key_properties":"id"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            MessageError::InvalidField {
                field: "key_properties",
                ..
            }
        ));
        assert_eq!(err.code(), ParseErrorCode::MalformedInput);

        let err = parse(r#"{"type":"RECORD","stream":7,"record":{}}"#).unwrap_err();
        assert!(matches!(err, MessageError::InvalidField { field: "stream", .. }));
    }

    #[test]
    fn parser_yields_every_classified_line() {
        let mut parser = SingerMessageParser::new();
        let msg = parser
            .parse_line("{\"type\":\"STATE\",\"value\":1}")
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind(), "STATE");
        assert_eq!(
            parser.parse_line("   ").unwrap_err().code(),
            ParseErrorCode::MalformedInput
        );
    }
}
