use singer_events::{LineRecordError, ParseErrorCode};
use thiserror::Error;

use crate::sink::PublishError;
use crate::validator::ValidationIssue;

/// Fatal conditions that abort a run. Every variant tied to an input line
/// carries its 1-based line number.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("line {line_number}: malformed input: {summary}")]
    MalformedInput { line_number: usize, summary: String },
    #[error("line {line_number}: {summary}")]
    MissingField { line_number: usize, summary: String },
    #[error("line {line_number}: a record for stream {stream} was encountered before a corresponding schema")]
    UnknownStream { line_number: usize, stream: String },
    #[error(
        "line {line_number}: record for stream {stream} failed schema validation: {}",
        format_issues(.issues)
    )]
    Validation {
        line_number: usize,
        stream: String,
        issues: Vec<ValidationIssue>,
    },
    #[error("line {line_number}: schema for stream {stream} is not a valid JSON Schema: {message}")]
    InvalidSchema {
        line_number: usize,
        stream: String,
        message: String,
    },
    #[error("line {line_number}: {source}")]
    Publish {
        line_number: usize,
        #[source]
        source: PublishError,
    },
    #[error("line {line_number}: {source}")]
    Decode {
        line_number: usize,
        #[source]
        source: LineRecordError,
    },
    #[error("router has already processed its input")]
    RouterReused,
}

impl TargetError {
    pub(crate) fn from_line_error(line_number: usize, err: LineRecordError) -> Self {
        match err {
            LineRecordError::Parse {
                code: ParseErrorCode::MalformedInput,
                summary,
            } => TargetError::MalformedInput {
                line_number,
                summary,
            },
            LineRecordError::Parse {
                code: ParseErrorCode::MissingField,
                summary,
            } => TargetError::MissingField {
                line_number,
                summary,
            },
            other => TargetError::Decode {
                line_number,
                source: other,
            },
        }
    }

    pub fn line_number(&self) -> Option<usize> {
        match self {
            TargetError::MalformedInput { line_number, .. }
            | TargetError::MissingField { line_number, .. }
            | TargetError::UnknownStream { line_number, .. }
            | TargetError::Validation { line_number, .. }
            | TargetError::InvalidSchema { line_number, .. }
            | TargetError::Publish { line_number, .. }
            | TargetError::Decode { line_number, .. } => Some(*line_number),
            TargetError::RouterReused => None,
        }
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_codes_map_to_taxonomy() {
        let err = TargetError::from_line_error(
            3,
            LineRecordError::Parse {
                code: ParseErrorCode::MissingField,
                summary: "line is missing required key 'type'".to_string(),
            },
        );
        assert!(matches!(err, TargetError::MissingField { line_number: 3, .. }));
        assert_eq!(err.to_string(), "line 3: line is missing required key 'type'");

        let err = TargetError::from_line_error(4, LineRecordError::InvalidUtf8);
        assert!(matches!(err, TargetError::Decode { line_number: 4, .. }));
        assert_eq!(err.line_number(), Some(4));
    }

    #[test]
    fn validation_message_lists_every_issue() {
        let err = TargetError::Validation {
            line_number: 2,
            stream: "users".to_string(),
            issues: vec![
                ValidationIssue {
                    instance_path: String::new(),
                    message: "\"id\" is a required property".to_string(),
                },
                ValidationIssue {
                    instance_path: "/name".to_string(),
                    message: "5 is not of type \"string\"".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "line 2: record for stream users failed schema validation: \"id\" is a required property; /name: 5 is not of type \"string\""
        );
    }
}
