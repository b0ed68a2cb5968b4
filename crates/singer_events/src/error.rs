use thiserror::Error;

/// Coarse classification of a line that could not be turned into a message.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ParseErrorCode {
    MalformedInput,
    MissingField,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LineRecordError {
    #[error("I/O error while reading input: {message}")]
    Io { message: String },
    #[error("invalid UTF-8 in input")]
    InvalidUtf8,
    #[error("line too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    #[error("{summary}")]
    Parse {
        code: ParseErrorCode,
        summary: String,
    },
}

/// One numbered input line together with what became of it.
#[derive(Debug, Clone)]
pub struct LineRecord<T> {
    pub line_number: usize,
    /// The decoded line with any trailing `\r` removed. Empty when decoding failed.
    pub line: String,
    pub outcome: Result<T, LineRecordError>,
}
