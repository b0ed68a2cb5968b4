#![forbid(unsafe_code)]
//! Ingestion primitives for the Singer tap/target protocol.
//!
//! A Singer tap writes one JSON message per line: `SCHEMA`, `RECORD` or `STATE`.
//! This crate turns an async byte stream into numbered, classified messages:
//! - [`BoundedLineReader`] splits input into lines without unbounded buffering.
//! - [`SingerMessageParser`] classifies each line and enforces required keys.
//! - [`LineIngestor`] drives both and yields one [`LineRecord`] per line.
//!
//! Whether an error record is fatal is left to the consumer.

mod config;
mod error;
mod ingest;
mod line_parser;
mod message;
mod reader;

pub use config::{IngestLimits, DEFAULT_MAX_LINE_BYTES};
pub use error::{LineRecord, LineRecordError, ParseErrorCode};
pub use ingest::LineIngestor;
pub use line_parser::{ClassifiedParserError, LineParser};
pub use message::{
    parse_message, MessageError, RecordMessage, SchemaMessage, SingerMessage,
    SingerMessageParser, StateMessage,
};
pub use reader::{BoundedLine, BoundedLineReader};
