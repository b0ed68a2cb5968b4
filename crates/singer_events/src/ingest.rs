use tokio::io::AsyncRead;
use tracing::trace;

use crate::config::IngestLimits;
use crate::error::{LineRecord, LineRecordError};
use crate::line_parser::{ClassifiedParserError, LineParser};
use crate::reader::{BoundedLine, BoundedLineReader};

/// Drives a [`BoundedLineReader`] and a [`LineParser`] together, yielding one
/// [`LineRecord`] per non-blank input line.
///
/// Blank lines and lines the parser declines (`Ok(None)`) are skipped. Decode
/// failures are reported as records rather than ending iteration, so callers
/// decide whether an error is fatal.
pub struct LineIngestor<R: AsyncRead + Unpin, P: LineParser> {
    reader: BoundedLineReader<R>,
    parser: P,
}

impl<R: AsyncRead + Unpin, P: LineParser> LineIngestor<R, P> {
    pub fn new(reader: R, parser: P, limits: IngestLimits) -> Self {
        Self {
            reader: BoundedLineReader::new(reader, limits.max_line_bytes),
            parser,
        }
    }

    fn record_error<T>(&self, line_number: usize, err: LineRecordError) -> LineRecord<T> {
        LineRecord {
            line_number,
            line: String::new(),
            outcome: Err(err),
        }
    }

    fn normalize_line(mut line: String) -> String {
        if line.ends_with('\r') {
            line.pop();
        }
        line
    }

    fn line_is_blank(line: &str) -> bool {
        line.chars().all(|ch| ch.is_whitespace())
    }

    pub async fn next_record(&mut self) -> Option<LineRecord<P::Event>> {
        loop {
            let next = self.reader.next_line().await?;
            match next {
                BoundedLine::IoError {
                    line_number,
                    message,
                } => {
                    return Some(self.record_error(line_number, LineRecordError::Io { message }));
                }
                BoundedLine::LineTooLong {
                    line_number,
                    observed_bytes,
                    max_line_bytes,
                } => {
                    return Some(self.record_error(
                        line_number,
                        LineRecordError::LineTooLong {
                            observed_bytes,
                            max_line_bytes,
                        },
                    ));
                }
                BoundedLine::Line { line_number, bytes } => {
                    let Ok(raw_line) = String::from_utf8(bytes) else {
                        return Some(self.record_error(line_number, LineRecordError::InvalidUtf8));
                    };
                    let line = Self::normalize_line(raw_line);
                    if Self::line_is_blank(&line) {
                        trace!(line_number, "skipping blank line");
                        continue;
                    }

                    match self.parser.parse_line(&line) {
                        Ok(None) => continue,
                        Ok(Some(event)) => {
                            return Some(LineRecord {
                                line_number,
                                line,
                                outcome: Ok(event),
                            });
                        }
                        Err(err) => {
                            let outcome = Err(LineRecordError::Parse {
                                code: err.code(),
                                summary: err.summary(),
                            });
                            return Some(LineRecord {
                                line_number,
                                line,
                                outcome,
                            });
                        }
                    }
                }
            }
        }
    }
}
