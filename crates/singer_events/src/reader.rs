use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE_BYTES: usize = 8192;

#[derive(Debug)]
pub enum BoundedLine {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    LineTooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    IoError {
        line_number: usize,
        message: String,
    },
}

/// Splits an async byte source into `\n`-terminated lines without ever
/// buffering more than `max_line_bytes` of a single line.
///
/// Once a line exceeds the limit its bytes are dropped and only counted; the
/// line is reported as [`BoundedLine::LineTooLong`] when its terminator (or
/// end of input) arrives. Forward-only: after the source is exhausted or
/// fails, every further call to [`BoundedLineReader::next_line`] returns `None`.
pub struct BoundedLineReader<R: AsyncRead + Unpin> {
    reader: R,
    max_line_bytes: usize,
    chunk: Box<[u8; CHUNK_SIZE_BYTES]>,
    start: usize,
    end: usize,
    line: Vec<u8>,
    line_len: usize,
    overflowed: bool,
    lines_seen: usize,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> BoundedLineReader<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            max_line_bytes,
            chunk: Box::new([0u8; CHUNK_SIZE_BYTES]),
            start: 0,
            end: 0,
            line: Vec::new(),
            line_len: 0,
            overflowed: false,
            lines_seen: 0,
            exhausted: false,
        }
    }

    /// Moves `chunk[start..until]` into the current line, or only counts it
    /// once the line has overflowed.
    fn absorb(&mut self, until: usize) {
        let segment = &self.chunk[self.start..until];
        self.line_len = self.line_len.saturating_add(segment.len());
        if !self.overflowed && self.line_len > self.max_line_bytes {
            self.overflowed = true;
            self.line = Vec::new();
        }
        if !self.overflowed {
            self.line.extend_from_slice(segment);
        }
        self.start = until;
    }

    fn emit(&mut self) -> BoundedLine {
        self.lines_seen += 1;
        let line_number = self.lines_seen;
        let observed_bytes = std::mem::take(&mut self.line_len);
        let bytes = std::mem::take(&mut self.line);
        if std::mem::take(&mut self.overflowed) {
            BoundedLine::LineTooLong {
                line_number,
                observed_bytes,
                max_line_bytes: self.max_line_bytes,
            }
        } else {
            BoundedLine::Line { line_number, bytes }
        }
    }

    pub async fn next_line(&mut self) -> Option<BoundedLine> {
        if self.exhausted {
            return None;
        }

        loop {
            if self.start == self.end {
                self.start = 0;
                self.end = 0;
                match self.reader.read(&mut self.chunk[..]).await {
                    Ok(0) => {
                        self.exhausted = true;
                        return (self.line_len > 0).then(|| self.emit());
                    }
                    Ok(n) => self.end = n,
                    Err(err) => {
                        self.exhausted = true;
                        self.lines_seen += 1;
                        return Some(BoundedLine::IoError {
                            line_number: self.lines_seen,
                            message: err.to_string(),
                        });
                    }
                }
            }

            match find_newline(&self.chunk[self.start..self.end]) {
                Some(offset) => {
                    self.absorb(self.start + offset);
                    self.start += 1;
                    return Some(self.emit());
                }
                None => self.absorb(self.end),
            }
        }
    }
}

fn find_newline(haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|b| *b == b'\n')
}
