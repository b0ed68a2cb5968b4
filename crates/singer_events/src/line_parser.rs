use std::error::Error;

use crate::error::ParseErrorCode;

pub trait LineParser {
    type Event;
    type Error: ClassifiedParserError;

    fn parse_line(&mut self, line: &str) -> Result<Option<Self::Event>, Self::Error>;
}

pub trait ClassifiedParserError: Error {
    fn code(&self) -> ParseErrorCode;

    fn summary(&self) -> String {
        self.to_string()
    }
}
