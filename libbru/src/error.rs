//! Error types for Bru parsing and conversion.

use std::fmt;
use thiserror::Error;

/// Result type for Bru parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse context carrying filename for error reporting.
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    pub filename: Option<String>,
}

impl ParseContext {
    /// Create a new parse context.
    pub fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(String::from),
        }
    }

    /// Build a location for a zero-based line and column.
    pub fn at(&self, line: usize, col: usize) -> Location {
        Location {
            line,
            col,
            filename: self.filename.clone(),
        }
    }
}

/// Position of a structural error in the source text.
///
/// `line` and `col` are zero-based; they display one-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
    pub filename: Option<String>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " at {}:{}", self.line + 1, self.col + 1)?;
        if let Some(name) = &self.filename {
            write!(f, " of <{}>", name)?;
        }
        Ok(())
    }
}

/// Structural error found while parsing a Bru document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The document has no `meta` block.
    #[error("Missing meta block{0}")]
    MissingMeta(Location),

    /// The document has more than one `meta` block.
    #[error("Duplicate meta block{0}")]
    DuplicateMeta(Location),

    /// The `meta` block is not a dictionary.
    #[error("Meta block must be a dictionary{0}")]
    InvalidMeta(Location),

    /// A block header could not be parsed.
    #[error("Invalid block header \"{0}\"{1}")]
    InvalidHeader(String, Location),

    /// A block has no closing marker before the end of input.
    #[error("Unterminated block \"{0}\"{1}")]
    UnterminatedBlock(String, Location),

    /// A multi-line dictionary value has no closing quotes.
    #[error("Unterminated multi-line value{0}")]
    UnterminatedMultiline(Location),

    /// A dictionary line has no colon.
    #[error("Expected colon after key{0}")]
    ExpectedColon(Location),

    /// A quoted dictionary key is missing its closing quote.
    #[error("Unterminated quoted key{0}")]
    UnterminatedKey(Location),

    /// Content outside of any block.
    #[error("Unexpected content outside of a block{0}")]
    UnexpectedContent(Location),

    /// An embedded dictionary payload could not be decoded.
    #[error("Invalid embedded dictionary: {0}{1}")]
    InvalidEmbedded(String, Location),
}

impl ParseError {
    /// Where in the source the error was found.
    pub fn location(&self) -> &Location {
        match self {
            ParseError::MissingMeta(loc)
            | ParseError::DuplicateMeta(loc)
            | ParseError::InvalidMeta(loc)
            | ParseError::InvalidHeader(_, loc)
            | ParseError::UnterminatedBlock(_, loc)
            | ParseError::UnterminatedMultiline(loc)
            | ParseError::ExpectedColon(loc)
            | ParseError::UnterminatedKey(loc)
            | ParseError::UnexpectedContent(loc)
            | ParseError::InvalidEmbedded(_, loc) => loc,
        }
    }

    /// One-based line number of the error.
    pub fn line(&self) -> usize {
        self.location().line + 1
    }
}

/// Error returned by the conversion engine.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// The document failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The isolated task panicked or was torn down before finishing.
    #[error("worker crashed: {0}")]
    WorkerCrashed(String),

    /// The lane's queue shut down before the task completed.
    #[error("worker queue closed before the task completed")]
    QueueClosed,

    /// The executor produced a result of the wrong shape.
    #[error("unexpected worker output: expected {0}")]
    UnexpectedOutput(&'static str),

    /// The document could not be measured for routing.
    #[error("could not measure payload: {0}")]
    Measure(String),
}
