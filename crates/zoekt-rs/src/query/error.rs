use std::error::Error;
use std::fmt::{self, Display};

/// Reasons a query is rejected before any shard work is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query text contained no terms.
    EmptyQuery,
    /// A substring leaf with an empty pattern.
    EmptyPattern,
    /// A regular expression that failed to compile.
    InvalidRegex { pattern: String, message: String },
    /// Query text that could not be parsed.
    Syntax(String),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::EmptyQuery => write!(f, "empty query"),
            QueryError::EmptyPattern => write!(f, "empty substring pattern"),
            QueryError::InvalidRegex { pattern, message } => {
                write!(f, "invalid regex {:?}: {}", pattern, message)
            }
            QueryError::Syntax(s) => write!(f, "syntax error: {}", s),
        }
    }
}

impl Error for QueryError {}

