//! Errors that abort the analysis of a single input.
//!
//! Unsatisfiable formulas, malformed tokens and incomplete sampling are *not*
//! errors: they degrade to vacuous results, diagnostics, or partial results.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No variable count could be derived from the header or the clauses.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The node table reached its configured capacity.
    #[error("node table exhausted: capacity of {capacity} nodes reached")]
    ResourceExhausted { capacity: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
