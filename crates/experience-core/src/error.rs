//! Error types for experience store operations.

use std::error::Error;
use std::fmt;
use std::io;

/// Failures the store recovers from locally; surfaced to the caller so
/// command layers can report them and continue.
#[derive(Debug)]
pub enum ExperienceError {
    /// Underlying file IO failed.
    Io(io::Error),

    /// The file could not be opened at all.
    CannotOpen(String),

    /// The file carries no known signature or a ragged record run.
    InvalidFormat(String),

    /// The file exists but contains nothing at all.
    EmptyFile(String),
}

impl fmt::Display for ExperienceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperienceError::Io(e) => write!(f, "IO error: {e}"),
            ExperienceError::CannotOpen(path) => {
                write!(f, "Could not open experience file: {path}")
            }
            ExperienceError::InvalidFormat(path) => {
                write!(f, "The file [{path}] is not a valid experience file")
            }
            ExperienceError::EmptyFile(path) => {
                write!(f, "The experience file [{path}] is empty")
            }
        }
    }
}

impl Error for ExperienceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExperienceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ExperienceError {
    fn from(e: io::Error) -> Self {
        ExperienceError::Io(e)
    }
}
