//! Error types for the Clou engine.
//!
//! The engine surfaces three kinds of failure to its embedder: scan
//! errors, parse errors, and runtime errors.  Each carries the message
//! text plus the 1-based source line where one is known (`line` is 0 for
//! failures with no source position, such as a module lookup that misses
//! before any source is read).  I/O and UTF-8 wrappers exist so the CLI
//! and module ingestion can propagate with `?`.
//!
//! Message texts are the engine's stable contract; pretty context
//! rendering (source excerpts, suggestions) is an embedder concern
//! layered on top of these kinds.

use std::io;

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClouError {
    /// The scanner hit a malformed token.
    #[error("[line {line}] Scan error: {message}")]
    Lex { message: String, line: usize },

    /// The token stream does not form a valid program.
    #[error("[line {line}] Parse error: {message}")]
    Parse { message: String, line: usize },

    /// Evaluation failed.
    #[error("[line {line}] Runtime error: {message}")]
    Runtime { message: String, line: usize },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl ClouError {
    pub fn lex(line: usize, message: impl Into<String>) -> Self {
        ClouError::Lex {
            message: message.into(),
            line,
        }
        .traced()
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        ClouError::Parse {
            message: message.into(),
            line,
        }
        .traced()
    }

    pub fn runtime(line: usize, message: impl Into<String>) -> Self {
        ClouError::Runtime {
            message: message.into(),
            line,
        }
        .traced()
    }

    fn traced(self) -> Self {
        debug!("raising {}", self);

        self
    }

    /// The bare message, without the line prefix.
    pub fn message(&self) -> String {
        match self {
            ClouError::Lex { message, .. }
            | ClouError::Parse { message, .. }
            | ClouError::Runtime { message, .. } => message.clone(),

            ClouError::Io(e) => e.to_string(),

            ClouError::Utf8(e) => e.to_string(),
        }
    }

    /// The source line the error points at, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            ClouError::Lex { line, .. }
            | ClouError::Parse { line, .. }
            | ClouError::Runtime { line, .. } => {
                if *line == 0 {
                    None
                } else {
                    Some(*line)
                }
            }

            _ => None,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ClouError>;
