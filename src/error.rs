//! Error types for the slicing engine and command protocol

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SliceError>;

#[derive(Error, Debug)]
pub enum SliceError {
    #[error("malformed line: no tab separator")]
    MalformedLine,

    #[error("unknown record type '{0}'")]
    UnknownRecordType(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("no such node: {0}")]
    NoSuchNode(i64),

    #[error("no such edge: {src} -> {targ}")]
    NoSuchEdge { src: i64, targ: i64 },

    #[error("missing attribute '{0}'")]
    MissingAttribute(String),

    #[error("unexpected command, '{0}'")]
    UnexpectedCommand(String),

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recoverable per-record failures collected during a best-effort load.
///
/// A load keeps going past individual bad records; the caller receives
/// both the graph that did load and every failure that occurred.
#[derive(Debug, Default)]
pub struct ParseErrors(pub Vec<SliceError>);

/// Per-record failures collected during a best-effort serialization.
#[derive(Debug, Default)]
pub struct SerializeErrors(pub Vec<SliceError>);

impl ParseErrors {
    pub fn push(&mut self, err: SliceError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl SerializeErrors {
    pub fn push(&mut self, err: SliceError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "[{}]", msgs.join(","))
    }
}

impl fmt::Display for SerializeErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "[{}]", msgs.join(","))
    }
}
