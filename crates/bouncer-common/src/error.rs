use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected column: {0}")]
    UnexpectedColumn(String),
    #[error("invalid integer in column {column}: {value:?}")]
    InvalidInteger { column: String, value: String },
    #[error("row has {actual} values, expected {expected}")]
    RowWidth { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("query failed: {0}")]
    Query(String),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("store timed out after {0:?}")]
    Timeout(Duration),
    #[error("store is closed")]
    Closed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("metric already registered: {0}")]
    DuplicateMetric(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ExporterError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Query(_) => "query",
            Self::Connect(_) => "connect",
            Self::Timeout(_) => "timeout",
            Self::Closed => "closed",
            Self::InvalidConfig(_) => "config",
            Self::DuplicateMetric(_) => "duplicate_metric",
            Self::InternalError(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
