//! Error taxonomy (spec §7). Each kind carries the fields needed to format
//! the message text the original Dovecot backend produced, so callers that
//! log the `Display` output see the same diagnostics.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DictSqlError {
    #[error("Invalid/unmapped key: {key}")]
    UnmappedKey { key: String },

    #[error("Invalid/unmapped path: {path}")]
    InvalidPath { path: String },

    #[error("Key continues past the matched pattern {pattern}")]
    KeyPastPattern { pattern: String },

    #[error("{field}'s value isn't a valid {type_name}: {value} (in pattern: {pattern})")]
    InvalidValue {
        field: String,
        type_name: &'static str,
        value: String,
        pattern: String,
    },

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("commit uncertain: {0}")]
    WriteUncertain(String),

    #[error("not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, DictSqlError>;
