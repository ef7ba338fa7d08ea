//! Error types shared across the bot.

use thiserror::Error;

use crate::quiz::ContentId;

/// Failures of the content catalog. Always distinct from "no match".
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("content '{0}' is referenced by a rule but missing from the catalog")]
    MissingContent(ContentId),

    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the durable key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum MatchError {
    /// Both the strict and the relaxed query came back empty.
    #[error("no content matches the quiz answers")]
    NoMatch,

    /// The quiz was handed over without a practice type.
    #[error("quiz is not complete")]
    Incomplete,

    #[error("couldn't search the catalog: {0}")]
    Transport(#[from] CatalogError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Text coming from outside (callback data, catalog rows) that doesn't name a known option.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseOptionError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseOptionError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
