// src/error.rs
//! Typed errors for the fetch → dedupe → cache pipeline and the daily scheduler.

use std::time::Duration;

use thiserror::Error;

/// Anything that can go wrong while pulling one page of articles.
/// Every variant is recoverable: the scheduler logs it and waits for the next cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("news fetch timed out after {} milliseconds", .deadline.as_millis())]
    Timeout { deadline: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("news api error {code}: {message}")]
    Api { code: String, message: String },

    #[error("malformed news api response: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return FetchError::Transport(format!("decoding body: {e}"));
        }
        FetchError::Transport(e.to_string())
    }
}

/// Configuration defects in the daily schedule. Surfaced once, at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid timezone: {0:?}")]
    InvalidTimezone(String),

    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },
}

/// A domain allow-list entry that is not a bare root domain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain {0:?} must not carry a scheme")]
    Scheme(String),

    #[error("domain {0:?} must not carry a path, query or port")]
    Path(String),

    #[error("{given:?} is a subdomain; list the root domain {root:?} instead")]
    NotRoot { given: String, root: String },

    #[error("{0:?} is not a valid domain name")]
    Invalid(String),
}

/// Cache backend failures. Logged per key; never aborts a cycle.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache value encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}
