use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("connection error: {details}")]
    Connect { details: Cow<'static, str> },

    #[error("execution failed: {details}")]
    Exec { details: Cow<'static, str> },

    #[error("query failed: {details}")]
    Query { details: Cow<'static, str> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The subscriber-level error taxonomy. `Config` and `Connect` are fatal for
/// the current Init; `Ddl` and `Dml` reject the current record only, leaving
/// the shape cache in its pre-record state so the next record retries.
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("invalid configuration: {details}")]
    Config { details: Cow<'static, str> },

    #[error("connection error: {details}")]
    Connect { details: Cow<'static, str> },

    #[error("introspection failed: {details}")]
    Introspect { details: Cow<'static, str> },

    #[error("schema change failed: {details}")]
    Ddl { details: Cow<'static, str> },

    #[error("row write failed: {details}")]
    Dml { details: Cow<'static, str> },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subscriber is not initialized; call Init first")]
    NotInitialized,
}

impl SubscriberError {
    pub fn config(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            details: details.into(),
        }
    }

    pub fn connect(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Connect {
            details: details.into(),
        }
    }

    pub fn introspect(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Introspect {
            details: details.into(),
        }
    }

    pub fn ddl(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Ddl {
            details: details.into(),
        }
    }

    pub fn dml(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Dml {
            details: details.into(),
        }
    }
}

pub type DestinationResult<T> = Result<T, DestinationError>;
pub type SubscriberResult<T> = Result<T, SubscriberError>;
