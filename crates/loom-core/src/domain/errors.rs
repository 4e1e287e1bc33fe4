//! Errors - 実行エラーと分類
//!
//! retry エンジンが参照するのは `Classify` だけです。
//! - `Some(Transient)`: 一時的なエラー（リトライ推奨）
//! - `Some(Permanent)`: 恒久的なエラー（リトライ無意味）
//! - `None`: 分類できない値。バグをネットワークの揺らぎに見せないため、即座に失敗させる

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Error classifier contract.
///
/// Any failure value the retry engine sees must answer whether it is worth
/// retrying. The human-readable message comes from `Display`.
pub trait Classify {
    fn error_kind(&self) -> Option<ErrorKind>;
}

/// Failure of a task operation.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Rate limiting, timeouts, temporary unavailability.
    #[error("{0}")]
    Transient(String),

    /// Invalid input, invalid credentials, business-rule violations.
    #[error("{0}")]
    Permanent(String),

    /// Anything the operation could not put into either bucket.
    #[error(transparent)]
    Unclassified(Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn transient(message: impl Into<String>) -> Self {
        TaskError::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        TaskError::Permanent(message.into())
    }

    pub fn unclassified(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TaskError::Unclassified(err.into())
    }

    /// Wrap an upstream AI provider failure, classifying it by its message.
    pub fn from_upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        match classify_upstream_message(&message) {
            ErrorKind::Transient => TaskError::Transient(message),
            ErrorKind::Permanent => TaskError::Permanent(message),
        }
    }
}

impl Classify for TaskError {
    fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            TaskError::Transient(_) => Some(ErrorKind::Transient),
            TaskError::Permanent(_) => Some(ErrorKind::Permanent),
            TaskError::Unclassified(_) => None,
        }
    }
}

const PERMANENT_PHRASES: &[&str] = &[
    "invalid api key",
    "invalid_api_key",
    "incorrect api key",
    "unauthorized",
    "401",
    "403",
    "permission denied",
    "content policy",
    "billing",
    "insufficient_quota",
];

const TRANSIENT_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "too many requests",
    "429",
    "overloaded",
    "timeout",
    "timed out",
    "502",
    "503",
    "504",
    "service unavailable",
    "temporarily unavailable",
    "connection reset",
    "econnreset",
];

/// Substring classification of an upstream provider message.
///
/// Permanent phrases win over transient ones, and anything unrecognised is
/// permanent.
pub fn classify_upstream_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if PERMANENT_PHRASES.iter().any(|p| lower.contains(p)) {
        return ErrorKind::Permanent;
    }
    if TRANSIENT_PHRASES.iter().any(|p| lower.contains(p)) {
        return ErrorKind::Transient;
    }
    ErrorKind::Permanent
}
