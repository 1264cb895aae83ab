use std::fmt;

use sync_core::SyncRejection;
use thiserror::Error;

/// Classified failure of a single navigation. Terminal for that navigation only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("no internet connection")]
    NoConnectivity,
    #[error("navigation timed out")]
    Timeout,
    #[error("host unreachable")]
    HostUnreachable,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("navigation failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("unexpected script result: {0}")]
    Decode(String),
    #[error("no page is loaded")]
    NoPage,
}

/// Returned synchronously from controller requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Rejected(#[from] SyncRejection),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Why a discovered element produced no record. Logged, never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no title could be derived")]
    MissingTitle,
    #[error("no source url could be derived")]
    MissingUrl,
}

/// How an extraction run reached `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    NoNewContent,
    DiscoveryExhausted,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionReason::NoNewContent => write!(f, "no new content after pagination"),
            CompletionReason::DiscoveryExhausted => {
                write!(f, "no elements found after repeated retries")
            }
        }
    }
}
