// src/error.rs
// =============================================================================
// Error types shared by every part of the mirror.
//
// Three layers:
// - FetchError: what a single retrieval can fail with (the fetcher contract)
// - MirrorError: everything else that can go wrong while mirroring a site
// - FailureKind: the short, serializable label we record per failed page or
//   asset and print in the summary
//
// Per-page failures never travel up as Err values: the scheduler turns them
// into FailureKind records and keeps crawling. Only parse errors on seeds and
// disk errors in the writer are returned to the caller.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors a single fetch can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("disallowed by robots.txt")]
    RobotsDisallowed,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Timeout => FailureKind::Timeout,
            FetchError::NotFound => FailureKind::NotFound,
            FetchError::Forbidden => FailureKind::Forbidden,
            FetchError::HttpStatus(_) => FailureKind::HttpError,
            FetchError::NetworkFailure(_) => FailureKind::NetworkFailure,
            FetchError::RobotsDisallowed => FailureKind::RobotsDisallowed,
        }
    }

    // Failures worth another attempt: the server or the network may recover.
    // 4xx answers and robots refusals will not change on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::NetworkFailure(_) => true,
            FetchError::HttpStatus(code) => *code >= 500,
            _ => false,
        }
    }

    // The host itself looks unreachable (as opposed to one missing path).
    pub fn is_host_failure(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::NetworkFailure(_))
    }
}

/// Errors that abort mirroring of one seed or one site.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid URL '{input}': {source}")]
    Parse {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MirrorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Label recorded against a failed page or asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ParseFailure,
    Timeout,
    NetworkFailure,
    NotFound,
    Forbidden,
    HttpError,
    RobotsDisallowed,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::ParseFailure => "PARSE FAILURE",
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::NetworkFailure => "NETWORK FAILURE",
            FailureKind::NotFound => "NOT FOUND",
            FailureKind::Forbidden => "FORBIDDEN",
            FailureKind::HttpError => "HTTP ERROR",
            FailureKind::RobotsDisallowed => "ROBOTS DISALLOWED",
        }
    }
}
