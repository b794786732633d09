//!
//! src/errors.rs
//!
//! Defines the error taxonomy of the ingestion pipeline and the
//! conversions from the libraries it sits on
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("config error: {0}")]
    Config(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream status {status} from {url}")]
    UpstreamStatus { status: u16, url: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("credential rejected (status {status})")]
    Auth { status: u16 },
    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Payload-free tag of an `IngestError`, for progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Config,
    Network,
    UpstreamStatus,
    Decode,
    Auth,
    Filesystem
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Config         => "config",
            FailureKind::Network        => "network",
            FailureKind::UpstreamStatus => "upstream-status",
            FailureKind::Decode         => "decode",
            FailureKind::Auth           => "auth",
            FailureKind::Filesystem     => "filesystem"
        }
    }
}

impl IngestError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::Config(_)            => FailureKind::Config,
            IngestError::Network(_)           => FailureKind::Network,
            IngestError::UpstreamStatus { .. } => FailureKind::UpstreamStatus,
            IngestError::Decode(_)            => FailureKind::Decode,
            IngestError::Auth { .. }          => FailureKind::Auth,
            IngestError::Filesystem(_)        => FailureKind::Filesystem
        }
    }

    /// Maps a non-success status from the media service. 401/403 mean the
    /// operator has to supply a new credential
    pub fn from_media_status(status: reqwest::StatusCode, url: &str) -> Self {
        match status.as_u16() {
            401 | 403 => IngestError::Auth { status: status.as_u16() },
            other => IngestError::UpstreamStatus { status: other, url: url.to_string() }
        }
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return IngestError::Decode(e.to_string());
        }
        match (e.is_status(), e.status()) {
            (true, Some(status)) => IngestError::UpstreamStatus {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default()
            },
            _ => IngestError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self { IngestError::Decode(e.to_string()) }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self { IngestError::Filesystem(e.to_string()) }
}
