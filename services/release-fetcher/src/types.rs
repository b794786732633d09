use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::IngestError;

/// One catalog search hit the operator can pick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub url: String,
    pub title: String,
    pub image: String
}

impl Record {
    /// Secondary line for list rendering
    pub fn description(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Full upstream document for one release, shape is not guaranteed so it
/// is only ever read through `crate::extract`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ReleaseDetail(pub Value);

impl ReleaseDetail {
    pub fn doc(&self) -> &Value {
        &self.0
    }
}

/// Upload-ready payload. Every field is always set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub title: String,
    pub genre: String,
    pub additional: String,
    pub description: String,
    pub release_date: String,
    pub image_url: String,
    pub author_id: u64,
    pub image: String
}

/// Credentials and identifiers constant over one ingestion run
#[derive(Debug, Clone)]
pub struct Session {
    pub media_token: String,
    pub author_id: u64,
    pub catalog_token: Option<String>
}

#[derive(Debug)]
pub enum ItemStatus {
    Uploaded {
        request: Request,
        image: Option<PathBuf>,
        image_error: Option<IngestError>
    },
    Failed(IngestError),
    Skipped
}

/// Result of one selected record, end to end
#[derive(Debug)]
pub struct ItemOutcome {
    pub index: usize,
    pub title: String,
    pub status: ItemStatus,
    pub finished_at: DateTime<Utc>
}

impl ItemOutcome {
    pub fn new(index: usize, title: &str, status: ItemStatus) -> Self {
        Self { index, title: title.to_string(), status, finished_at: Utc::now() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Uploaded { .. })
    }

    pub fn error(&self) -> Option<&IngestError> {
        match &self.status {
            ItemStatus::Failed(e) => Some(e),
            _ => None
        }
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}: ", self.finished_at.format("%H:%M:%S"), self.index, self.title)?;
        match &self.status {
            ItemStatus::Uploaded { image_error: None, .. } => f.write_str("uploaded"),
            ItemStatus::Uploaded { image_error: Some(e), .. } =>
                write!(f, "uploaded without cover ({e})"),
            ItemStatus::Failed(e) => write!(f, "failed [{}] {}", e.kind().as_str(), e),
            ItemStatus::Skipped => f.write_str("skipped")
        }
    }
}
