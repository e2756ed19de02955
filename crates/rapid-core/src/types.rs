use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ─── File Kinds ─────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Document,
    Compressed,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Compressed => "compressed",
            Self::Other => "other",
        }
    }
}

// ─── Progress Reporting ─────────────────────────────

/// A single progress update for one chunk of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub entry_id: String,
    pub chunk_index: usize,
    /// Bytes received so far in the current attempt.
    pub downloaded: u64,
    /// Percentage of the current attempt's remaining range, 0.0 when the
    /// range length is unknown.
    pub percent: f64,
}

/// Progress callback installed through `Downloader::watch`.
///
/// Invoked from every worker that is streaming a chunk, so calls arrive
/// concurrently; the callback is responsible for its own synchronization.
pub type OnProgress = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

// ─── Error Types ────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RapidError {
    #[error("HTTP error: {status} {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("file system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("config error: {0}")]
    Config(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("download link is expired: {0}")]
    UrlExpired(String),

    #[error("worker pool concurrency can't be less than 1")]
    InvalidConcurrency,

    #[error("download cancelled")]
    Cancelled,

    #[error("downloader provider {0} is not registered")]
    UnknownProvider(String),
}

impl From<RapidError> for String {
    fn from(err: RapidError) -> String {
        err.to_string()
    }
}
