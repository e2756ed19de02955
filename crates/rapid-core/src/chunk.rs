use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{COOKIE, RANGE};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::Settings;
use crate::entry::Entry;
use crate::planner;
use crate::pool::Job;
use crate::progress::ProgressReader;
use crate::types::{OnProgress, RapidError};

/// One byte range of one entry, streamed into its own part file.
///
/// The job is cancellable at every await point through the pool context,
/// and carries its own retry/resume policy in `on_error`. The completion
/// sender is dropped when the worker is done with the job, which is how
/// the controller counts finished chunks.
pub struct ChunkJob {
    entry: Arc<Entry>,
    settings: Arc<Settings>,
    client: reqwest::Client,
    index: usize,
    /// Start offset the planner assigned; retries measure from here.
    planned_start: u64,
    start: u64,
    /// Inclusive end offset; None when the resource length is unknown and
    /// the chunk streams to EOF.
    end: Option<u64>,
    path: PathBuf,
    on_progress: Option<OnProgress>,
    _completion: mpsc::Sender<()>,
}

impl ChunkJob {
    pub fn new(
        entry: Arc<Entry>,
        index: usize,
        settings: Arc<Settings>,
        client: reqwest::Client,
        completion: mpsc::Sender<()>,
    ) -> Self {
        let path = entry.part_path(&settings.download_location, index);
        let (start, end) = match entry.size() {
            Some(size) if size > 0 => {
                let (start, end) = planner::range_of(index, entry.chunk_count(), size);
                (start, Some(end))
            }
            _ => (0, None),
        };

        Self {
            entry,
            settings,
            client,
            index,
            planned_start: start,
            start,
            end,
            path,
            on_progress: None,
            _completion: completion,
        }
    }

    pub fn set_on_progress(&mut self, on_progress: OnProgress) {
        self.on_progress = Some(on_progress);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full planned size of this chunk, when the resource length is known.
    pub fn expected_size(&self) -> Option<u64> {
        self.end.map(|end| end - self.planned_start + 1)
    }

    /// Skip `bytes` already on disk: the next request starts that far past
    /// the planned offset.
    pub fn offset_by(&mut self, bytes: u64) {
        self.start = self.planned_start + bytes;
    }

    async fn download(&mut self, ctx: &CancellationToken) -> Result<(), RapidError> {
        if ctx.is_cancelled() || self.entry.is_cancelled() {
            return Ok(());
        }
        if let Some(end) = self.end {
            if self.start > end {
                // nothing left, e.g. a retry after the range completed
                return Ok(());
            }
        }

        debug!(
            chunk = self.index,
            start = self.start,
            end = ?self.end,
            "downloading chunk"
        );
        let started_at = Instant::now();

        let mut request = self.client.get(self.entry.url());
        if self.entry.is_resumable() {
            match self.end {
                Some(end) => {
                    request = request.header(RANGE, format!("bytes={}-{}", self.start, end));
                }
                // unknown length: only ask for a suffix when skipping bytes
                None if self.start > 0 => {
                    request = request.header(RANGE, format!("bytes={}-", self.start));
                }
                None => {}
            }
        }
        if let Some(cookies) = self.entry.cookies() {
            request = request.header(COOKIE, cookies.to_string());
        }

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(RapidError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(RapidError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        let remaining = self.end.map(|end| end - self.start + 1);
        let mut body = ProgressReader::new(
            response.bytes_stream().boxed(),
            self.entry.id().to_string(),
            self.index,
            remaining,
            self.on_progress.clone(),
        );

        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Err(RapidError::Cancelled),
                next = body.next() => match next {
                    Some(Ok(bytes)) => file.write_all(&bytes).await?,
                    Some(Err(err)) => return Err(RapidError::Network(err)),
                    None => break,
                }
            }
        }
        file.flush().await?;

        debug!(
            chunk = self.index,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "chunk downloaded"
        );
        Ok(())
    }
}

#[async_trait]
impl Job for ChunkJob {
    async fn execute(&mut self, ctx: &CancellationToken) -> Result<(), RapidError> {
        self.download(ctx).await
    }

    /// Retry policy: up to `max_retry` re-entries, each resuming a
    /// resumable entry from the bytes already in the part file. A stop
    /// (cancelled context) never re-arms a retry.
    async fn on_error(&mut self, ctx: &CancellationToken, err: RapidError) {
        if ctx.is_cancelled() || self.entry.is_cancelled() {
            return;
        }

        warn!(chunk = self.index, error = %err, "chunk download failed, retrying");
        let mut last = err;

        for attempt in 1..=self.settings.max_retry {
            if self.entry.is_resumable() {
                let downloaded = tokio::fs::metadata(&self.path)
                    .await
                    .map(|meta| meta.len())
                    .unwrap_or(0);
                self.offset_by(downloaded);
            }

            match self.download(ctx).await {
                Ok(()) => return,
                Err(RapidError::Cancelled) => return,
                Err(err) => {
                    warn!(chunk = self.index, attempt, error = %err, "retry failed");
                    last = err;
                }
            }
        }

        error!(chunk = self.index, error = %last, "giving up on chunk after retries");
    }
}
