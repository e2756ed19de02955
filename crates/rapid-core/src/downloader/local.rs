// Downloader that saves the result into a local file.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::chunk::ChunkJob;
use crate::config::Settings;
use crate::entry::{self, Entry};
use crate::pool::WorkerPool;
use crate::types::{OnProgress, RapidError};

use super::{Downloader, DownloaderOptions};

/// Controller for the built-in `"default"` provider: fans an entry out into
/// chunk jobs on a per-download pool, waits for them, and assembles the
/// part files into the destination.
pub struct LocalDownloader {
    settings: Arc<Settings>,
    client: reqwest::Client,
    on_progress: Option<OnProgress>,
}

impl LocalDownloader {
    pub fn new(options: &DownloaderOptions) -> Result<Self, RapidError> {
        let client = match &options.client {
            Some(client) => client.clone(),
            None => entry::build_client(&options.settings)?,
        };

        Ok(Self {
            settings: options.settings.clone(),
            client,
            on_progress: None,
        })
    }

    /// Run the entry's chunk jobs to completion on a fresh pool bound to
    /// its token, waiting until every job is done. Returns true when the
    /// entry was stopped while they ran; the caller then skips assembly
    /// and leaves the part files for a later resume.
    async fn run(&self, entry: &Arc<Entry>, only_incomplete: bool) -> Result<bool, RapidError> {
        let token = entry.cancel_token();
        let pool = WorkerPool::new(token.clone(), entry.chunk_count(), entry.chunk_count())?;
        pool.start();

        let (completion, mut completions) = mpsc::channel::<()>(1);
        for index in 0..entry.chunk_count() {
            let mut job = ChunkJob::new(
                entry.clone(),
                index,
                self.settings.clone(),
                self.client.clone(),
                completion.clone(),
            );

            if only_incomplete {
                if let Ok(meta) = tokio::fs::metadata(job.path()).await {
                    if Some(meta.len()) == job.expected_size() {
                        debug!(chunk = index, "part already complete, skipping");
                        continue;
                    }
                    job.offset_by(meta.len());
                }
            }

            if let Some(on_progress) = &self.on_progress {
                job.set_on_progress(on_progress.clone());
            }
            pool.add(Box::new(job)).await;
        }
        drop(completion);

        // Wait for every job to be done before touching any part file
        // again: the completion channel closes once all jobs have been
        // dropped, whether a worker finished them or the exiting workers
        // tore down the queue. Cancelled jobs bail out at their next
        // cancellation check, so a stopped download drains quickly.
        while completions.recv().await.is_some() {}
        pool.stop();

        Ok(token.is_cancelled())
    }

    /// Combine part files into the destination file. A single-chunk entry
    /// is just renamed; otherwise parts are appended in index order and
    /// deleted as they go.
    async fn assemble(&self, entry: &Entry) -> Result<(), RapidError> {
        let dir = &self.settings.download_location;

        if entry.chunk_count() == 1 {
            let part = entry.part_path(dir, 0);
            tokio::fs::rename(&part, entry.location()).await?;
            return Ok(());
        }

        let mut file = tokio::fs::File::create(entry.location()).await?;
        for index in 0..entry.chunk_count() {
            let part = entry.part_path(dir, index);
            let mut source = tokio::fs::File::open(&part).await?;
            tokio::io::copy(&mut source, &mut file).await?;
            tokio::fs::remove_file(&part).await?;
        }
        file.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl Downloader for LocalDownloader {
    async fn download(&self, entry: Arc<Entry>) -> Result<(), RapidError> {
        let started_at = Instant::now();

        if entry.is_expired(&self.client).await {
            return Err(RapidError::UrlExpired(entry.url().to_string()));
        }

        if self.run(&entry, false).await? {
            debug!(name = entry.name(), "download stopped, keeping part files");
            return Ok(());
        }

        self.assemble(&entry).await?;

        info!(
            name = entry.name(),
            elapsed_secs = started_at.elapsed().as_secs_f64(),
            "download finished"
        );
        Ok(())
    }

    async fn resume(&self, entry: Arc<Entry>) -> Result<(), RapidError> {
        let started_at = Instant::now();

        if entry.is_expired(&self.client).await {
            return Err(RapidError::UrlExpired(entry.url().to_string()));
        }

        entry.refresh();
        debug!(name = entry.name(), "resuming download");

        if !entry.is_resumable() {
            debug!(
                name = entry.name(),
                "server does not support ranges, downloading from scratch"
            );
            return self.download(entry).await;
        }

        if self.run(&entry, true).await? {
            debug!(name = entry.name(), "resume stopped, keeping part files");
            return Ok(());
        }

        self.assemble(&entry).await?;

        info!(
            name = entry.name(),
            elapsed_secs = started_at.elapsed().as_secs_f64(),
            "download resumed"
        );
        Ok(())
    }

    async fn restart(&self, entry: Arc<Entry>) -> Result<(), RapidError> {
        debug!(name = entry.name(), "restarting download");

        if entry.is_expired(&self.client).await {
            return Err(RapidError::UrlExpired(entry.url().to_string()));
        }

        entry.refresh();

        for index in 0..entry.chunk_count() {
            let part = entry.part_path(&self.settings.download_location, index);
            match tokio::fs::remove_file(&part).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        self.download(entry).await
    }

    async fn stop(&self, entry: &Entry) -> Result<(), RapidError> {
        debug!(name = entry.name(), "stopping download");
        entry.cancel();
        Ok(())
    }

    fn watch(&mut self, on_progress: OnProgress) {
        self.on_progress = Some(on_progress);
    }
}
