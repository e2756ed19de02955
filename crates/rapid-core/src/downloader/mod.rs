pub mod local;

pub use local::LocalDownloader;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Settings;
use crate::entry::Entry;
use crate::types::{OnProgress, RapidError};

/// Name of the built-in local-file provider.
pub const PROVIDER_DEFAULT: &str = "default";

/// A download backend: performs, resumes, restarts, and stops downloads
/// for fetched entries.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, entry: Arc<Entry>) -> Result<(), RapidError>;
    async fn resume(&self, entry: Arc<Entry>) -> Result<(), RapidError>;
    async fn restart(&self, entry: Arc<Entry>) -> Result<(), RapidError>;
    /// Cancel the entry's in-flight work. Returns immediately and never
    /// fails.
    async fn stop(&self, entry: &Entry) -> Result<(), RapidError>;
    /// Install a progress callback. Must be called before `download`; the
    /// callback is invoked concurrently from every chunk worker.
    fn watch(&mut self, on_progress: OnProgress);
}

/// Inputs a provider factory builds a downloader from.
pub struct DownloaderOptions {
    pub settings: Arc<Settings>,
    /// Custom HTTP client; the factory builds one from the settings when
    /// absent.
    pub client: Option<reqwest::Client>,
}

pub type DownloaderFactory =
    Box<dyn Fn(&DownloaderOptions) -> Result<Box<dyn Downloader>, RapidError> + Send + Sync>;

/// Explicit name → factory table for download providers. The `"default"`
/// local-file provider is pre-registered; looking up an unregistered name
/// is an error, not a crash.
pub struct DownloaderRegistry {
    factories: HashMap<String, DownloaderFactory>,
}

impl DownloaderRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register(
            PROVIDER_DEFAULT,
            Box::new(|options| {
                Ok(Box::new(LocalDownloader::new(options)?) as Box<dyn Downloader>)
            }),
        );
        registry
    }

    pub fn register(&mut self, name: &str, factory: DownloaderFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(
        &self,
        provider: &str,
        options: &DownloaderOptions,
    ) -> Result<Box<dyn Downloader>, RapidError> {
        let factory = self
            .factories
            .get(provider)
            .ok_or_else(|| RapidError::UnknownProvider(provider.to_string()))?;
        factory(options)
    }
}

impl Default for DownloaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
