use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::RapidError;

pub const DEFAULT_MAX_RETRY: u32 = 3;
pub const DEFAULT_MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024; // 5 MiB

/// Engine configuration, persisted as TOML. Missing fields fall back to
/// their defaults, so partial files stay loadable across versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory for final files and in-flight part files.
    pub download_location: PathBuf,
    /// App-private data directory.
    pub data_location: PathBuf,
    /// Per-chunk retry budget after a failed range request.
    pub max_retry: u32,
    /// Files smaller than this are never split, and this is the base
    /// part-size unit for the segmentation planner.
    pub min_chunk_size: u64,
    /// Per-request timeout applied to the built HTTP client. None leaves
    /// the client without a timeout.
    pub request_timeout_secs: Option<u64>,
    /// Name of the logger backend the embedding application selects.
    pub logger_provider: String,
    /// Name of the registered HTTP client to download with.
    pub http_client: String,
}

impl Default for Settings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let download_location =
            dirs::download_dir().unwrap_or_else(|| home.join("Downloads"));

        Self {
            download_location,
            data_location: home.join(".rapid"),
            max_retry: DEFAULT_MAX_RETRY,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            request_timeout_secs: None,
            logger_provider: "stdout".to_string(),
            http_client: "default".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. Creates a default settings file if it
    /// doesn't exist yet.
    pub fn load(path: &Path) -> Result<Self, RapidError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents).map_err(|e| {
                RapidError::Config(format!(
                    "failed to parse settings at {}: {e}",
                    path.display()
                ))
            })
        } else {
            let settings = Self::default();
            settings.save(path)?;
            Ok(settings)
        }
    }

    /// Write the current settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), RapidError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| RapidError::Config(format!("failed to serialize settings: {e}")))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_retry, 3);
        assert_eq!(settings.min_chunk_size, 5 * 1024 * 1024);
        assert_eq!(settings.request_timeout_secs, None);
        assert_eq!(settings.logger_provider, "stdout");
        assert_eq!(settings.http_client, "default");
        assert!(settings.data_location.ends_with(".rapid"));
    }

    #[test]
    fn test_load_creates_default_when_missing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rapid").join("settings.toml");

        assert!(!path.exists());
        let settings = Settings::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.max_retry, 3);
    }

    #[test]
    fn test_load_reads_existing_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");

        let partial = r#"
max_retry = 5
min_chunk_size = 1024
"#;
        std::fs::write(&path, partial).unwrap();

        let settings = Settings::load(&path).unwrap();

        // Explicitly set values
        assert_eq!(settings.max_retry, 5);
        assert_eq!(settings.min_chunk_size, 1024);

        // Defaults for unset values
        assert_eq!(settings.logger_provider, "stdout");
        assert!(settings.data_location.ends_with(".rapid"));
    }

    #[test]
    fn test_save_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.max_retry = 7;
        settings.request_timeout_secs = Some(30);
        settings.download_location = tmp.path().join("downloads");
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.max_retry, 7);
        assert_eq!(loaded.request_timeout_secs, Some(30));
        assert_eq!(loaded.download_location, settings.download_location);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "max_retry = \"not a number\"").unwrap();

        let result = Settings::load(&path);
        assert!(matches!(result, Err(RapidError::Config(_))));
    }
}
