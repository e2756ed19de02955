use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, COOKIE};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::Settings;
use crate::metadata;
use crate::planner;
use crate::types::{FileKind, RapidError};

const USER_AGENT: &str = "rapid/0.2.0";
const ID_LEN: usize = 10;

/// Extra inputs for [`fetch`].
#[derive(Debug, Default)]
pub struct FetchOptions {
    /// Raw `Cookie` header value forwarded on every request for the entry.
    pub cookies: Option<String>,
    /// HTTP client to probe with; a fresh one is built from the settings
    /// when absent.
    pub client: Option<reqwest::Client>,
}

/// Descriptor of one remote resource scheduled for download.
///
/// Everything but the cancellation handle is fixed at fetch time. The
/// handle can be tripped (`cancel`) and later swapped for a fresh one
/// (`refresh`); holders that cloned the old token keep observing the old
/// state, which is exactly what lets a stopped download's workers wind
/// down while a resume starts over with a clean token.
#[derive(Debug)]
pub struct Entry {
    id: String,
    url: String,
    name: String,
    location: PathBuf,
    size: Option<u64>,
    kind: FileKind,
    resumable: bool,
    chunk_count: usize,
    cookies: Option<String>,
    date: DateTime<Utc>,
    cancel: RwLock<CancellationToken>,
}

/// Probe `input_url` and build an [`Entry`] for it.
///
/// Issues a HEAD request (cookies forwarded), keeps the post-redirect URL,
/// reads the declared size and range support, derives the filename from
/// `Content-Disposition` or the URL path, and resolves the destination
/// against already-existing files. The chunk layout is planned here: a
/// server that doesn't advertise `Accept-Ranges: bytes` always gets a
/// single streaming chunk.
pub async fn fetch(
    input_url: &str,
    settings: &Settings,
    options: FetchOptions,
) -> Result<Entry, RapidError> {
    let parsed = Url::parse(input_url)?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(RapidError::UnsupportedScheme(scheme.to_string())),
    }

    debug!(url = input_url, "fetching url");
    let client = match options.client {
        Some(client) => client,
        None => build_client(settings)?,
    };

    let mut request = client.head(input_url);
    if let Some(cookies) = &options.cookies {
        request = request.header(COOKIE, cookies.clone());
    }
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(RapidError::Http {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("unknown").to_string(),
        });
    }

    let final_url = response.url().clone();
    let headers = response.headers();

    let size = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let resumable = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("bytes"))
        .unwrap_or(false);

    let name = metadata::filename_from_headers(headers)
        .unwrap_or_else(|| metadata::filename_from_url(&final_url));
    let kind = metadata::file_kind(&name);
    let location = metadata::resolve_duplicate(&settings.download_location.join(&name));

    let chunk_count = if resumable {
        planner::chunk_count(size, settings.min_chunk_size)
    } else {
        1
    };

    Ok(Entry {
        id: generate_id(),
        url: final_url.to_string(),
        name,
        location,
        size,
        kind,
        resumable,
        chunk_count,
        cookies: options.cookies,
        date: Utc::now(),
        cancel: RwLock::new(CancellationToken::new()),
    })
}

/// Build the default HTTP client from the settings.
pub(crate) fn build_client(settings: &Settings) -> Result<reqwest::Client, RapidError> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(secs) = settings.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().map_err(RapidError::Network)
}

fn generate_id() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

impl Entry {
    /// Short random token used as the part-file prefix.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Post-redirect resolved URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path the assembled file will live at.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Declared content length; None when the server didn't say.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Whether the server advertised `Accept-Ranges: bytes`.
    pub fn is_resumable(&self) -> bool {
        self.resumable
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn cookies(&self) -> Option<&str> {
        self.cookies.as_deref()
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Clone of the current cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        match self.cancel.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Trip the current token; in-flight work for this entry winds down.
    pub fn cancel(&self) {
        self.cancel_token().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token().is_cancelled()
    }

    /// Swap in a fresh, untripped token so the entry can be downloaded
    /// again after a stop.
    pub fn refresh(&self) {
        let fresh = CancellationToken::new();
        match self.cancel.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }

    /// Probe whether the URL still serves the resource. Expired means the
    /// HEAD probe failed outright, came back non-OK, or reported no
    /// content.
    pub async fn is_expired(&self, client: &reqwest::Client) -> bool {
        let mut request = client.head(&self.url);
        if let Some(cookies) = &self.cookies {
            request = request.header(COOKIE, cookies.clone());
        }

        match request.send().await {
            Ok(response) => {
                let length = response
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                response.status() != StatusCode::OK || length <= 0
            }
            Err(_) => true,
        }
    }

    /// Path of the part file holding chunk `index`, `<dir>/<id>-<index>`.
    pub fn part_path(&self, dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("{}-{}", self.id, index))
    }

    #[cfg(test)]
    pub(crate) fn set_cookies(&mut self, cookies: Option<String>) {
        self.cookies = cookies;
    }
}

#[cfg(test)]
pub(crate) fn test_entry(
    url: &str,
    dir: &Path,
    name: &str,
    size: Option<u64>,
    resumable: bool,
    chunk_count: usize,
) -> Entry {
    Entry {
        id: generate_id(),
        url: url.to_string(),
        name: name.to_string(),
        location: dir.join(name),
        size,
        kind: metadata::file_kind(name),
        resumable,
        chunk_count,
        cookies: None,
        date: Utc::now(),
        cancel: RwLock::new(CancellationToken::new()),
    }
}
