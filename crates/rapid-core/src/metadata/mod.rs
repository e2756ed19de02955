// Filename and file-kind helpers shared by fetch and the controller.

use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use url::Url;

use crate::types::FileKind;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "svg", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "mpeg", "mpg", "3gp", "m4v", "m4a",
];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "opus"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "doc", "docx", "pdf", "txt", "ppt", "pptx", "xls", "xlsx", "odt", "ods", "odp", "odg",
    "odf", "rtf", "tex", "texi", "texinfo", "wpd", "wps", "wpg", "wks", "wqd", "wqx", "w",
];
const COMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "rar", "7z", "tar", "gz", "bz2", "tgz", "tbz2", "xz", "txz", "zst", "zstd",
];

/// Classify a filename by its extension.
pub fn file_kind(name: &str) -> FileKind {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let Some(ext) = ext else {
        return FileKind::Other;
    };
    let ext = ext.as_str();

    if IMAGE_EXTENSIONS.contains(&ext) {
        FileKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        FileKind::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        FileKind::Audio
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        FileKind::Document
    } else if COMPRESSED_EXTENSIONS.contains(&ext) {
        FileKind::Compressed
    } else {
        FileKind::Other
    }
}

/// Extract a filename from the `Content-Disposition` header, if present.
pub fn filename_from_headers(headers: &HeaderMap) -> Option<String> {
    let disposition = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;

    // Try filename*=UTF-8''encoded_name first (RFC 5987)
    if let Some(encoded) = disposition
        .split(';')
        .map(|p| p.trim())
        .find(|p| p.starts_with("filename*="))
    {
        let value = encoded.trim_start_matches("filename*=");
        if let Some(name) = value.split("''").nth(1) {
            if let Ok(decoded) = urlencoding::decode(name) {
                return Some(decoded.into_owned());
            }
        }
    }

    // Try filename="name" or filename=name
    if let Some(param) = disposition
        .split(';')
        .map(|p| p.trim())
        .find(|p| p.starts_with("filename=") && !p.starts_with("filename*="))
    {
        let value = param.trim_start_matches("filename=");
        let name = value.trim_matches('"');
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    None
}

/// Derive a filename from the last path segment of a URL.
/// Falls back to the literal `"file"` when the path has no usable segment.
pub fn filename_from_url(parsed: &Url) -> String {
    let segment = parsed.path().rsplit('/').next().unwrap_or("");

    let name = match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    };

    if name.is_empty() {
        "file".to_string()
    } else {
        name
    }
}

/// Resolve a destination path against already-existing files by probing
/// `name`, `name (1)`, `name (2)`, … and returning the first free one.
/// The counter suffix goes before the extension.
pub fn resolve_duplicate(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str());

    let mut k = 1u32;
    loop {
        let name = match ext {
            Some(ext) => format!("{stem} ({k}).{ext}"),
            None => format!("{stem} ({k})"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_kind_image() {
        assert_eq!(file_kind("photo.png"), FileKind::Image);
        assert_eq!(file_kind("scan.JPEG"), FileKind::Image);
    }

    #[test]
    fn test_kind_video() {
        assert_eq!(file_kind("movie.mp4"), FileKind::Video);
    }

    #[test]
    fn test_kind_audio() {
        assert_eq!(file_kind("song.mp3"), FileKind::Audio);
    }

    #[test]
    fn test_kind_document() {
        assert_eq!(file_kind("report.pdf"), FileKind::Document);
    }

    #[test]
    fn test_kind_compressed() {
        assert_eq!(file_kind("bundle.zip"), FileKind::Compressed);
        assert_eq!(file_kind("archive.tar.gz"), FileKind::Compressed);
    }

    #[test]
    fn test_kind_unknown_extension() {
        assert_eq!(file_kind("data.xyz"), FileKind::Other);
    }

    #[test]
    fn test_kind_no_extension() {
        assert_eq!(file_kind("README"), FileKind::Other);
    }

    #[test]
    fn test_filename_from_url_basic() {
        let url = Url::parse("https://example.com/files/report.pdf").unwrap();
        assert_eq!(filename_from_url(&url), "report.pdf");
    }

    #[test]
    fn test_filename_from_url_decodes_escapes() {
        let url = Url::parse("https://example.com/files/my%20file.pdf").unwrap();
        assert_eq!(filename_from_url(&url), "my file.pdf");
    }

    #[test]
    fn test_filename_from_url_empty_path() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(filename_from_url(&url), "file");
    }

    #[test]
    fn test_filename_from_headers_quoted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            "attachment; filename=\"dummy.pdf\"".parse().unwrap(),
        );
        assert_eq!(filename_from_headers(&headers), Some("dummy.pdf".to_string()));
    }

    #[test]
    fn test_filename_from_headers_rfc5987() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            "attachment; filename*=UTF-8''report%20v2.pdf".parse().unwrap(),
        );
        assert_eq!(
            filename_from_headers(&headers),
            Some("report v2.pdf".to_string())
        );
    }

    #[test]
    fn test_filename_from_headers_absent() {
        let headers = HeaderMap::new();
        assert_eq!(filename_from_headers(&headers), None);
    }

    #[test]
    fn test_resolve_duplicate_free_name_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.pdf");
        assert_eq!(resolve_duplicate(&path), path);
    }

    #[test]
    fn test_resolve_duplicate_probes_counters() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.pdf");

        std::fs::write(&path, b"x").unwrap();
        let first = resolve_duplicate(&path);
        assert_eq!(first, tmp.path().join("test (1).pdf"));

        std::fs::write(&first, b"x").unwrap();
        let second = resolve_duplicate(&path);
        assert_eq!(second, tmp.path().join("test (2).pdf"));
    }

    #[test]
    fn test_resolve_duplicate_without_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes");

        std::fs::write(&path, b"x").unwrap();
        assert_eq!(resolve_duplicate(&path), tmp.path().join("notes (1)"));
    }
}
