//! Shared on-disk persistence helpers: atomic writes, per-date JSON files,
//! and the reverse-lexicographic file-index writer (spec §4.I).
//!
//! Every per-date writer in the crate (papers, news, reports, id trackers)
//! goes through [`write_atomic`] so a crash mid-write never leaves a
//! truncated file behind, generalizing the teacher's `ensure_writable_dir` +
//! `tokio::fs::write` pattern in `utils.rs`/`outputs/json.rs`.

pub mod day_files;
pub mod file_index;

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tracing::{instrument, warn};

use crate::error::{CoreError, CoreResult};

/// Write `bytes` to `path` via a temp-file-then-rename, creating parent
/// directories as needed. Atomic on POSIX filesystems (`rename(2)`).
#[instrument(level = "debug", skip(bytes))]
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json")
    ));
    fs::write(&tmp_path, bytes).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::Other(format!("serializing {}: {e}", path.display())))?;
    write_atomic(path, &bytes).await
}

/// Read and decode a JSON file. Per §7 `PersistenceDecode`: a missing file
/// yields `Ok(None)`; a corrupt file logs a warning and yields `Ok(None)`
/// rather than propagating (treated as an empty list by callers).
#[instrument(level = "debug")]
pub async fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::Io(e)),
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to decode persisted file, treating as empty");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile_shim::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    /// Minimal drop-cleanup temp dir so tests don't require the `tempfile`
    /// crate as a dev-dependency for this one helper.
    mod tempfile_shim {
        use std::path::PathBuf;

        pub struct TempDir(pub PathBuf);

        impl TempDir {
            pub fn new(label: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!(
                    "ai_insight_tracker-test-{label}-{}",
                    std::process::id()
                ));
                std::fs::create_dir_all(&path).unwrap();
                Self(path)
            }

            pub fn path(&self) -> &std::path::Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = TempDir::new("roundtrip");
        let path = dir.path().join("sample.json");
        let value = Sample { a: 1, b: "x".into() };
        write_json_atomic(&path, &value).await.unwrap();
        let read_back: Option<Sample> = read_json_lenient(&path).await.unwrap();
        assert_eq!(read_back, Some(value));
    }

    #[tokio::test]
    async fn missing_file_yields_none() {
        let dir = TempDir::new("missing");
        let path = dir.path().join("nope.json");
        let read_back: Option<Sample> = read_json_lenient(&path).await.unwrap();
        assert_eq!(read_back, None);
    }

    #[tokio::test]
    async fn corrupt_file_yields_none_not_error() {
        let dir = TempDir::new("corrupt");
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{not json").await.unwrap();
        let read_back: Option<Sample> = read_json_lenient(&path).await.unwrap();
        assert_eq!(read_back, None);
    }
}
