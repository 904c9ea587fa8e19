use std::fs::DirEntry;
use std::path::Path;
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;

use serde::Serialize;

pub mod commands;
mod engine;
mod index;
mod trie;
mod walker;

pub use commands::dispatch;
pub use engine::{FileSearchEngine, IndexStats};

/// Cap on results when every search filter is at its default.
pub(crate) const NO_FILTER_RESULT_CAP: usize = 1000;
/// Worker-pool floor when hardware parallelism is low or undetectable.
pub(crate) const MIN_WORKERS: usize = 4;

pub type EngineResult<T> = Result<T, String>;

static PERF_LOG_ENABLED: OnceLock<bool> = OnceLock::new();

fn env_truthy(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

fn perf_log_enabled() -> bool {
    *PERF_LOG_ENABLED.get_or_init(|| env_truthy("FILEFINDER_PERF_LOG"))
}

pub(crate) fn perf_log(message: impl AsRef<str>) {
    if perf_log_enabled() {
        eprintln!("[perf] {}", message.as_ref());
    }
}

/// One indexed file as the host sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub path: String,
    pub name: String,
    /// Final dot-suffix including the dot, or empty.
    pub extension: String,
    /// Bytes; 0 when metadata is unobtainable.
    pub size: u64,
    /// Seconds since the Unix epoch; 0 when metadata is unobtainable.
    pub last_modified: i64,
    /// Always false for records stored in the index.
    pub is_directory: bool,
}

pub(crate) fn extension_for(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Build the metadata record for a directory entry already known to be a
/// regular file. A failing metadata call leaves size and mtime at 0; the
/// entry stays searchable by name and extension.
pub(crate) fn metadata_from_entry(entry: &DirEntry) -> FileMetadata {
    let path = entry.path();
    let name = entry.file_name().to_string_lossy().to_string();

    let (size, last_modified) = match entry.metadata() {
        Ok(metadata) => (
            metadata.len(),
            metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
        ),
        Err(_) => (0, 0),
    };

    FileMetadata {
        extension: extension_for(&path),
        path: path.to_string_lossy().to_string(),
        name,
        size,
        last_modified,
        is_directory: false,
    }
}
