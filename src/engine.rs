use std::path::PathBuf;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::index::{normalized_extension, IndexSet};
use crate::walker::{spawn_workers, EngineShared};
use crate::{perf_log, FileMetadata, MIN_WORKERS, NO_FILTER_RESULT_CAP};

/// Snapshot of indexing health, built from the atomic scalars only; reading
/// it never contends with the workers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub state: String,
    pub files_indexed: u64,
    pub dirs_scanned: u64,
    pub progress: f64,
}

/// In-memory filesystem search engine.
///
/// `initialize_index` walks a root directory with a pool of worker threads
/// and builds three indices over the regular files it finds: a case-folded
/// filename trie, a path→metadata map, and a normalized-extension→paths map.
/// `search` runs against whatever has been indexed so far; partial results
/// during a pass are expected.
pub struct FileSearchEngine {
    shared: Arc<EngineShared>,
    root_path: Mutex<String>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl FileSearchEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(EngineShared::new()),
            root_path: Mutex::new(String::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Start a full indexing pass over `root_path` and return 0 as a start
    /// acknowledgement.
    ///
    /// Non-blocking: indices are cleared, the queue is seeded with the root,
    /// and the worker pool is spawned before returning. A pass that is still
    /// running is cancelled and joined first. Completion is observed through
    /// `indexing_progress()` reaching 1.0.
    pub fn initialize_index(&self, root_path: &str) -> i32 {
        self.cancel_indexing();

        *self.root_path.lock() = root_path.to_string();

        {
            let mut core = self.shared.core.lock();
            core.work_queue.clear();
            core.work_queue.push_back(PathBuf::from(root_path));
            core.indexes = IndexSet::default();
        }

        let worker_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(0)
            .max(MIN_WORKERS);

        self.shared.reset_for_pass();
        self.shared
            .active_workers
            .store(worker_count, AtomicOrdering::Release);
        self.shared.is_indexing.store(true, AtomicOrdering::Release);

        *self.workers.lock() = spawn_workers(&self.shared, worker_count);

        0
    }

    /// Full re-index of the previously initialized root.
    pub fn update_index(&self) -> i32 {
        let root = self.root_path.lock().clone();
        self.initialize_index(&root)
    }

    /// In [0, 1]; exactly 1.0 iff the latest pass terminated uncancelled.
    pub fn indexing_progress(&self) -> f64 {
        self.shared.progress()
    }

    pub fn is_indexing(&self) -> bool {
        self.shared.is_indexing.load(AtomicOrdering::Acquire)
    }

    pub fn index_stats(&self) -> IndexStats {
        let state = if self.is_indexing() {
            "Indexing"
        } else {
            "Ready"
        };
        IndexStats {
            state: state.to_string(),
            files_indexed: self.shared.files_indexed.load(AtomicOrdering::Relaxed),
            dirs_scanned: self.shared.dirs_drained.load(AtomicOrdering::Relaxed),
            progress: self.shared.progress(),
        }
    }

    /// Stop the current pass and join every worker. The indices keep
    /// whatever the pass reached; only `initialize_index` restores a clean
    /// state. Calling this when nothing is indexing is a no-op.
    pub fn cancel_indexing(&self) {
        {
            // The store and broadcast happen under the lock so a worker
            // between its flag check and its wait cannot miss the wakeup.
            let _core = self.shared.core.lock();
            self.shared
                .cancel_requested
                .store(true, AtomicOrdering::Release);
            self.shared.work_ready.notify_all();
        }

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.join();
        }

        self.shared.is_indexing.store(false, AtomicOrdering::Release);
        self.shared
            .cancel_requested
            .store(false, AtomicOrdering::Release);
    }

    /// Prefix/extension/size/date search over the current index.
    ///
    /// Candidate selection: with every filter at its default, up to
    /// 1000 arbitrary entries from the path map; otherwise the trie when
    /// `query` is non-empty, else the extension bucket when `file_type` is
    /// non-empty, else no candidates. Survivors are filtered against the
    /// path map record and sorted by name, byte-wise ascending.
    pub fn search(
        &self,
        query: &str,
        file_type: &str,
        min_size: u64,
        max_size: u64,
        min_date: i64,
        max_date: i64,
    ) -> Vec<FileMetadata> {
        let started = Instant::now();

        let no_filters = query.is_empty()
            && file_type.is_empty()
            && min_size == 0
            && max_size == u64::MAX
            && min_date == 0
            && max_date == i64::MAX;

        let core = self.shared.core.lock();

        let (mode_label, candidates) = if no_filters {
            let paths: Vec<String> = core
                .indexes
                .path_map
                .keys()
                .take(NO_FILTER_RESULT_CAP)
                .cloned()
                .collect();
            ("all", paths)
        } else if !query.is_empty() {
            ("prefix", core.indexes.trie.paths_with_prefix(query))
        } else if !file_type.is_empty() {
            let key = normalized_extension(file_type);
            let paths = core
                .indexes
                .extension_map
                .get(&key)
                .cloned()
                .unwrap_or_default();
            ("ext", paths)
        } else {
            // Size- or date-only constraints have no candidate source.
            ("none", Vec::new())
        };

        let candidate_count = candidates.len();
        let mut results: Vec<FileMetadata> = Vec::with_capacity(candidate_count.min(256));
        for path in candidates {
            // The path map is the sole authority; stale candidates drop out.
            let Some(metadata) = core.indexes.path_map.get(&path) else {
                continue;
            };
            if matches_filters(metadata, file_type, min_size, max_size, min_date, max_date) {
                results.push(metadata.clone());
            }
        }
        drop(core);

        results.sort_by(|a, b| a.name.cmp(&b.name));

        perf_log(format!(
            "search query={query:?} mode={mode_label} candidates={candidate_count} returned={} total={:.1}ms",
            results.len(),
            started.elapsed().as_secs_f64() * 1000.0,
        ));

        results
    }
}

impl Default for FileSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FileSearchEngine {
    fn drop(&mut self) {
        self.cancel_indexing();
    }
}

fn matches_filters(
    metadata: &FileMetadata,
    file_type: &str,
    min_size: u64,
    max_size: u64,
    min_date: i64,
    max_date: i64,
) -> bool {
    if metadata.size < min_size || metadata.size > max_size {
        return false;
    }
    if metadata.last_modified < min_date || metadata.last_modified > max_date {
        return false;
    }
    // Applied even when candidates came from the extension bucket.
    if !file_type.is_empty()
        && normalized_extension(&metadata.extension) != normalized_extension(file_type)
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_metadata(path: &str, name: &str, extension: &str, size: u64, mtime: i64) -> FileMetadata {
        FileMetadata {
            path: path.to_string(),
            name: name.to_string(),
            extension: extension.to_string(),
            size,
            last_modified: mtime,
            is_directory: false,
        }
    }

    fn engine_with(entries: Vec<FileMetadata>) -> FileSearchEngine {
        let engine = FileSearchEngine::new();
        {
            let mut core = engine.shared.core.lock();
            for metadata in entries {
                core.indexes.insert_file(metadata);
            }
        }
        engine
    }

    #[test]
    fn filters_reject_out_of_range_values() {
        let metadata = mk_metadata("/r/a.txt", "a.txt", ".txt", 500, 1_000);

        assert!(matches_filters(&metadata, "", 0, u64::MAX, 0, i64::MAX));
        assert!(!matches_filters(&metadata, "", 501, u64::MAX, 0, i64::MAX));
        assert!(!matches_filters(&metadata, "", 0, 499, 0, i64::MAX));
        assert!(!matches_filters(&metadata, "", 0, u64::MAX, 1_001, i64::MAX));
        assert!(!matches_filters(&metadata, "", 0, u64::MAX, 0, 999));
        assert!(!matches_filters(&metadata, "md", 0, u64::MAX, 0, i64::MAX));
        assert!(matches_filters(&metadata, ".TXT", 0, u64::MAX, 0, i64::MAX));
    }

    #[test]
    fn size_only_query_has_no_candidate_source() {
        let engine = engine_with(vec![mk_metadata("/r/big.txt", "big.txt", ".txt", 10_000, 0)]);

        let results = engine.search("", "", 1_000, u64::MAX, 0, i64::MAX);
        assert!(results.is_empty());
    }

    #[test]
    fn inverted_ranges_return_empty() {
        let engine = engine_with(vec![mk_metadata("/r/a.txt", "a.txt", ".txt", 100, 100)]);

        assert!(engine.search("a", "", 500, 100, 0, i64::MAX).is_empty());
        assert!(engine.search("a", "", 0, u64::MAX, 200, 100).is_empty());
    }

    #[test]
    fn stale_candidates_are_dropped_via_path_map() {
        let engine = engine_with(vec![mk_metadata("/r/old.txt", "old.txt", ".txt", 1, 1)]);
        engine.shared.core.lock().indexes.path_map.clear();

        assert!(engine.search("old", "", 0, u64::MAX, 0, i64::MAX).is_empty());
        assert!(engine.search("", "txt", 0, u64::MAX, 0, i64::MAX).is_empty());
    }

    #[test]
    fn no_filter_search_caps_at_one_thousand() {
        let entries = (0..1_500)
            .map(|i| {
                let name = format!("file{i:05}.dat");
                mk_metadata(&format!("/r/{name}"), &name, ".dat", 1, 1)
            })
            .collect();
        let engine = engine_with(entries);

        let results = engine.search("", "", 0, u64::MAX, 0, i64::MAX);
        assert_eq!(results.len(), NO_FILTER_RESULT_CAP);
        for pair in results.windows(2) {
            assert!(pair[0].name <= pair[1].name);
        }
    }

    #[test]
    fn results_sort_byte_wise_by_name() {
        let engine = engine_with(vec![
            mk_metadata("/r/alphabet.md", "alphabet.md", ".md", 1, 1),
            mk_metadata("/r/Alpha.txt", "Alpha.txt", ".txt", 1, 1),
        ]);

        let results = engine.search("alp", "", 0, u64::MAX, 0, i64::MAX);
        let names: Vec<&str> = results.iter().map(|m| m.name.as_str()).collect();
        // 'A' sorts before 'a' in byte-wise order.
        assert_eq!(names, vec!["Alpha.txt", "alphabet.md"]);
    }

    #[test]
    fn extension_lookup_accepts_dotted_and_uppercase_forms() {
        let engine = engine_with(vec![mk_metadata(
            "/r/FooBar.TXT",
            "FooBar.TXT",
            ".TXT",
            1,
            1,
        )]);

        for file_type in ["txt", "TXT", ".txt", ".TXT"] {
            let results = engine.search("", file_type, 0, u64::MAX, 0, i64::MAX);
            assert_eq!(results.len(), 1, "fileType {file_type:?}");
            assert_eq!(results[0].name, "FooBar.TXT");
        }
    }

    #[test]
    fn fresh_engine_reports_ready_and_zero_progress() {
        let engine = FileSearchEngine::new();

        assert!(!engine.is_indexing());
        assert_eq!(engine.indexing_progress(), 0.0);
        let stats = engine.index_stats();
        assert_eq!(stats.state, "Ready");
        assert_eq!(stats.files_indexed, 0);
    }
}
