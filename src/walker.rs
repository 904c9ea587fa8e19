use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::index::IndexSet;
use crate::metadata_from_entry;

/// Heuristic progress estimates stay below this until the pass terminates.
const PROGRESS_ESTIMATE_CAP: f64 = 0.99;

/// Work queue and indices, guarded together by the one engine mutex.
#[derive(Debug, Default)]
pub(crate) struct IndexCore {
    pub work_queue: VecDeque<PathBuf>,
    pub indexes: IndexSet,
}

/// State shared between the engine facade and the worker pool. The mutex
/// guards the queue and all three indices; the scalars are readable by the
/// host without locking.
pub(crate) struct EngineShared {
    pub core: Mutex<IndexCore>,
    pub work_ready: Condvar,
    pub is_indexing: AtomicBool,
    pub cancel_requested: AtomicBool,
    pub active_workers: AtomicUsize,
    progress_bits: AtomicU64,
    pub dirs_seen: AtomicU64,
    pub dirs_drained: AtomicU64,
    pub files_indexed: AtomicU64,
}

impl EngineShared {
    pub fn new() -> Self {
        Self {
            core: Mutex::new(IndexCore::default()),
            work_ready: Condvar::new(),
            is_indexing: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            active_workers: AtomicUsize::new(0),
            progress_bits: AtomicU64::new(0_f64.to_bits()),
            dirs_seen: AtomicU64::new(0),
            dirs_drained: AtomicU64::new(0),
            files_indexed: AtomicU64::new(0),
        }
    }

    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress_bits.load(AtomicOrdering::Acquire))
    }

    /// Publish directories-drained / directories-seen as the progress
    /// estimate. `fetch_max` on the bit pattern keeps the published value
    /// monotone: non-negative IEEE-754 bit patterns order the same way the
    /// floats do, so a shrinking ratio never moves the scalar backwards.
    pub fn publish_progress_estimate(&self) {
        let drained = self.dirs_drained.load(AtomicOrdering::Relaxed) as f64;
        let seen = self.dirs_seen.load(AtomicOrdering::Relaxed).max(1) as f64;
        let estimate = (drained / seen).min(PROGRESS_ESTIMATE_CAP);
        self.progress_bits
            .fetch_max(estimate.to_bits(), AtomicOrdering::AcqRel);
    }

    /// Reset counters for a fresh pass. The seeded root counts as one
    /// directory seen.
    pub fn reset_for_pass(&self) {
        self.progress_bits
            .store(0_f64.to_bits(), AtomicOrdering::Release);
        self.dirs_seen.store(1, AtomicOrdering::Release);
        self.dirs_drained.store(0, AtomicOrdering::Release);
        self.files_indexed.store(0, AtomicOrdering::Release);
        self.cancel_requested.store(false, AtomicOrdering::Release);
    }

    fn finish_pass(&self) {
        self.is_indexing.store(false, AtomicOrdering::Release);
        self.progress_bits
            .store(1_f64.to_bits(), AtomicOrdering::Release);
    }
}

/// Spawn the worker pool for one pass. `active_workers` must already hold
/// `count`; a slot whose thread fails to spawn is retired here so the
/// remaining workers can still reach the termination witness.
pub(crate) fn spawn_workers(shared: &Arc<EngineShared>, count: usize) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        let worker_shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(format!("indexer-{i}"))
            .spawn(move || worker_loop(&worker_shared));

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(_) => {
                let core = shared.core.lock();
                if shared.active_workers.fetch_sub(1, AtomicOrdering::AcqRel) == 1 {
                    shared.finish_pass();
                    shared.work_ready.notify_all();
                }
                drop(core);
            }
        }
    }
    handles
}

/// Worker body: pop a directory, enumerate it, push subdirectories, ingest
/// files.
///
/// Termination: "queue empty" alone races with peers that are mid-enumeration
/// and about to push more work. A worker that observes an empty queue under
/// the lock retires itself from `active_workers` and re-waits; it rejoins the
/// count when it takes work again. The pass is over exactly when the last
/// active worker observes an empty queue, and that worker publishes
/// completion and wakes the idle peers.
pub(crate) fn worker_loop(shared: &EngineShared) {
    loop {
        let dir = {
            let mut core = shared.core.lock();
            loop {
                if shared.cancel_requested.load(AtomicOrdering::Acquire) {
                    return;
                }
                if let Some(dir) = core.work_queue.pop_front() {
                    break dir;
                }

                if shared.active_workers.fetch_sub(1, AtomicOrdering::AcqRel) == 1 {
                    shared.finish_pass();
                    shared.work_ready.notify_all();
                    return;
                }
                shared.work_ready.wait(&mut core);
                if !shared.is_indexing.load(AtomicOrdering::Acquire) {
                    return;
                }
                shared.active_workers.fetch_add(1, AtomicOrdering::AcqRel);
            }
        };

        shared.dirs_drained.fetch_add(1, AtomicOrdering::Relaxed);
        process_directory(shared, &dir);
        shared.publish_progress_estimate();
    }
}

/// Enumerate one directory. An unreadable directory, or any entry that raises
/// an I/O error, is skipped without aborting the pass. Entry types are taken
/// from the entry itself, so symlinks are neither descended nor indexed.
fn process_directory(shared: &EngineShared, dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries {
        if shared.cancel_requested.load(AtomicOrdering::Acquire) {
            return;
        }
        let Ok(entry) = entry else { continue };
        let Ok(file_type) = entry.file_type() else { continue };

        if file_type.is_dir() {
            let mut core = shared.core.lock();
            core.work_queue.push_back(entry.path());
            shared.dirs_seen.fetch_add(1, AtomicOrdering::Relaxed);
            shared.work_ready.notify_one();
        } else if file_type.is_file() {
            let metadata = metadata_from_entry(&entry);
            let mut core = shared.core.lock();
            core.indexes.insert_file(metadata);
            drop(core);
            shared.files_indexed.fetch_add(1, AtomicOrdering::Relaxed);
        }
    }
}
