//! Store controller: load/save/probe/add lifecycle.
//!
//! One controller owns the position index, the staging vectors for new
//! observations, and at most one background loader thread. Writers and
//! readers synchronize with the loader through a condition variable;
//! the index itself sits behind a mutex shared with the loader.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::thread::JoinHandle;

use crate::entry::ExpEntry;
use crate::gates::WriteGates;
use crate::index::PositionIndex;
use crate::sink::{InfoSink, StdoutSink};
use crate::types::{Depth, PositionKey, RawMove, Value};

mod load;
mod maintenance;
mod save;

pub use maintenance::{defrag, merge};

/// Cooperative cancellation handle for an in-flight load. The loader
/// checks it once per entry; partial linking is retained on cancel.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Index plus staging, guarded as one unit: either the loader thread or
/// the engine thread holds it, never both.
#[derive(Default)]
pub(crate) struct StoreData {
    pub(crate) index: PositionIndex,
    pub(crate) new_pv: Vec<ExpEntry>,
    pub(crate) new_multipv: Vec<ExpEntry>,
}

impl StoreData {
    pub(crate) fn has_new_exp(&self) -> bool {
        !self.new_pv.is_empty() || !self.new_multipv.is_empty()
    }

    fn clear(&mut self) {
        self.index.clear();
        self.new_pv.clear();
        self.new_multipv.clear();
    }
}

struct Shared {
    data: Mutex<StoreData>,
    loading: Mutex<bool>,
    loading_cv: Condvar,
    load_result: AtomicBool,
}

impl Shared {
    fn new() -> Shared {
        Shared {
            data: Mutex::new(StoreData::default()),
            loading: Mutex::new(false),
            loading_cv: Condvar::new(),
            load_result: AtomicBool::new(false),
        }
    }
}

pub struct ExperienceStore {
    filename: String,
    shared: Arc<Shared>,
    gates: Arc<WriteGates>,
    sink: Arc<dyn InfoSink>,
    cancel: CancelToken,
    loader: Option<JoinHandle<()>>,
}

impl ExperienceStore {
    pub fn new() -> ExperienceStore {
        ExperienceStore::with_parts(Arc::new(WriteGates::new()), Arc::new(StdoutSink))
    }

    pub fn with_parts(gates: Arc<WriteGates>, sink: Arc<dyn InfoSink>) -> ExperienceStore {
        ExperienceStore {
            filename: String::new(),
            shared: Arc::new(Shared::new()),
            gates,
            sink,
            cancel: CancelToken::new(),
            loader: None,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn gates(&self) -> &Arc<WriteGates> {
        &self.gates
    }

    pub fn sink(&self) -> &Arc<dyn InfoSink> {
        &self.sink
    }

    /// Idempotent (re-)initialization: reuse an already loaded file,
    /// otherwise unload and start a background load of `path`.
    pub fn init(&mut self, path: &str) {
        if !self.gates.enabled() {
            self.unload();
            return;
        }

        if self.filename == path && self.loading_result() {
            return;
        }

        self.unload();
        self.load(path, false);
    }

    /// Load an experience file, replacing nothing: entries chain-merge
    /// into whatever the index already holds. With `synchronous` the
    /// call blocks until the loader finishes and returns its result.
    pub fn load(&mut self, path: &str, synchronous: bool) -> bool {
        self.wait_for_loading_finished();
        self.join_loader();

        self.filename = path.to_string();
        self.shared.load_result.store(false, Ordering::Release);
        self.cancel = CancelToken::new();

        *lock(&self.shared.loading) = true;

        let shared = Arc::clone(&self.shared);
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        let path = path.to_string();

        self.loader = Some(thread::spawn(move || {
            let result = load::load_file(&shared, &*sink, &cancel, &path);
            shared.load_result.store(result, Ordering::Release);

            let mut loading = lock(&shared.loading);
            *loading = false;
            shared.loading_cv.notify_all();
        }));

        !synchronous || self.wait_for_loading_finished()
    }

    /// Request cooperative cancellation of an in-flight load. The
    /// loader checks once per entry; whatever it already linked stays,
    /// and the load result reports failure.
    pub fn abort_loading(&self) {
        self.cancel.cancel();
    }

    /// Block until no load is in flight; returns the last load result.
    pub fn wait_for_loading_finished(&self) -> bool {
        let mut loading = lock(&self.shared.loading);
        while *loading {
            loading = self
                .shared
                .loading_cv
                .wait(loading)
                .expect("loading lock poisoned");
        }
        self.loading_result()
    }

    pub fn loading_result(&self) -> bool {
        self.shared.load_result.load(Ordering::Acquire)
    }

    /// Save new observations, then release the index and staging.
    pub fn unload(&mut self) {
        self.wait_for_loading_finished();
        self.join_loader();
        self.save();

        lock(&self.shared.data).clear();
        self.filename.clear();
        self.shared.load_result.store(false, Ordering::Release);
    }

    /// Incremental save of staged observations to the current file.
    /// No-op when readonly or nothing is staged.
    pub fn save(&self) {
        if self.gates.readonly() || self.filename.is_empty() {
            return;
        }
        if !self.has_new_exp() {
            return;
        }

        self.save_to(&self.filename, false, false);
    }

    /// Save to an explicit path. `save_all` rewrites every chain (with a
    /// `.bak` of the previous file); otherwise only staged observations
    /// append. `ignore_loading_check` is reserved for the loader's own
    /// upgrade rewrite, which must not wait on itself.
    pub fn save_to(&self, path: &str, save_all: bool, ignore_loading_check: bool) {
        if !ignore_loading_check {
            self.wait_for_loading_finished();
        }

        let mut data = lock(&self.shared.data);
        save::save(&mut data, path, save_all, &*self.sink);
    }

    /// Chain for a position, cloned out of the index. Callers are
    /// expected to have waited for loading first.
    pub fn probe(&self, key: PositionKey) -> Option<Vec<ExpEntry>> {
        lock(&self.shared.data).index.probe(key).map(<[ExpEntry]>::to_vec)
    }

    /// Best entry for a position by pseudo-quality.
    pub fn find_best_entry(&self, key: PositionKey) -> Option<ExpEntry> {
        lock(&self.shared.data).index.best_entry(key)
    }

    pub fn has_new_exp(&self) -> bool {
        lock(&self.shared.data).has_new_exp()
    }

    /// Distinct positions currently indexed.
    pub fn positions(&self) -> usize {
        lock(&self.shared.data).index.positions()
    }

    /// Entries across all chains.
    pub fn total_entries(&self) -> usize {
        let data = lock(&self.shared.data);
        data.index.iter().map(|(_, chain)| chain.len()).sum()
    }

    /// Record a principal-variation observation.
    pub fn add_pv_experience(&self, key: PositionKey, mv: RawMove, value: Value, depth: Depth) {
        if !self.gates.allow_pv_write() {
            return;
        }

        let entry = ExpEntry::new(key, mv, value, depth);
        let mut data = lock(&self.shared.data);
        data.new_pv.push(entry);
        data.index.link(entry);
    }

    /// Record a MultiPV observation.
    pub fn add_multipv_experience(&self, key: PositionKey, mv: RawMove, value: Value, depth: Depth) {
        if !self.gates.allow_multipv_write() {
            return;
        }

        let entry = ExpEntry::new(key, mv, value, depth);
        let mut data = lock(&self.shared.data);
        data.new_multipv.push(entry);
        data.index.link(entry);
    }

    /// Create the current experience file with its signature only.
    /// No-op when learning is disabled or no file is configured.
    pub fn touch(&self) {
        if !self.gates.enabled() || self.filename.is_empty() {
            return;
        }

        // Best-effort, silent: bench setup must not spam the GUI.
        let _ = touch_file(&self.filename);
    }

    /// `ucinewgame`: persist what the previous game staged, then make
    /// sure learning is active again.
    pub fn on_new_game(&self) {
        self.wait_for_loading_finished();
        self.save();
        self.gates.resume_learning();
    }

    /// `quit`: persist and release.
    pub fn on_quit(&mut self) {
        self.unload();
    }

    /// Wrap a bench run: learning writes are limited to one PV entry,
    /// and the file exists (with signature) even if nothing is written.
    pub fn begin_bench(&self) {
        self.wait_for_loading_finished();
        self.gates.begin_bench();
        self.touch();
    }

    pub fn end_bench(&self) {
        self.gates.end_bench();
    }

    fn join_loader(&mut self) {
        if let Some(handle) = self.loader.take() {
            let _ = handle.join();
        }
    }
}

impl Default for ExperienceStore {
    fn default() -> Self {
        ExperienceStore::new()
    }
}

impl Drop for ExperienceStore {
    fn drop(&mut self) {
        // Abort any in-flight load; saving is the owner's explicit call.
        self.cancel.cancel();
        self.wait_for_loading_finished();
        self.join_loader();
    }
}

/// Create `path` as a signature-only experience file if it does not
/// exist or is empty; existing entries are left alone.
pub fn touch_file(path: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        file.write_all(crate::codec::SIGNATURE_V2)?;
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("experience store lock poisoned")
}
