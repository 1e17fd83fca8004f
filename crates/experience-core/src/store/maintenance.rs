//! Offline file maintenance: canonical rewrite and n-way union.

use std::sync::Arc;

use super::ExperienceStore;
use crate::gates::WriteGates;
use crate::sink::InfoSink;

/// Rewrite `path` in canonical form: every `(key, move)` pair exactly
/// once, chains in pseudo-quality order, counts rescaled.
pub fn defrag(path: &str, sink: Arc<dyn InfoSink>) -> bool {
    sink.info(&format!("Defragmenting experience file: {path}"));

    let mut store = scratch_store(sink);
    if !store.load(path, true) {
        return false;
    }

    store.save_to(path, true, false);
    true
}

/// Union several experience files into `target`. The target itself is
/// merged in first when it exists; duplicate `(key, move)` observations
/// combine through the usual chain merge.
pub fn merge(target: &str, sources: &[String], sink: Arc<dyn InfoSink>) -> bool {
    sink.info(&format!("Merging {} experience file(s) into: {target}", sources.len() + 1));

    let mut store = scratch_store(sink);

    // A missing input only logs; the union continues with the rest.
    store.load(target, true);
    for source in sources {
        store.load(source, true);
    }

    store.save_to(target, true, false);
    true
}

/// A throwaway controller for offline operations. Gates stay at their
/// defaults; load/save are not gated.
fn scratch_store(sink: Arc<dyn InfoSink>) -> ExperienceStore {
    ExperienceStore::with_parts(Arc::new(WriteGates::new()), sink)
}
