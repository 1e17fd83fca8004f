//! Saving: incremental staging flush and full canonical rewrite.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::Path;

use super::StoreData;
use crate::codec::{write_signature_if_new, EntryWriter};
use crate::sink::InfoSink;
use crate::types::MIN_DEPTH;

/// Save `data` to `path`.
///
/// Full saves (`save_all`) first link staged observations, then rewrite
/// every chain with observation counts scaled down, behind a `.bak` of
/// the previous file. Incremental saves append staged entries only,
/// deduplicated within the batch.
pub(super) fn save(data: &mut StoreData, path: &str, save_all: bool, sink: &dyn InfoSink) {
    if !data.has_new_exp() && (!save_all || data.index.is_empty()) {
        return;
    }

    // A full rewrite keeps the previous file as a backup; incremental
    // saves only append and need none.
    let mut backup: Option<String> = None;
    if save_all && Path::new(path).exists() {
        let bak = format!("{path}.bak");

        let mut usable = true;
        if Path::new(&bak).exists() && fs::remove_file(&bak).is_err() {
            sink.info(&format!("Could not delete existing backup file: {bak}"));
            usable = false;
        }

        if usable {
            if fs::rename(path, &bak).is_ok() {
                backup = Some(bak);
            } else {
                sink.info("Could not create backup of current experience file");
            }
        }
    }

    if !write_entries(data, path, save_all, sink) {
        if let Some(bak) = backup {
            if fs::rename(&bak, path).is_err() {
                sink.info(&format!("Could not restore backup experience file: {bak}"));
            }
        }
    }
}

fn write_entries(data: &mut StoreData, path: &str, save_all: bool, sink: &dyn InfoSink) -> bool {
    let mut file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(f) => f,
        Err(_) => {
            sink.info(&format!(
                "Failed to open experience file [{path}] for writing"
            ));
            return false;
        }
    };

    let len = match file.metadata() {
        Ok(m) => m.len(),
        Err(e) => {
            sink.info(&format!("Could not stat experience file [{path}]: {e}"));
            return false;
        }
    };

    if write_signature_if_new(&mut file, len).is_err() {
        sink.info(&format!(
            "Failed to write signature to experience file [{path}]"
        ));
        return false;
    }

    let mut writer = EntryWriter::new(&mut file);
    let write_failed = || {
        format!("Failed to save experience entry to experience file [{path}]")
    };

    if save_all {
        // Staged observations were linked into the index when they were
        // recorded, so the rewrite already reflects them; the staging
        // vectors just drain.
        data.new_pv.clear();
        data.new_multipv.clear();

        let mut all_positions = 0usize;
        let mut all_moves = 0usize;

        // Canonical output: positions in key order, each chain re-sorted
        // by pseudo-quality. Rewriting a rewritten file reproduces it
        // byte for byte.
        for key in data.index.sorted_keys() {
            let chain = data
                .index
                .chain_mut(key)
                .expect("key vanished during save");
            all_positions += 1;

            // Scale counts down relative to the chain maximum so they
            // cannot grow without bound across successive rewrites.
            let max_count = chain.iter().map(|e| e.count).max().unwrap_or(0);
            let scale = 1 + max_count / 128;

            for entry in chain.iter_mut() {
                entry.count = (entry.count / scale).max(1);
            }

            chain.sort_by(|a, b| b.compare(a).cmp(&0));

            for entry in chain.iter() {
                if entry.depth < MIN_DEPTH {
                    continue;
                }

                all_moves += 1;
                if writer.push(entry).is_err() {
                    sink.info(&write_failed());
                    return false;
                }
            }
        }

        if writer.flush().is_err() {
            sink.info(&write_failed());
            return false;
        }

        sink.info(&format!(
            "Saved {all_positions} position(s) and {all_moves} moves to experience file: {path}"
        ));
    } else {
        // One record per (key, move) within the batch; later duplicates
        // already merged into the index when they were staged.
        let mut seen: HashSet<(u64, u32)> = HashSet::new();
        let mut pv_written = 0usize;
        let mut multipv_written = 0usize;

        let batches = [(&data.new_pv, &mut pv_written), (&data.new_multipv, &mut multipv_written)];
        for (staged, written) in batches {
            for entry in staged.iter() {
                if entry.depth < MIN_DEPTH {
                    continue;
                }

                if !seen.insert((entry.key.raw(), entry.mv.raw())) {
                    continue;
                }

                if writer.push(entry).is_err() {
                    sink.info(&write_failed());
                    return false;
                }

                *written += 1;
            }
        }

        if writer.flush().is_err() {
            sink.info(&write_failed());
            return false;
        }

        sink.info(&format!(
            "Saved {pv_written} PV and {multipv_written} MultiPV entries to experience file: {path}"
        ));

        data.new_pv.clear();
        data.new_multipv.clear();
    }

    true
}
