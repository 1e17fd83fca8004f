//! Background file loading.

use super::{lock, save, CancelToken, Shared};
use crate::codec::{open_and_detect, CURRENT_VERSION};
use crate::index::LinkOutcome;
use crate::sink::InfoSink;
use crate::util::display_name;

/// Read one experience file and chain-merge it into the shared index.
/// Runs on the loader thread; returns the load result published to
/// waiters. Failures leave whatever was already linked in place.
pub(super) fn load_file(
    shared: &Shared,
    sink: &dyn InfoSink,
    cancel: &CancelToken,
    path: &str,
) -> bool {
    let (mut input, mut reader) = match open_and_detect(path) {
        Ok(opened) => opened,
        Err(e) => {
            sink.info(&e.to_string());
            return false;
        }
    };

    if reader.version() != CURRENT_VERSION {
        sink.info(&format!(
            "Importing experience version ({}) from file [{path}]",
            reader.version()
        ));
    }

    let total = reader.entries_count();
    let mut data = lock(&shared.data);
    let prev_positions = data.index.positions();
    let mut duplicates = 0usize;

    for i in 0..total {
        if cancel.is_cancelled() {
            break;
        }

        let entry = match reader.read_one(&mut input) {
            Ok(e) => e,
            Err(_) => {
                sink.info(&format!(
                    "Failed to read experience entry #{} of {total}",
                    i + 1
                ));
                return false;
            }
        };

        if data.index.link(entry) == LinkOutcome::Merged {
            duplicates += 1;
        }
    }

    if cancel.is_cancelled() {
        return false;
    }

    let name = display_name(path);

    if reader.version() < CURRENT_VERSION {
        sink.info(&format!(
            "Upgrading experience file ({name}) from version ({}) to version ({CURRENT_VERSION})",
            reader.version()
        ));
        // Still on the loader thread and still holding the data lock, so
        // no writer can interleave with the rewrite.
        save::save(&mut data, path, true, sink);
    }

    if cancel.is_cancelled() {
        return false;
    }

    if prev_positions > 0 {
        sink.info(&format!(
            "{name} -> Total new moves: {total}. Total new positions: {}. Duplicate moves: {duplicates}",
            data.index.positions() - prev_positions
        ));
    } else {
        let fragmentation = if total > 0 {
            100.0 * duplicates as f64 / total as f64
        } else {
            0.0
        };
        sink.info(&format!(
            "{name} -> Total moves: {total}. Total positions: {}. Duplicate moves: {duplicates}. Fragmentation: {fragmentation:.2}%",
            data.index.positions()
        ));
    }

    true
}
