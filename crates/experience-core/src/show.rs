//! Quality-ranked listing of the entries recorded for a position.

use std::fmt::Write;

use crate::oracle::GameOracle;
use crate::quality::entry_quality;
use crate::store::ExperienceStore;

/// Render the experience table for the oracle's current position.
/// Entries sort by look-ahead quality, best first; the extended view
/// adds observation counts and the quality score itself.
pub fn render_experience(
    store: &ExperienceStore,
    oracle: &mut dyn GameOracle,
    eval_importance: i32,
    extended: bool,
) -> String {
    let Some(chain) = store.probe(oracle.key()) else {
        return "Experience: No experience data found for this position".to_string();
    };

    let mut scored: Vec<_> = chain
        .iter()
        .map(|e| (*e, entry_quality(store, oracle, e, eval_importance).0))
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let mut out = String::from("Experience:\n");

    for (rank, (entry, quality)) in scored.iter().enumerate() {
        let mut eval = format!("cp {}", entry.value.raw());
        if entry.value.is_mate_score() {
            let _ = write!(eval, " (mate {})", entry.value.mate_moves());
        }

        let _ = write!(
            out,
            "{:<2}: {:<5}, depth: {:<2}, eval: {}",
            rank + 1,
            oracle.format_move(entry.mv),
            entry.depth,
            eval,
        );

        if extended {
            let _ = write!(out, ", count: {:<6}, quality: {}", entry.count, quality);
        }

        out.push('\n');
    }

    out
}
