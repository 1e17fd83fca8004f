//! Look-ahead quality scoring for experience entries.
//!
//! Walks the best recorded continuation a few plies forward and scores
//! how the recorded evaluations trend for each side. Used to rank moves
//! when the store acts as a synthetic opening book.

use crate::entry::ExpEntry;
use crate::oracle::GameOracle;
use crate::store::ExperienceStore;
use crate::types::{Value, COLOR_NB};

pub const EVAL_IMPORTANCE_MAX: i32 = 10;

/// How far ahead the continuation walk looks.
const MOVES_AHEAD: usize = 10;

/// Quality of `entry` in the oracle's current position, together with a
/// flag for a possible draw along the recorded line.
///
/// With `eval_importance == 0` the score is count-only and the walk
/// collapses to a single do/undo draw probe. Otherwise each probed
/// position contributes the best next entry's evaluation delta for the
/// side that played it, and the count term and trend term blend by
/// importance. The board is restored before returning.
pub fn entry_quality(
    store: &ExperienceStore,
    oracle: &mut dyn GameOracle,
    entry: &ExpEntry,
    eval_importance: i32,
) -> (i32, bool) {
    assert!((0..=EVAL_IMPORTANCE_MAX).contains(&eval_importance));

    let mut maybe_draw = false;
    let mut q = entry.count as i64 * (EVAL_IMPORTANCE_MAX - eval_importance) as i64;

    if eval_importance == 0 {
        oracle.do_move(entry.mv);
        maybe_draw = oracle.is_draw(oracle.game_ply());
        oracle.undo_move();
        return ((q / EVAL_IMPORTANCE_MAX as i64) as i32, maybe_draw);
    }

    let us = oracle.side_to_move();
    let them = !us;

    let mut sum = [0i64; COLOR_NB];
    let mut weight = [0i64; COLOR_NB];

    // Seed our side with something positive.
    sum[us.index()] = entry.count as i64;
    weight[us.index()] = 1;

    let mut me = us;
    let mut last_value: [Option<Value>; COLOR_NB] = [None; COLOR_NB];
    let mut current = *entry;
    let mut moves_done = 0usize;

    loop {
        last_value[me.index()] = Some(current.value);

        oracle.do_move(current.mv);
        moves_done += 1;
        me = !me;

        if !maybe_draw {
            maybe_draw = oracle.is_draw(oracle.game_ply());
        }

        if moves_done >= MOVES_AHEAD {
            break;
        }

        // Best recorded continuation from the new position.
        let Some(next) = store.find_best_entry(oracle.key()) else {
            break;
        };

        if let Some(last) = last_value[me.index()] {
            sum[me.index()] += (next.value.raw() - last.raw()) as i64;
            weight[me.index()] += 1;
        }

        current = next;
    }

    for _ in 0..moves_done {
        oracle.undo_move();
    }

    let mut s = sum[us.index()];
    let mut w = weight[us.index()];

    if weight[them.index()] > 0 {
        s -= sum[them.index()];
        w += weight[them.index()];
    }

    q += s * eval_importance as i64 / w;

    ((q / EVAL_IMPORTANCE_MAX as i64) as i32, maybe_draw)
}
