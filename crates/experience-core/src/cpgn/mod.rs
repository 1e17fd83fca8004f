//! Bulk import of compact-game logs into experience files.
//!
//! Each input line is one complete game. Moves are replayed against the
//! engine oracle; scored moves inside the configured depth/value window
//! become candidate entries, but a game's entries are only committed
//! once the evaluations corroborate the declared result. Accepted games
//! append to the target file, which is defragmented at the end.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use crate::codec::{write_signature_if_new, WRITE_BUFFER_SIZE};
use crate::entry::ExpEntry;
use crate::error::ExperienceError;
use crate::oracle::GameOracle;
use crate::sink::InfoSink;
use crate::store;
use crate::types::{Color, Depth, GameResult, Value, COLOR_NB, MAX_PLY, MIN_DEPTH};
use crate::util::format_bytes;

mod parser;

pub use parser::{parse_game_line, unwrap_braces, GameLine, MoveToken};

/// Score at which a side is clearly winning.
const GOOD_SCORE: i32 = Value::PAWN.raw() * 3;
/// Score at which a side is doing well.
const OK_SCORE: i32 = GOOD_SCORE / 2;
/// Scores this close to zero push toward a draw.
const MAX_DRAW_SCORE: i32 = 50;

const MIN_WEIGHT_FOR_WIN: i32 = 16;
const MIN_WEIGHT_FOR_DRAW: i32 = 8;
const MIN_PLY_PER_GAME: i32 = 16;

/// Import filters; the depth window is clamped to the persistence
/// minimum the same way the interactive converter arguments were.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Moves past this ply are not recorded.
    pub max_ply: i32,
    /// Scores above this magnitude are not recorded.
    pub max_value: Value,
    pub min_depth: Depth,
    pub max_depth: Depth,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            max_ply: 1000,
            max_value: Value::MATE,
            min_depth: MIN_DEPTH,
            max_depth: MAX_PLY,
        }
    }
}

impl ImportOptions {
    fn normalized(&self) -> ImportOptions {
        ImportOptions {
            max_ply: self.max_ply,
            max_value: self.max_value,
            min_depth: self.min_depth.max(MIN_DEPTH),
            max_depth: self.max_depth.max(MIN_DEPTH),
        }
    }
}

/// Running conversion statistics, reported with every buffer flush.
#[derive(Debug, Default, Clone)]
pub struct ImportStats {
    pub games: u64,
    pub games_with_errors: u64,
    pub games_ignored: u64,
    pub moves_with_scores: u64,
    pub moves_with_scores_ignored: u64,
    pub moves_without_scores: u64,
    /// White wins / black wins / draws among accepted games.
    pub wbd: [u64; 3],
    /// Entry bytes appended to the target (signature excluded).
    pub out_bytes: u64,
}

impl ImportStats {
    fn moves_total(&self) -> u64 {
        self.moves_with_scores + self.moves_with_scores_ignored + self.moves_without_scores
    }

    fn wbd_slot(result: GameResult) -> usize {
        match result {
            GameResult::WhiteWins => 0,
            GameResult::BlackWins => 1,
            GameResult::Draw => 2,
        }
    }
}

enum GameOutcome {
    Accepted(GameResult),
    Error,
    Ignored,
}

#[derive(Default)]
struct ResultWeights {
    color: [i32; COLOR_NB],
    draw: i32,
}

impl ResultWeights {
    /// Fold one recorded score into the believed-result weights.
    fn apply(&mut self, score: i32, side_to_move: Color) {
        let beneficiary = if score > 0 { side_to_move } else { !side_to_move };

        if score.abs() >= GOOD_SCORE {
            self.draw = 0;
            self.color[beneficiary.index()] += if score < 0 { 4 } else { 2 };
            self.color[(!beneficiary).index()] = 0;
        } else if score.abs() >= OK_SCORE {
            self.draw /= 2;
            self.color[beneficiary.index()] += if score < 0 { 2 } else { 1 };
            self.color[(!beneficiary).index()] /= 2;
        } else if score.abs() <= MAX_DRAW_SCORE {
            self.draw += 2;
            self.color = [0; COLOR_NB];
        } else {
            self.draw += 1;
            self.color[0] /= 2;
            self.color[1] /= 2;
        }
    }
}

/// Convert a compact-game file into experience entries appended to
/// `output_path`, then defragment the result. Returns the conversion
/// statistics; opening either file is the only hard failure.
pub fn import_cpgn<O: GameOracle>(
    oracle: &mut O,
    input_path: &str,
    output_path: &str,
    options: &ImportOptions,
    sink: Arc<dyn InfoSink>,
) -> Result<ImportStats, ExperienceError> {
    let options = options.normalized();

    sink.info("Building experience from compact PGN:");
    sink.info(&format!("  Compact PGN file: {input_path}"));
    sink.info(&format!("  Experience file : {output_path}"));
    sink.info(&format!("  Max ply         : {}", options.max_ply));
    sink.info(&format!("  Max value       : {}", options.max_value));
    sink.info(&format!(
        "  Depth range     : {} - {}",
        options.min_depth, options.max_depth
    ));

    let input = File::open(input_path)?;
    let input_size = input.metadata()?.len();

    let mut output = OpenOptions::new().create(true).append(true).open(output_path)?;
    let output_len = output.metadata()?.len();
    write_signature_if_new(&mut output, output_len)?;

    let mut stats = ImportStats::default();
    let mut pending: Vec<u8> = Vec::with_capacity(WRITE_BUFFER_SIZE);
    let mut consumed: u64 = 0;

    let flush = |stats: &mut ImportStats,
                 pending: &mut Vec<u8>,
                 output: &mut File,
                 consumed: u64,
                 force: bool|
     -> Result<(), ExperienceError> {
        if !force && pending.len() < WRITE_BUFFER_SIZE {
            return Ok(());
        }

        if !pending.is_empty() {
            output.write_all(pending)?;
            stats.out_bytes += pending.len() as u64;
            pending.clear();
        }
        if force {
            output.flush()?;
        }

        let percent = if input_size > 0 {
            consumed.min(input_size) as f64 * 100.0 / input_size as f64
        } else {
            100.0
        };

        sink.info(&format!(
            "{percent:6.2}% -> Games: {} (errors: {}), WBD: {}/{}/{}, Moves: {} ({} with scores, {} without scores, {} ignored). Exp size: {}",
            stats.games,
            stats.games_with_errors,
            stats.wbd[0],
            stats.wbd[1],
            stats.wbd[2],
            stats.moves_total(),
            stats.moves_with_scores,
            stats.moves_without_scores,
            stats.moves_with_scores_ignored,
            format_bytes(stats.out_bytes),
        ));
        Ok(())
    };

    for line in BufReader::new(input).lines() {
        let line = line?;
        consumed += line.len() as u64 + 1;

        let Some(record) = unwrap_braces(&line) else {
            continue;
        };

        stats.games += 1;

        match convert_game(oracle, record, &options, &mut stats, &mut pending) {
            GameOutcome::Accepted(result) => {
                stats.wbd[ImportStats::wbd_slot(result)] += 1;
                flush(&mut stats, &mut pending, &mut output, consumed, false)?;
            }
            GameOutcome::Error => stats.games_with_errors += 1,
            GameOutcome::Ignored => stats.games_ignored += 1,
        }
    }

    flush(&mut stats, &mut pending, &mut output, consumed, true)?;
    drop(output);

    if stats.moves_with_scores > 0 {
        sink.info("Conversion complete");
        store::defrag(output_path, sink);
    }

    Ok(stats)
}

/// Replay one game record, staging scored moves and deriving the
/// believed result. The staged entries reach `pending` only when the
/// game is accepted.
fn convert_game<O: GameOracle>(
    oracle: &mut O,
    record: &str,
    options: &ImportOptions,
    stats: &mut ImportStats,
    pending: &mut Vec<u8>,
) -> GameOutcome {
    let Some(game) = parse_game_line(record) else {
        return GameOutcome::Error;
    };

    if oracle.set_from_fen(game.fen).is_err() {
        return GameOutcome::Error;
    }

    let declared = game.result;
    let mut detected: Option<Color> = None;
    let mut draw_detected = false;
    let mut weights = ResultWeights::default();
    let mut staged: Vec<u8> = Vec::new();
    let mut game_ply: i32 = 0;

    for token in &game.moves {
        game_ply += 1;

        let side_to_move = oracle.side_to_move();
        let Some(mv) = oracle.resolve_move(token.lan) else {
            return GameOutcome::Error;
        };

        if let (Some(score), Some(depth)) = (token.score, token.depth) {
            let in_window = depth >= options.min_depth
                && depth <= options.max_depth
                && score.abs() <= options.max_value.raw()
                && game_ply <= options.max_ply;

            if in_window {
                stats.moves_with_scores += 1;
                let entry = ExpEntry::new(oracle.key(), mv, Value::new(score), depth);
                staged.extend_from_slice(&entry.to_bytes());
            } else {
                stats.moves_with_scores_ignored += 1;
            }

            // Scores cannot be trusted blindly: derive the result they
            // imply and bail out on contradictions.
            if score.abs() >= Value::TB_WIN_IN_MAX_PLY.raw() {
                let winner_by_move = if score > 0 { side_to_move } else { !side_to_move };

                match detected {
                    None => {
                        detected = Some(winner_by_move);
                        if declared.winner() != Some(winner_by_move) {
                            return GameOutcome::Ignored;
                        }
                    }
                    Some(winner) if winner != winner_by_move => {
                        return GameOutcome::Ignored;
                    }
                    Some(_) => {}
                }
            } else if oracle.is_draw(oracle.game_ply()) {
                draw_detected = true;
            }

            weights.apply(score, side_to_move);
        } else {
            stats.moves_without_scores += 1;
        }

        oracle.do_move(mv);

        if !draw_detected && oracle.material().is_insufficient() {
            draw_detected = true;
        }

        // A position-level draw contradicts any decisive score seen.
        if draw_detected && detected.is_some() {
            return GameOutcome::Ignored;
        }
    }

    if game_ply < MIN_PLY_PER_GAME {
        return GameOutcome::Ignored;
    }

    if detected.is_none() {
        if weights.color[Color::White.index()] >= MIN_WEIGHT_FOR_WIN {
            detected = Some(Color::White);
        } else if weights.color[Color::Black.index()] >= MIN_WEIGHT_FOR_WIN {
            detected = Some(Color::Black);
        }
    }

    let declared_winner = declared.winner();
    let weight_short = match declared_winner {
        Some(winner) => weights.color[winner.index()] < MIN_WEIGHT_FOR_WIN,
        None => !draw_detected && weights.draw < MIN_WEIGHT_FOR_DRAW,
    };

    if detected != declared_winner || weight_short {
        return GameOutcome::Ignored;
    }

    pending.extend_from_slice(&staged);
    GameOutcome::Accepted(declared)
}
