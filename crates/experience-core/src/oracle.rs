//! Engine collaborators.
//!
//! The surrounding engine owns move generation, legality, and draw
//! detection; the experience subsystem reaches them through this trait.
//! The engine guarantees its Zobrist schedule never produces the index
//! sentinel keys, and that writers never race the background loader.

use crate::types::{Color, PositionKey, RawMove};

/// Piece-census snapshot used for insufficient-material classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialCount {
    /// All men on the board, kings included.
    pub total: u32,
    /// Bishops per color, indexed by `Color::index()`.
    pub bishops: [u32; 2],
    /// Knights per color.
    pub knights: [u32; 2],
    /// Bishops standing on dark squares, per color.
    pub bishops_on_dark: [u32; 2],
}

impl MaterialCount {
    pub fn minors(&self) -> u32 {
        self.bishops[0] + self.bishops[1] + self.knights[0] + self.knights[1]
    }

    /// Dead-draw material: bare kings, king versus king and one minor,
    /// or one bishop each on same-colored squares.
    pub fn is_insufficient(&self) -> bool {
        if self.total == 2 {
            return true;
        }

        if self.total == 3 && self.minors() == 1 {
            return true;
        }

        if self.total == 4 && self.bishops == [1, 1] {
            return self.bishops_on_dark[0] == self.bishops_on_dark[1];
        }

        false
    }
}

/// Board access required from the engine: position setup, a move
/// legality oracle, do/undo for look-ahead, and draw detection.
pub trait GameOracle {
    /// Reset the board from a FEN string.
    fn set_from_fen(&mut self, fen: &str) -> Result<(), String>;

    /// Zobrist fingerprint of the current position.
    fn key(&self) -> PositionKey;

    fn side_to_move(&self) -> Color;

    /// Plies played since the game start position.
    fn game_ply(&self) -> i32;

    /// Resolve a long-algebraic token (`e2e4`, `e7e8q`) to a legal move
    /// in the current position; `None` if illegal or unparseable.
    fn resolve_move(&self, token: &str) -> Option<RawMove>;

    fn do_move(&mut self, mv: RawMove);

    /// Undo the most recent `do_move`.
    fn undo_move(&mut self);

    /// Draw by repetition or the fifty-move rule, judged at `ply`.
    fn is_draw(&self, ply: i32) -> bool;

    fn material(&self) -> MaterialCount;

    /// Render a move for display.
    fn format_move(&self, mv: RawMove) -> String;
}
