//! Shared test utilities: a scripted stand-in for the engine oracle and
//! helpers for building experience files.

#![allow(dead_code)] // Not every test file uses every helper.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use experience_core::oracle::{GameOracle, MaterialCount};
use experience_core::{
    BufferSink, Color, ExpEntry, ExperienceStore, PositionKey, RawMove, Value, WriteGates,
};

/// A fake chess board for importer and look-ahead tests.
///
/// Moves are "legal" whenever they parse as long-algebraic coordinates;
/// position keys are a deterministic hash of the start FEN and the move
/// stack, so the same line always reaches the same key. Draw plies and
/// per-ply material are scripted by the test.
pub struct MockOracle {
    fen: String,
    base_stm: Color,
    moves: Vec<RawMove>,
    /// `is_draw(ply)` answers true for plies in this set.
    pub draw_plies: HashSet<i32>,
    /// Material after the given ply; defaults to a full board.
    pub material_by_ply: HashMap<i32, MaterialCount>,
}

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl MockOracle {
    pub fn new() -> MockOracle {
        let mut oracle = MockOracle {
            fen: String::new(),
            base_stm: Color::White,
            moves: Vec::new(),
            draw_plies: HashSet::new(),
            material_by_ply: HashMap::new(),
        };
        oracle.set_from_fen(START_FEN).unwrap();
        oracle
    }

    /// Key the oracle would report after playing `line` from the
    /// current start position.
    pub fn key_after(&self, line: &[&str]) -> PositionKey {
        let mut probe = MockOracle {
            fen: self.fen.clone(),
            base_stm: self.base_stm,
            moves: self.moves.clone(),
            draw_plies: HashSet::new(),
            material_by_ply: HashMap::new(),
        };
        for lan in line {
            let mv = probe.resolve_move(lan).expect("unparseable test move");
            probe.do_move(mv);
        }
        probe.key()
    }

    fn state_hash(&self) -> u64 {
        let mut h: u64 = 0x9e37_79b9_7f4a_7c15;
        for b in self.fen.bytes() {
            h = mix(h ^ b as u64);
        }
        for mv in &self.moves {
            h = mix(h ^ mv.raw() as u64);
        }
        h
    }
}

fn mix(mut x: u64) -> u64 {
    // splitmix64 finalizer
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

fn square(file: u8, rank: u8) -> u32 {
    (rank as u32) * 8 + file as u32
}

fn parse_square(bytes: &[u8]) -> Option<u32> {
    let file = bytes[0];
    let rank = bytes[1];
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some(square(file - b'a', rank - b'1'))
}

fn render_square(sq: u32) -> String {
    let file = (b'a' + (sq % 8) as u8) as char;
    let rank = (b'1' + (sq / 8) as u8) as char;
    format!("{file}{rank}")
}

impl GameOracle for MockOracle {
    fn set_from_fen(&mut self, fen: &str) -> Result<(), String> {
        let stm = match fen.split_whitespace().nth(1) {
            Some("w") => Color::White,
            Some("b") => Color::Black,
            _ => return Err(format!("bad FEN: {fen}")),
        };

        self.fen = fen.to_string();
        self.base_stm = stm;
        self.moves.clear();
        Ok(())
    }

    fn key(&self) -> PositionKey {
        let mut raw = self.state_hash();
        if raw == 0 || raw == u64::MAX {
            raw = 0x5eed_5eed_5eed_5eed;
        }
        PositionKey::new(raw)
    }

    fn side_to_move(&self) -> Color {
        if self.moves.len() % 2 == 0 {
            self.base_stm
        } else {
            !self.base_stm
        }
    }

    fn game_ply(&self) -> i32 {
        self.moves.len() as i32
    }

    fn resolve_move(&self, token: &str) -> Option<RawMove> {
        let bytes = token.as_bytes();
        if bytes.len() != 4 && bytes.len() != 5 {
            return None;
        }

        let from = parse_square(&bytes[0..2])?;
        let to = parse_square(&bytes[2..4])?;

        let promo = if bytes.len() == 5 {
            match bytes[4].to_ascii_lowercase() {
                b'q' => 1,
                b'r' => 2,
                b'b' => 3,
                b'n' => 4,
                _ => return None,
            }
        } else {
            0
        };

        // Marker bit keeps a1a1 distinct from RawMove::NONE.
        Some(RawMove::new(from | (to << 6) | (promo << 12) | (1 << 15)))
    }

    fn do_move(&mut self, mv: RawMove) {
        self.moves.push(mv);
    }

    fn undo_move(&mut self) {
        self.moves.pop().expect("undo with no moves played");
    }

    fn is_draw(&self, ply: i32) -> bool {
        self.draw_plies.contains(&ply)
    }

    fn material(&self) -> MaterialCount {
        self.material_by_ply
            .get(&self.game_ply())
            .copied()
            .unwrap_or(MaterialCount {
                total: 32,
                bishops: [2, 2],
                knights: [2, 2],
                bishops_on_dark: [1, 1],
            })
    }

    fn format_move(&self, mv: RawMove) -> String {
        let raw = mv.raw();
        let from = render_square(raw & 0x3f);
        let to = render_square((raw >> 6) & 0x3f);
        let promo = match (raw >> 12) & 0x7 {
            1 => "q",
            2 => "r",
            3 => "b",
            4 => "n",
            _ => "",
        };
        format!("{from}{to}{promo}")
    }
}

/// Store wired to a capturing sink.
pub fn test_store() -> (ExperienceStore, Arc<BufferSink>) {
    let sink = Arc::new(BufferSink::new());
    let sink_dyn: Arc<dyn experience_core::InfoSink> = sink.clone();
    let store = ExperienceStore::with_parts(Arc::new(WriteGates::new()), sink_dyn);
    (store, sink)
}

pub fn entry(key: u64, mv: u32, value: i32, depth: i32) -> ExpEntry {
    ExpEntry::new(
        PositionKey::new(key),
        RawMove::new(mv),
        Value::new(value),
        depth,
    )
}

/// Write a version-2 experience file from raw entries.
pub fn write_v2_file(path: &std::path::Path, entries: &[ExpEntry]) {
    let mut data = experience_core::codec::SIGNATURE_V2.to_vec();
    for e in entries {
        data.extend_from_slice(&e.to_bytes());
    }
    std::fs::write(path, data).unwrap();
}

/// Write a version-1 experience file (no counts, `00 FF 00 FF` pad).
pub fn write_v1_file(path: &std::path::Path, entries: &[(u64, u32, i32, i32)]) {
    let mut data = experience_core::codec::SIGNATURE_V1.to_vec();
    for &(key, mv, value, depth) in entries {
        let mut rec = [0u8; experience_core::ENTRY_SIZE];
        rec[0..8].copy_from_slice(&key.to_le_bytes());
        rec[8..12].copy_from_slice(&mv.to_le_bytes());
        rec[12..16].copy_from_slice(&value.to_le_bytes());
        rec[16..20].copy_from_slice(&depth.to_le_bytes());
        rec[20..24].copy_from_slice(&[0x00, 0xFF, 0x00, 0xFF]);
        data.extend_from_slice(&rec);
    }
    std::fs::write(path, data).unwrap();
}
