//! Experience store for a UCI chess engine.
//!
//! A persistent, append-optimized record of which moves the engine has
//! searched in which positions, with their evaluations, depths, and
//! observation counts. The store doubles as a learning log written
//! during play and a probing oracle consulted during search.
//!
//! The surrounding engine (search, move generation, draw detection) is
//! reached through the [`oracle::GameOracle`] trait. The on-disk format
//! with versioned readers, the in-memory index, the background loader,
//! defrag/merge maintenance, and the compact-PGN importer all live
//! here.

pub mod codec;
pub mod commands;
pub mod cpgn;
pub mod entry;
pub mod error;
pub mod gates;
pub mod index;
pub mod options;
pub mod oracle;
pub mod quality;
pub mod show;
pub mod sink;
pub mod store;
pub mod types;
pub mod util;

pub use entry::{ExpEntry, ENTRY_SIZE};
pub use error::ExperienceError;
pub use gates::WriteGates;
pub use index::{LinkOutcome, PositionIndex};
pub use options::ExperienceOptions;
pub use oracle::{GameOracle, MaterialCount};
pub use sink::{BufferSink, InfoSink, StdoutSink};
pub use store::{defrag, merge, touch_file, CancelToken, ExperienceStore};
pub use types::{Color, Depth, GameResult, PositionKey, RawMove, Value, MIN_DEPTH};
