//! Global write gates.
//!
//! Process-wide switches deciding whether `add_*` calls are accepted.
//! All flags are atomics so any engine thread may consult them; the
//! bench single-shot token is consumed with an atomic exchange.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct WriteGates {
    enabled: AtomicBool,
    paused: AtomicBool,
    readonly: AtomicBool,
    bench_mode: AtomicBool,
    bench_single_shot: AtomicBool,
}

impl Default for WriteGates {
    fn default() -> Self {
        WriteGates {
            enabled: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            readonly: AtomicBool::new(false),
            bench_mode: AtomicBool::new(false),
            bench_single_shot: AtomicBool::new(false),
        }
    }
}

impl WriteGates {
    pub fn new() -> WriteGates {
        WriteGates::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::Relaxed);
    }

    pub fn readonly(&self) -> bool {
        self.readonly.load(Ordering::Relaxed)
    }

    pub fn set_readonly(&self, on: bool) {
        self.readonly.store(on, Ordering::Relaxed);
    }

    pub fn pause_learning(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume_learning(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_learning_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn bench_mode(&self) -> bool {
        self.bench_mode.load(Ordering::Relaxed)
    }

    /// Enter bench mode and arm the one-entry token.
    pub fn begin_bench(&self) {
        self.bench_mode.store(true, Ordering::Relaxed);
        self.bench_single_shot.store(true, Ordering::Relaxed);
    }

    pub fn end_bench(&self) {
        self.bench_mode.store(false, Ordering::Relaxed);
    }

    fn accepts_writes(&self) -> bool {
        self.enabled() && !self.is_learning_paused() && !self.readonly()
    }

    /// Whether a PV observation may be recorded right now. During a bench
    /// run this consumes the single-shot token: at most one caller ever
    /// sees `true` per `begin_bench`.
    pub fn allow_pv_write(&self) -> bool {
        if !self.accepts_writes() {
            return false;
        }

        if self.bench_mode() {
            return self.bench_single_shot.swap(false, Ordering::AcqRel);
        }

        true
    }

    /// MultiPV observations are dropped outright during bench runs.
    pub fn allow_multipv_write(&self) -> bool {
        self.accepts_writes() && !self.bench_mode()
    }
}
