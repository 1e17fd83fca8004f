//! Controller lifecycle: bootstrap, round-trips, saves, gates.

mod common;

use common::{entry, test_store, write_v2_file};
use experience_core::codec::SIGNATURE_V2;
use experience_core::{touch_file, PositionKey, RawMove, Value, ENTRY_SIZE};
use tempfile::tempdir;

fn path_str(path: &std::path::Path) -> String {
    path.to_str().unwrap().to_string()
}

#[test]
fn touch_bootstraps_signature_only_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.exp");

    touch_file(path.to_str().unwrap()).unwrap();

    let data = std::fs::read(&path).unwrap();
    assert_eq!(data.len(), 26);
    assert_eq!(data, SIGNATURE_V2);

    // Touching again leaves the file alone.
    touch_file(path.to_str().unwrap()).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), SIGNATURE_V2);
}

#[test]
fn store_touch_respects_enabled_gate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gated.exp");

    let (mut store, _sink) = test_store();
    store.load(path.to_str().unwrap(), true); // missing file, sets filename
    store.gates().set_enabled(false);
    store.touch();
    assert!(!path.exists());

    store.gates().set_enabled(true);
    store.touch();
    assert_eq!(std::fs::read(&path).unwrap(), SIGNATURE_V2);
}

#[test]
fn single_move_round_trip() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("single.exp"));

    let (mut store, _sink) = test_store();
    assert!(!store.load(&path, true)); // nothing on disk yet
    store.add_pv_experience(
        PositionKey::new(0x1111_1111_1111_1111),
        RawMove::new(0xABCD),
        Value::new(150),
        10,
    );
    store.save();

    let (mut fresh, _sink) = test_store();
    assert!(fresh.load(&path, true));

    let chain = fresh.probe(PositionKey::new(0x1111_1111_1111_1111)).unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].count, 1);
    assert_eq!(chain[0].depth, 10);
    assert_eq!(chain[0].value, Value::new(150));
}

#[test]
fn incremental_save_skips_shallow_and_dedups_batch() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("incr.exp"));

    let (mut store, sink) = test_store();
    store.load(&path, true);

    let key = PositionKey::new(0x10);
    let mv = RawMove::new(7);
    store.add_pv_experience(key, mv, Value::new(100), 10);
    store.add_pv_experience(key, mv, Value::new(120), 10); // same (key, move)
    store.add_pv_experience(key, RawMove::new(8), Value::new(5), 3); // below MinDepth
    store.add_multipv_experience(key, mv, Value::new(90), 9); // dup across kinds
    store.save();

    let data = std::fs::read(&path).unwrap();
    assert_eq!(data.len(), SIGNATURE_V2.len() + ENTRY_SIZE);
    assert!(sink.contains("Saved 1 PV and 0 MultiPV entries"));

    // The in-memory chain still merged both observations.
    let best = store.find_best_entry(key).unwrap();
    assert_eq!(best.count, 3);
}

#[test]
fn save_load_save_is_byte_identical() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("canon.exp"));

    let (mut store, _sink) = test_store();
    store.load(&path, true);
    for i in 0..40u64 {
        let key = PositionKey::new(0x1000 + i / 4);
        store.add_pv_experience(key, RawMove::new(100 + i as u32), Value::new(i as i32 * 7 - 60), 6 + (i % 9) as i32);
    }
    // Duplicate observations bump counts.
    for _ in 0..300 {
        store.add_pv_experience(PositionKey::new(0x1000), RawMove::new(100), Value::new(40), 8);
    }
    store.save_to(&path, true, false);
    let first = std::fs::read(&path).unwrap();

    let (mut reloaded, _sink) = test_store();
    assert!(reloaded.load(&path, true));
    reloaded.save_to(&path, true, false);
    let second = std::fs::read(&path).unwrap();

    assert_eq!(first, second);

    // The rewrite keeps the previous generation as a backup.
    let bak = std::fs::read(format!("{path}.bak")).unwrap();
    assert_eq!(bak, first);
}

#[test]
fn full_save_scales_counts() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("scaled.exp"));

    let (mut store, _sink) = test_store();
    store.load(&path, true);
    let key = PositionKey::new(0x77);
    for _ in 0..600 {
        store.add_pv_experience(key, RawMove::new(1), Value::new(30), 10);
    }
    store.save_to(&path, true, false);

    let (mut fresh, _sink) = test_store();
    assert!(fresh.load(&path, true));
    let best = fresh.find_best_entry(key).unwrap();
    // 600 observations, scale = 1 + 600/128 = 5.
    assert_eq!(best.count, 120);
}

#[test]
fn unload_saves_and_clears() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("unload.exp"));

    let (mut store, _sink) = test_store();
    store.load(&path, true);
    let key = PositionKey::new(0x20);
    store.add_pv_experience(key, RawMove::new(3), Value::new(10), 8);
    store.unload();

    assert!(store.probe(key).is_none());
    assert!(store.filename().is_empty());
    assert!(!store.has_new_exp());

    let data = std::fs::read(&path).unwrap();
    assert_eq!(data.len(), SIGNATURE_V2.len() + ENTRY_SIZE);
}

#[test]
fn init_is_idempotent_for_loaded_file() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("init.exp"));
    write_v2_file(&dir.path().join("init.exp"), &[entry(0x9, 1, 25, 8)]);

    let (mut store, sink) = test_store();
    store.init(&path);
    assert!(store.wait_for_loading_finished());
    let loads_before = sink.lines().len();

    store.init(&path); // same file, already loaded: no reload
    assert!(store.wait_for_loading_finished());
    assert_eq!(sink.lines().len(), loads_before);
    assert_eq!(store.positions(), 1);
}

#[test]
fn asynchronous_load_publishes_after_wait() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("async.exp");
    let entries: Vec<_> = (0..500).map(|i| entry(0x4000 + i, 1, 10, 8)).collect();
    write_v2_file(&file, &entries);

    let (mut store, _sink) = test_store();
    store.load(file.to_str().unwrap(), false);
    assert!(store.wait_for_loading_finished());
    assert_eq!(store.positions(), 500);
}

#[test]
fn dropping_store_mid_load_does_not_hang() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("dropped.exp");
    let entries: Vec<_> = (0..20_000).map(|i| entry(0x8000 + i, 1, 10, 8)).collect();
    write_v2_file(&file, &entries);

    let (mut store, _sink) = test_store();
    store.load(file.to_str().unwrap(), false);
    drop(store); // cancels the loader and joins it
}

#[test]
fn aborted_load_keeps_partial_linking() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("aborted.exp");
    let entries: Vec<_> = (0..20_000).map(|i| entry(0x20_0000 + i, 1, 10, 8)).collect();
    write_v2_file(&file, &entries);

    let (mut store, _sink) = test_store();
    store.load(file.to_str().unwrap(), false);
    store.abort_loading();

    // Depending on timing the loader may already have finished; either
    // way the index holds a consistent prefix of the file.
    let completed = store.wait_for_loading_finished();
    let positions = store.positions();
    if completed {
        assert_eq!(positions, 20_000);
    } else {
        assert!(positions <= 20_000);
    }
}

#[test]
fn write_gates_block_mutation() {
    let (mut store, _sink) = test_store();
    store.load("missing-gates.exp", true);
    let key = PositionKey::new(0x55);

    store.gates().set_enabled(false);
    store.add_pv_experience(key, RawMove::new(1), Value::new(10), 8);
    store.add_multipv_experience(key, RawMove::new(1), Value::new(10), 8);
    store.gates().set_enabled(true);

    store.gates().pause_learning();
    store.add_pv_experience(key, RawMove::new(1), Value::new(10), 8);
    store.gates().resume_learning();

    store.gates().set_readonly(true);
    store.add_multipv_experience(key, RawMove::new(1), Value::new(10), 8);
    store.gates().set_readonly(false);

    assert!(!store.has_new_exp());
    assert!(store.probe(key).is_none());
}

#[test]
fn bench_mode_records_exactly_one_pv_entry() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("bench.exp"));

    let (mut store, _sink) = test_store();
    store.load(&path, true);
    store.begin_bench();
    assert_eq!(std::fs::read(&path).unwrap(), SIGNATURE_V2); // touched

    for i in 0..3u32 {
        store.add_pv_experience(PositionKey::new(0x900 + i as u64), RawMove::new(i + 1), Value::new(10), 8);
        store.add_multipv_experience(PositionKey::new(0x910 + i as u64), RawMove::new(i + 1), Value::new(10), 8);
    }
    store.save();
    store.end_bench();

    let (mut fresh, _sink) = test_store();
    assert!(fresh.load(&path, true));
    assert_eq!(fresh.total_entries(), 1);
    // The surviving entry is the first PV write.
    let chain = fresh.probe(PositionKey::new(0x900)).unwrap();
    assert_eq!(chain[0].mv, RawMove::new(1));
}

#[test]
fn count_saturates_at_u16_max() {
    let (mut store, _sink) = test_store();
    store.load("missing-saturate.exp", true);

    let key = PositionKey::new(0xCAFE);
    let mv = RawMove::new(42);
    for _ in 0..(1 << 17) + 8 {
        store.add_pv_experience(key, mv, Value::new(1), 8);
    }

    assert_eq!(store.find_best_entry(key).unwrap().count, u16::MAX);
}

#[test]
fn save_noop_without_staging_or_index() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("noop.exp"));

    let (store, _sink) = test_store();
    store.save_to(&path, true, false);
    assert!(!std::path::Path::new(&path).exists());
}

#[test]
fn depth_wins_over_value_in_best_entry() {
    let (mut store, _sink) = test_store();
    store.load("missing-depth.exp", true);

    let key = PositionKey::new(0xD1);
    let mv = RawMove::new(9);
    store.add_pv_experience(key, mv, Value::new(-300), 4);
    store.add_pv_experience(key, mv, Value::new(500), 20);

    let best = store.find_best_entry(key).unwrap();
    assert_eq!(best.value, Value::new(500));
    assert_eq!(best.depth, 20);
    assert_eq!(best.count, 2);
}

#[test]
fn options_apply_reloads_store() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("opts.exp");
    write_v2_file(&file, &[entry(0x31, 1, 40, 9)]);

    let (mut store, _sink) = test_store();
    let mut opts = experience_core::ExperienceOptions::default();
    opts.file = path_str(&file);
    opts.readonly = true;
    opts.apply(&mut store);

    assert!(store.wait_for_loading_finished());
    assert_eq!(store.positions(), 1);
    assert!(store.gates().readonly());

    // Readonly: adds are dropped.
    store.add_pv_experience(PositionKey::new(0x31), RawMove::new(2), Value::new(1), 8);
    assert!(!store.has_new_exp());

    // Disabling unloads.
    opts.enabled = false;
    opts.apply(&mut store);
    assert_eq!(store.positions(), 0);
}

#[test]
fn new_game_saves_and_resumes() {
    let dir = tempdir().unwrap();
    let path = path_str(&dir.path().join("newgame.exp"));

    let (mut store, _sink) = test_store();
    store.load(&path, true);
    store.gates().pause_learning();
    store.add_pv_experience(PositionKey::new(0x61), RawMove::new(1), Value::new(5), 8); // dropped
    store.on_new_game();

    assert!(!store.gates().is_learning_paused());
    store.add_pv_experience(PositionKey::new(0x61), RawMove::new(1), Value::new(5), 8);
    store.on_new_game();

    let (mut fresh, _sink) = test_store();
    assert!(fresh.load(&path, true));
    assert_eq!(fresh.total_entries(), 1);
    fresh.on_quit();
    assert!(fresh.filename().is_empty());
    assert_eq!(fresh.positions(), 0);
}

#[test]
fn second_load_merges_into_existing_index() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.exp");
    let b = dir.path().join("b.exp");
    write_v2_file(&a, &[entry(0x100, 1, 50, 8), entry(0x101, 1, 60, 8)]);
    write_v2_file(&b, &[entry(0x100, 1, 70, 8), entry(0x102, 1, 80, 8)]);

    let (mut store, sink) = test_store();
    assert!(store.load(a.to_str().unwrap(), true));
    assert!(store.load(b.to_str().unwrap(), true));

    assert_eq!(store.positions(), 3);
    let merged = store
        .probe(PositionKey::new(0x100))
        .unwrap()[0];
    assert_eq!(merged.count, 2);
    assert_eq!(merged.value, Value::new(60)); // same depth: averaged

    assert!(sink.contains("Total new positions: 1"));
    assert!(sink.contains("Fragmentation"));
}
