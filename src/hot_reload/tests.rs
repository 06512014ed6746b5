use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use super::*;
use crate::gpu::{RecordingBackend, ShaderStage};
use crate::ui::MessageQueue;

const DEBOUNCE: Duration = Duration::from_millis(100);

const KERNEL: &str = "#include \"constants.wgsl\"\n@compute @workgroup_size(4, 4, 4)\nfn main() {}\n";
const BROKEN_KERNEL: &str = "@compute @workgroup_size(4, 4, 4)\nfn main( {\n";

fn watcher_with_file(dir: &Path) -> (FileWatcher<u32>, ManualSource) {
    fs::write(dir.join("brush.comp.wgsl"), KERNEL).unwrap();
    let source = ManualSource::new();
    let mut watcher = FileWatcher::with_source(dir, DEBOUNCE, Box::new(source.clone()));
    watcher.watch_file("brush.comp.wgsl", 7);
    (watcher, source)
}

#[test]
fn test_burst_of_events_becomes_one_change() {
    let dir = tempfile::tempdir().unwrap();
    let (mut watcher, source) = watcher_with_file(dir.path());
    let start = Instant::now();

    for step in 0..5u64 {
        source.push(dir.path().join("brush.comp.wgsl"));
        watcher.update_at(start + Duration::from_millis(step * 20));
        assert_eq!(watcher.pending_count(), 1);
        assert_eq!(watcher.ready_count(), 0);
        assert!(watcher.take_changed().is_none());
    }

    // The last event was at 80ms; the quiet period ends at 180ms
    watcher.update_at(start + Duration::from_millis(179));
    assert_eq!(watcher.ready_count(), 0);

    watcher.update_at(start + Duration::from_millis(180));
    assert_eq!(watcher.ready_count(), 1);

    let changed: Vec<_> = watcher.changed_files().collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].name, "brush.comp.wgsl");
    assert_eq!(changed[0].user_data, 7);
    assert!(watcher.take_changed().is_none());
}

#[test]
fn test_event_on_ready_entry_restarts_quiet_period() {
    let dir = tempfile::tempdir().unwrap();
    let (mut watcher, source) = watcher_with_file(dir.path());
    let start = Instant::now();

    source.push("brush.comp.wgsl");
    watcher.update_at(start);
    watcher.update_at(start + DEBOUNCE);
    assert_eq!(watcher.ready_count(), 1);

    // A write lands before the consumer drained the entry
    source.push("brush.comp.wgsl");
    watcher.update_at(start + DEBOUNCE + Duration::from_millis(10));
    assert_eq!(watcher.ready_count(), 0);
    assert_eq!(watcher.pending_count(), 1);

    watcher.update_at(start + DEBOUNCE * 2 + Duration::from_millis(10));
    assert_eq!(watcher.changed_files().count(), 1);
}

#[test]
fn test_unwatched_paths_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (mut watcher, source) = watcher_with_file(dir.path());
    let start = Instant::now();

    source.push(dir.path().join("other.comp.wgsl"));
    source.push("xbrush.comp.wgsl");
    watcher.update_at(start);
    assert_eq!(watcher.pending_count(), 0);
}

#[test]
fn test_windows_separators_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let (mut watcher, source) = watcher_with_file(dir.path());
    let start = Instant::now();

    source.push("C:\\sculpt\\shaders\\brush.comp.wgsl");
    watcher.update_at(start);
    assert_eq!(watcher.pending_count(), 1);
}

#[test]
fn test_unreadable_file_stays_ready() {
    let dir = tempfile::tempdir().unwrap();
    let source = ManualSource::new();
    let mut watcher: FileWatcher<()> =
        FileWatcher::with_source(dir.path(), DEBOUNCE, Box::new(source.clone()));
    watcher.watch_file("late.wgsl", ());

    let start = Instant::now();
    source.push("late.wgsl");
    watcher.update_at(start);
    watcher.update_at(start + DEBOUNCE);

    // Cannot be opened yet, so it is skipped and kept
    assert!(watcher.take_changed().is_none());
    assert_eq!(watcher.ready_count(), 1);

    fs::write(dir.path().join("late.wgsl"), "fn main() {}").unwrap();
    assert_eq!(watcher.take_changed().map(|file| file.name), Some("late.wgsl".to_string()));
}

#[test]
fn test_watch_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (mut watcher, _source) = watcher_with_file(dir.path());

    assert_eq!(watcher.watch_file("brush.comp.wgsl", 7), 0);
    // Conflicting user data keeps the first registration
    assert_eq!(watcher.watch_file("brush.comp.wgsl", 8), 0);
    assert_eq!(watcher.watched(0).map(|file| file.user_data), Some(7));
    assert_eq!(watcher.watched_count(), 1);
}

#[test]
fn test_inert_watcher_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut watcher: FileWatcher<()> = FileWatcher::inert(dir.path(), DEBOUNCE);
    watcher.watch_file("anything.wgsl", ());
    watcher.update();
    assert!(!watcher.is_active());
    assert_eq!(watcher.pending_count(), 0);
}

fn manager(dir: &Path) -> (ShaderManager, ManualSource) {
    let config = HotReloadConfig {
        shader_dir: dir.to_path_buf(),
        ..Default::default()
    };
    let source = ManualSource::new();
    (ShaderManager::with_source(&config, Box::new(source.clone())), source)
}

/// Push one event and let its quiet period pass
fn touch_and_poll(
    manager: &mut ShaderManager,
    source: &ManualSource,
    gpu: &RecordingBackend,
    messages: &mut MessageQueue,
    file: &str,
) -> usize {
    let start = Instant::now();
    source.push(file);
    let mut swapped = manager.poll_at(gpu, messages, start);
    swapped += manager.poll_at(gpu, messages, start + DEBOUNCE);
    swapped
}

#[test]
fn test_failed_reload_keeps_program() {
    let dir = tempfile::tempdir().unwrap();
    let gpu = RecordingBackend::new();
    let mut messages = MessageQueue::default();
    let (mut manager, source) = manager(dir.path());

    fs::write(dir.path().join("sculpt.comp.wgsl"), KERNEL).unwrap();
    let handle = manager.add(&gpu, "sculpt", ShaderStage::Compute);
    assert!(manager.is_valid(handle));
    let before = manager.native(handle).unwrap();

    fs::write(dir.path().join("sculpt.comp.wgsl"), BROKEN_KERNEL).unwrap();
    let swapped = touch_and_poll(&mut manager, &source, &gpu, &mut messages, "sculpt.comp.wgsl");

    assert_eq!(swapped, 0);
    assert_eq!(manager.native(handle).unwrap(), before);
    assert!(!manager.take_changed());
    assert_eq!(messages.errors(), 1);

    // Fixing the file swaps the program inside the same slot
    fs::write(
        dir.path().join("sculpt.comp.wgsl"),
        "@compute @workgroup_size(8, 8, 1)\nfn main() {}\n",
    )
    .unwrap();
    let swapped = touch_and_poll(&mut manager, &source, &gpu, &mut messages, "sculpt.comp.wgsl");

    assert_eq!(swapped, 1);
    assert!(manager.is_valid(handle));
    assert_ne!(manager.native(handle).unwrap(), before);
    assert_eq!(manager.get(handle).map(|s| s.workgroup_size()), Some([8, 8, 1]));
    assert!(manager.take_changed());
    assert!(!manager.take_changed());

    // The replaced program was destroyed
    assert_eq!(gpu.live_objects().2, 1);
    manager.cleanup(&gpu);
    assert_eq!(gpu.live_objects().2, 0);
}

#[test]
fn test_include_edit_recompiles_every_user() {
    let dir = tempfile::tempdir().unwrap();
    let gpu = RecordingBackend::new();
    let mut messages = MessageQueue::default();
    let (mut manager, source) = manager(dir.path());

    let common = dir.path().join("common.wgsl");
    fs::write(&common, "fn helper() {}\n").unwrap();
    let user = "#include \"common.wgsl\"\n@compute @workgroup_size(4, 4, 4)\nfn main() {}\n";
    fs::write(dir.path().join("fill.comp.wgsl"), user).unwrap();
    fs::write(dir.path().join("find.comp.wgsl"), user).unwrap();
    fs::write(dir.path().join("plain.comp.wgsl"), KERNEL).unwrap();

    let fill = manager.add(&gpu, "fill", ShaderStage::Compute);
    let find = manager.add(&gpu, "find", ShaderStage::Compute);
    let plain = manager.add(&gpu, "plain", ShaderStage::Compute);
    let before = [fill, find, plain].map(|handle| manager.native(handle).unwrap());

    fs::write(&common, "fn helper() -> f32 { return 1.0; }\n").unwrap();
    let swapped = touch_and_poll(&mut manager, &source, &gpu, &mut messages, "common.wgsl");

    assert_eq!(swapped, 2);
    assert_ne!(manager.native(fill).unwrap(), before[0]);
    assert_ne!(manager.native(find).unwrap(), before[1]);
    assert_eq!(manager.native(plain).unwrap(), before[2]);
    assert!(manager.take_changed());
    assert_eq!(messages.errors(), 0);

    // A broken include keeps every old program and reports each user
    let current = [fill, find].map(|handle| manager.native(handle).unwrap());
    fs::write(&common, "fn helper( {\n").unwrap();
    let swapped = touch_and_poll(&mut manager, &source, &gpu, &mut messages, "common.wgsl");

    assert_eq!(swapped, 0);
    assert_eq!(messages.errors(), 2);
    assert_eq!([fill, find].map(|handle| manager.native(handle).unwrap()), current);

    // Removed shaders are no longer rebuilt
    fs::write(&common, "fn helper() {}\n").unwrap();
    assert!(manager.remove(&gpu, find));
    let swapped = touch_and_poll(&mut manager, &source, &gpu, &mut messages, "common.wgsl");
    assert_eq!(swapped, 1);
    assert_eq!(messages.errors(), 2);

    manager.cleanup(&gpu);
    assert_eq!(gpu.live_objects().2, 0);
}

#[test]
fn test_failed_add_returns_invalid_and_pops_slot() {
    let dir = tempfile::tempdir().unwrap();
    let gpu = RecordingBackend::new();
    let (mut manager, _source) = manager(dir.path());

    fs::write(dir.path().join("good.comp.wgsl"), KERNEL).unwrap();
    fs::write(dir.path().join("bad.comp.wgsl"), BROKEN_KERNEL).unwrap();

    let good = manager.add(&gpu, "good", ShaderStage::Compute);
    let bad = manager.add(&gpu, "bad", ShaderStage::Compute);
    let missing = manager.add(&gpu, "missing", ShaderStage::Fragment);

    assert!(manager.is_valid(good));
    assert!(bad.is_null());
    assert!(missing.is_null());
    assert_eq!(manager.len(), 1);
    assert!(manager.require(&gpu, "bad", ShaderStage::Compute).is_err());

    manager.cleanup(&gpu);
}

#[test]
fn test_stage_suffixes() {
    assert_eq!(ShaderManager::source_name("raymarch", ShaderStage::Vertex), "raymarch.vert.wgsl");
    assert_eq!(ShaderManager::source_name("raymarch", ShaderStage::Fragment), "raymarch.frag.wgsl");
    assert_eq!(ShaderManager::source_name("scale", ShaderStage::Compute), "scale.comp.wgsl");
}

#[test]
fn test_config_reload_keeps_old_config_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sculpt.toml");
    fs::write(&path, "[volume]\nsize = 64\n").unwrap();

    let source = ManualSource::new();
    let mut reloader = ConfigReloader::with_source(&path, DEBOUNCE, Box::new(source.clone()));
    let mut messages = MessageQueue::default();
    let start = Instant::now();

    fs::write(&path, "[volume]\nsize = 128\n").unwrap();
    source.push(&path);
    assert!(reloader.poll_at(&mut messages, start).is_none());
    let reloaded = reloader.poll_at(&mut messages, start + DEBOUNCE).unwrap();
    assert_eq!(reloaded.volume.size, 128);

    fs::write(&path, "[volume]\nsize = 30\n").unwrap();
    source.push(&path);
    reloader.poll_at(&mut messages, start + DEBOUNCE * 2);
    assert!(reloader.poll_at(&mut messages, start + DEBOUNCE * 3).is_none());
    assert_eq!(messages.errors(), 1);
}
