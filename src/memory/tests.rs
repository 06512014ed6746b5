use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::gpu::RecordingBackend;

/// Counts how many times it was released
struct Tracked {
    id: u32,
    released: Arc<AtomicUsize>,
}

impl Tracked {
    fn new(id: u32, released: &Arc<AtomicUsize>) -> Self {
        Self {
            id,
            released: Arc::clone(released),
        }
    }
}

impl GpuResource for Tracked {
    fn cleanup(&mut self, _gpu: &dyn crate::gpu::GpuBackend) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_get_new_then_pop_last_restores_state() {
    let gpu = RecordingBackend::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new("tracked", 8);

    registry.get_new(Tracked::new(1, &released)).unwrap();
    registry.get_new(Tracked::new(2, &released)).unwrap();

    let head_before = registry.head();
    let slots_before = registry.slot_count();
    let len_before = registry.len();

    let handle = registry.get_new(Tracked::new(3, &released)).unwrap();
    assert_eq!(registry.head(), Some(handle));

    let popped = registry.pop_last().unwrap();
    assert_eq!(popped.id, 3);
    assert_eq!(registry.head(), head_before);
    assert_eq!(registry.slot_count(), slots_before);
    assert_eq!(registry.len(), len_before);

    // Popping hands the object back without releasing it
    assert_eq!(released.load(Ordering::SeqCst), 0);
    assert!(!registry.is_valid(handle));

    registry.cleanup(&gpu);
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[test]
fn test_popped_slot_reuse_does_not_revive_old_handle() {
    let gpu = RecordingBackend::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new("tracked", 4);

    let first = registry.get_new(Tracked::new(1, &released)).unwrap();
    registry.pop_last();

    let second = registry.get_new(Tracked::new(2, &released)).unwrap();
    assert_eq!(first.index(), second.index());
    assert_ne!(first, second);
    assert!(!registry.is_valid(first));
    assert!(registry.get(first).is_none());
    assert_eq!(registry.get(second).map(|tracked| tracked.id), Some(2));

    registry.cleanup(&gpu);
}

#[test]
fn test_remove_invalidates_handles_forever() {
    let gpu = RecordingBackend::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new("tracked", 8);

    let a = registry.get_new(Tracked::new(1, &released)).unwrap();
    let b = registry.get_new(Tracked::new(2, &released)).unwrap();
    let c = registry.get_new(Tracked::new(3, &released)).unwrap();
    let alias = b;

    assert!(registry.remove(b, &gpu));
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert!(!registry.is_valid(b));
    assert!(!registry.is_valid(alias));

    // A second remove through a stale alias is refused
    assert!(!registry.remove(alias, &gpu));
    assert_eq!(released.load(Ordering::SeqCst), 1);

    // Later allocations never bring the removed slot back
    for id in 4..8 {
        registry.get_new(Tracked::new(id, &released)).unwrap();
        assert!(!registry.is_valid(b));
    }

    let live: Vec<u32> = registry.iter().map(|(_, tracked)| tracked.id).collect();
    assert_eq!(live, vec![7, 6, 5, 4, 3, 1]);
    assert!(registry.is_valid(a));
    assert!(registry.is_valid(c));

    registry.cleanup(&gpu);
}

#[test]
fn test_remove_head_and_tail() {
    let gpu = RecordingBackend::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new("tracked", 8);

    let oldest = registry.get_new(Tracked::new(1, &released)).unwrap();
    registry.get_new(Tracked::new(2, &released)).unwrap();
    let newest = registry.get_new(Tracked::new(3, &released)).unwrap();

    assert!(registry.remove(newest, &gpu));
    assert!(registry.remove(oldest, &gpu));

    let live: Vec<u32> = registry.iter().map(|(_, tracked)| tracked.id).collect();
    assert_eq!(live, vec![2]);
    assert_eq!(registry.len(), 1);
    // Abandoned slots are not reclaimed
    assert_eq!(registry.slot_count(), 3);

    registry.cleanup(&gpu);
}

#[test]
fn test_cleanup_releases_everything_and_invalidates() {
    let gpu = RecordingBackend::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new("tracked", 8);

    let handles: Vec<_> = (0..5)
        .map(|id| registry.get_new(Tracked::new(id, &released)).unwrap())
        .collect();

    registry.cleanup(&gpu);
    assert_eq!(released.load(Ordering::SeqCst), 5);
    assert!(registry.is_empty());
    assert_eq!(registry.slot_count(), 0);
    assert!(handles.iter().all(|&handle| !registry.is_valid(handle)));

    // The registry is usable again and old handles stay dead
    let fresh = registry.get_new(Tracked::new(9, &released)).unwrap();
    assert_eq!(fresh.index(), handles[0].index());
    assert!(!registry.is_valid(handles[0]));

    registry.cleanup(&gpu);
}

#[test]
fn test_exhaustion_is_reported() {
    let gpu = RecordingBackend::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new("tracked", 2);

    registry.get_new(Tracked::new(1, &released)).unwrap();
    registry.get_new(Tracked::new(2, &released)).unwrap();
    let result = registry.get_new(Tracked::new(3, &released));
    assert!(matches!(result, Err(EngineError::OutOfMemory { .. })));
    assert_eq!(registry.len(), 2);

    registry.cleanup(&gpu);
}

#[test]
fn test_invalid_handle_never_resolves() {
    let gpu = RecordingBackend::new();
    let released = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new("tracked", 2);
    registry.get_new(Tracked::new(1, &released)).unwrap();

    let invalid: Handle<Tracked> = Handle::INVALID;
    assert!(invalid.is_null());
    assert!(!registry.is_valid(invalid));
    assert!(registry.get(invalid).is_none());
    assert_eq!(Handle::<Tracked>::default(), invalid);

    registry.cleanup(&gpu);
}

#[test]
fn test_objects_resolve_by_type() {
    use crate::gpu::{Buffer, RenderTexture, Texture3D, TextureFormat};

    let gpu = RecordingBackend::new();
    let mut objects = GpuObjects::new();

    let volume = Texture3D::new(&gpu, "volume", [4; 3], TextureFormat::R32Float).unwrap();
    let volume = objects.insert(&gpu, volume).unwrap();
    let target = objects
        .insert(&gpu, RenderTexture::new(&gpu, "target", 8, 8).unwrap())
        .unwrap();
    let uniform = objects
        .insert(&gpu, Buffer::constant(&gpu, "uniform", &[1.0f32; 4]).unwrap())
        .unwrap();
    assert_eq!(objects.len(), 3);
    assert_eq!(objects.get(volume).unwrap().size(), [4; 3]);
    assert_eq!(objects.get(target).unwrap().size(), [8, 8]);
    assert_eq!(objects.registry::<Buffer>().len(), 1);

    objects.get_mut(target).unwrap().resize(&gpu, 16, 8).unwrap();
    assert_eq!(objects.get(target).unwrap().size(), [16, 8]);

    assert!(objects.remove(&gpu, uniform));
    assert!(!objects.remove(&gpu, uniform));
    assert!(matches!(
        objects.get(uniform),
        Err(EngineError::ResourceNotFound { .. })
    ));
    assert_eq!(gpu.live_objects().0, 0);

    objects.cleanup(&gpu);
    assert!(objects.is_empty());
    assert!(!objects.is_valid(volume));
    assert_eq!(gpu.live_objects(), (0, 0, 0));
}

#[test]
fn test_full_objects_release_the_rejected_value() {
    use crate::gpu::Buffer;

    let gpu = RecordingBackend::new();
    let mut objects = GpuObjects::with_capacity(1);
    objects
        .insert(&gpu, Buffer::constant(&gpu, "first", &0u32).unwrap())
        .unwrap();

    let rejected = objects.insert(&gpu, Buffer::constant(&gpu, "second", &0u32).unwrap());
    assert!(matches!(rejected, Err(EngineError::OutOfMemory { .. })));
    assert_eq!(gpu.live_objects().0, 1);

    objects.cleanup(&gpu);
    assert_eq!(gpu.live_objects().0, 0);
}
