/// Resource Registry
///
/// Per-type pool of GPU objects. The registry is the sole owner of every
/// object it holds; callers keep `Handle<T>` values, which are plain
/// (index, generation) pairs and may be copied freely. Every lookup goes
/// through the registry, so the backing storage is free to move.
///
/// Slots come from a bump `Arena`. Live entries form a singly linked list,
/// newest first, which gives `pop_last` its stack discipline and makes
/// `remove` an O(n) unlink. Removed slots are abandoned, not reclaimed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use super::arena::Arena;
use super::MemoryResult;
use crate::gpu::GpuBackend;

/// Object that owns native GPU state and must be released explicitly
pub trait GpuResource {
    /// Release every native handle this object owns. Called exactly once by
    /// the owning registry.
    fn cleanup(&mut self, gpu: &dyn GpuBackend);
}

/// Logical reference into a `Registry<T>`
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Sentinel that never resolves
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
        _marker: PhantomData,
    };

    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// True for the `INVALID` sentinel. A non-null handle may still be stale;
    /// use `Registry::is_valid` for the full check.
    pub fn is_null(&self) -> bool {
        self.index == u32::MAX
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle<{}>(invalid)", short_type_name::<T>())
        } else {
            write!(
                f,
                "Handle<{}>({}v{})",
                short_type_name::<T>(),
                self.index,
                self.generation
            )
        }
    }
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

struct Entry<T> {
    value: T,
    generation: u32,
    next: Option<u32>,
}

/// Handle-addressed pool of `T`
pub struct Registry<T: GpuResource> {
    label: &'static str,
    arena: Arena<Entry<T>>,
    /// Generation per slot index; survives arena rewinds
    generations: Vec<u32>,
    head: Option<u32>,
    live: usize,
}

impl<T: GpuResource> Registry<T> {
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            label,
            arena: Arena::with_capacity(capacity),
            generations: Vec::new(),
            head: None,
            live: 0,
        }
    }

    /// Store `value` in a new slot and return its handle
    pub fn get_new(&mut self, value: T) -> MemoryResult<Handle<T>> {
        let index = self.arena.len();
        let generation = self.generations.get(index).copied().unwrap_or(0);

        let slot = self.arena.alloc(Entry {
            value,
            generation,
            next: self.head,
        })?;

        if self.generations.len() <= slot as usize {
            self.generations.push(generation);
        }
        self.head = Some(slot);
        self.live += 1;

        log::trace!("[Registry:{}] new slot {}v{}", self.label, slot, generation);
        Ok(Handle::new(slot, generation))
    }

    /// Undo the most recent `get_new`. Only valid when nothing else was
    /// allocated or removed in between.
    pub fn pop_last(&mut self) -> Option<T> {
        let head = self.head?;
        if head as usize + 1 != self.arena.len() {
            debug_assert!(false, "pop_last called out of stack order");
            log::error!(
                "[Registry:{}] pop_last out of stack order (head {}, len {})",
                self.label,
                head,
                self.arena.len()
            );
            return None;
        }

        let entry = self.arena.pop()?;

        self.head = entry.next;
        self.live -= 1;
        self.bump_generation(head);
        Some(entry.value)
    }

    /// Release the object behind `handle` and unlink it. Returns false when
    /// the handle is stale.
    pub fn remove(&mut self, handle: Handle<T>, gpu: &dyn GpuBackend) -> bool {
        if !self.is_valid(handle) {
            log::warn!("[Registry:{}] remove of stale {:?}", self.label, handle);
            return false;
        }

        // Walk the list to find the predecessor
        let mut prev: Option<u32> = None;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            if index == handle.index {
                break;
            }
            prev = Some(index);
            cursor = self.arena.get(index).and_then(|entry| entry.next);
        }

        let Some(mut entry) = self.arena.abandon(handle.index) else {
            return false;
        };

        match prev {
            Some(prev_index) => {
                if let Some(prev_entry) = self.arena.get_mut(prev_index) {
                    prev_entry.next = entry.next;
                }
            }
            None => self.head = entry.next,
        }

        entry.value.cleanup(gpu);
        self.live -= 1;
        self.bump_generation(handle.index);
        true
    }

    /// Release every live object and reset to empty. Must be called before
    /// the registry is dropped.
    pub fn cleanup(&mut self, gpu: &dyn GpuBackend) {
        let mut cursor = self.head;
        while let Some(index) = cursor {
            cursor = match self.arena.get_mut(index) {
                Some(entry) => {
                    entry.value.cleanup(gpu);
                    entry.next
                }
                None => None,
            };
            self.bump_generation(index);
        }

        if self.live > 0 {
            log::debug!("[Registry:{}] released {} objects", self.label, self.live);
        }

        self.arena.reset();
        self.head = None;
        self.live = 0;
    }

    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        if handle.is_null() {
            return false;
        }
        self.arena
            .get(handle.index)
            .map(|entry| entry.generation == handle.generation)
            .unwrap_or(false)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if handle.is_null() {
            return None;
        }
        self.arena
            .get(handle.index)
            .filter(|entry| entry.generation == handle.generation)
            .map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if handle.is_null() {
            return None;
        }
        self.arena
            .get_mut(handle.index)
            .filter(|entry| entry.generation == handle.generation)
            .map(|entry| &mut entry.value)
    }

    /// Handle of the most recently created live object
    pub fn head(&self) -> Option<Handle<T>> {
        let index = self.head?;
        let entry = self.arena.get(index)?;
        Some(Handle::new(index, entry.generation))
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of arena slots in use, including abandoned ones
    pub fn slot_count(&self) -> usize {
        self.arena.len()
    }

    /// Maximum number of slots the arena can hand out
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Live objects, newest first
    pub fn iter(&self) -> RegistryIter<'_, T> {
        RegistryIter {
            registry: self,
            cursor: self.head,
        }
    }

    fn bump_generation(&mut self, index: u32) {
        if let Some(generation) = self.generations.get_mut(index as usize) {
            *generation = generation.wrapping_add(1);
        }
    }
}

impl<T: GpuResource> Drop for Registry<T> {
    fn drop(&mut self) {
        if self.live > 0 && !std::thread::panicking() {
            log::error!(
                "[Registry:{}] dropped with {} live objects; cleanup() was not called",
                self.label,
                self.live
            );
            debug_assert!(false, "registry '{}' dropped without cleanup", self.label);
        }
    }
}

pub struct RegistryIter<'a, T: GpuResource> {
    registry: &'a Registry<T>,
    cursor: Option<u32>,
}

impl<'a, T: GpuResource> Iterator for RegistryIter<'a, T> {
    type Item = (Handle<T>, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let entry = self.registry.arena.get(index)?;
        self.cursor = entry.next;
        Some((Handle::new(index, entry.generation), &entry.value))
    }
}
