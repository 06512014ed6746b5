/// Bump Arena
///
/// Fixed-capacity slot storage for the resource registries. Slots are handed
/// out in order and only ever released by rewinding the cursor, so indices
/// below the cursor stay stable for the lifetime of the arena.

use super::{out_of_memory_error, MemoryResult};

/// Position of the bump cursor, used to rewind a stack-disciplined sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaMark(usize);

pub struct Arena<T> {
    storage: Vec<Option<T>>,
    cursor: usize,
    capacity: usize,
}

impl<T> Arena<T> {
    /// Create an arena able to hold `capacity` slots
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Vec::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Bump-allocate one slot holding `value`
    pub fn alloc(&mut self, value: T) -> MemoryResult<u32> {
        if self.cursor >= self.capacity {
            return Err(out_of_memory_error(self.cursor + 1, self.capacity));
        }

        let index = self.cursor;
        if index < self.storage.len() {
            // Slot was previously rewound; reuse its storage
            self.storage[index] = Some(value);
        } else {
            self.storage.push(Some(value));
        }
        self.cursor += 1;

        Ok(index as u32)
    }

    /// Current cursor position
    pub fn mark(&self) -> ArenaMark {
        ArenaMark(self.cursor)
    }

    /// Drop every slot allocated since `mark` and move the cursor back.
    /// Returns the values released, newest first.
    pub fn rewind(&mut self, mark: ArenaMark) -> Vec<T> {
        let mut released = Vec::new();
        while self.cursor > mark.0 {
            self.cursor -= 1;
            if let Some(value) = self.storage[self.cursor].take() {
                released.push(value);
            }
        }
        released
    }

    /// Rewind the cursor by exactly one slot
    pub fn pop(&mut self) -> Option<T> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.storage[self.cursor].take()
    }

    /// Take the value out of a slot without moving the cursor.
    /// The slot stays allocated but empty.
    pub fn abandon(&mut self, index: u32) -> Option<T> {
        let index = index as usize;
        if index >= self.cursor {
            return None;
        }
        self.storage[index].take()
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        let index = index as usize;
        if index >= self.cursor {
            return None;
        }
        self.storage[index].as_ref()
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        let index = index as usize;
        if index >= self.cursor {
            return None;
        }
        self.storage[index].as_mut()
    }

    /// Number of allocated slots, including abandoned ones
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Release everything and reset the cursor to zero
    pub fn reset(&mut self) {
        self.storage.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_sequential() {
        let mut arena = Arena::with_capacity(4);
        assert_eq!(arena.alloc("a").unwrap(), 0);
        assert_eq!(arena.alloc("b").unwrap(), 1);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(1), Some(&"b"));
    }

    #[test]
    fn test_exhaustion_reports_out_of_memory() {
        let mut arena = Arena::with_capacity(1);
        arena.alloc(1u32).unwrap();
        assert!(arena.alloc(2u32).is_err());
    }

    #[test]
    fn test_rewind_releases_newest_first() {
        let mut arena = Arena::with_capacity(8);
        arena.alloc(1).unwrap();
        let mark = arena.mark();
        arena.alloc(2).unwrap();
        arena.alloc(3).unwrap();

        assert_eq!(arena.rewind(mark), vec![3, 2]);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(1), None);

        // Rewound slots are handed out again
        assert_eq!(arena.alloc(4).unwrap(), 1);
        assert_eq!(arena.get(1), Some(&4));
    }

    #[test]
    fn test_abandoned_slot_is_not_reclaimed() {
        let mut arena = Arena::with_capacity(2);
        let index = arena.alloc(10).unwrap();
        assert_eq!(arena.abandon(index), Some(10));
        assert_eq!(arena.get(index), None);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.alloc(11).unwrap(), 1);
    }
}
