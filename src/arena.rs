//! Host-owned record storage with stable handles.
//!
//! Indexes never own the records they link. The host keeps records in an
//! [`Arena`] and hands the indexes [`Handle`]s, which are slot indices paired
//! with a generation so a handle to a vacated slot never resolves to a later
//! occupant.

/// A stable reference to a record in an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Slot index of this handle.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot at the time the handle was issued.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage for host records.
///
/// Vacated slots are recycled through a free list.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty arena with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store a record and return its handle.
    ///
    /// # Panics
    /// Panics if the arena would exceed `u32::MAX` slots.
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            return Handle {
                index,
                generation: slot.generation,
            };
        }

        assert!(self.slots.len() < u32::MAX as usize, "arena slot count overflow");
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle {
            index,
            generation: 0,
        }
    }

    /// Remove a record, returning it if the handle was live.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((
                Handle {
                    index: index as u32,
                    generation: slot.generation,
                },
                value,
            ))
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::ops::Index<Handle> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle) -> &T {
        self.get(handle).expect("stale or foreign handle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_basic() {
        let mut arena = Arena::new();

        let h1 = arena.insert("hello");
        let h2 = arena.insert("world");

        assert_eq!(arena.get(h1), Some(&"hello"));
        assert_eq!(arena[h2], "world");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_stale_handle() {
        let mut arena = Arena::new();
        let h1 = arena.insert(1u32);
        assert_eq!(arena.remove(h1), Some(1));
        assert_eq!(arena.remove(h1), None);

        // The slot is recycled under a new generation.
        let h2 = arena.insert(2u32);
        assert_eq!(h2.index(), h1.index());
        assert_ne!(h2.generation(), h1.generation());
        assert_eq!(arena.get(h1), None);
        assert_eq!(arena.get(h2), Some(&2));
        assert!(!arena.contains(h1));
    }

    #[test]
    fn test_get_mut_and_iter() {
        let mut arena = Arena::with_capacity(4);
        let a = arena.insert(10);
        let b = arena.insert(20);
        let c = arena.insert(30);
        arena.remove(b);

        *arena.get_mut(c).unwrap() += 1;

        let live: Vec<_> = arena.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(live, vec![(a, 10), (c, 31)]);
        assert!(!arena.is_empty());
    }
}
