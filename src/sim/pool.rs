//! Fixed-capacity object pool
//!
//! Slots live in one arena; idle slots are tracked by a free list of
//! indices. `obtain` hands out a [`Handle`], `release` takes it back by
//! value. Handles are neither `Clone` nor `Copy`, so a handle can be held by
//! exactly one owner and cannot be released twice.

use std::fmt;
use std::marker::PhantomData;

/// Objects that can return to a canonical empty state before reuse
pub trait Reset {
    fn reset(&mut self);
}

/// Exclusive claim on one pool slot
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Slot index (stable while the handle is checked out)
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.index).finish()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

/// Arena of reusable objects
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<T>,
    /// Idle slot indices; popped from the back
    free: Vec<u32>,
}

impl<T: Reset + Default> Pool<T> {
    /// Pre-allocate `capacity` idle objects
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| T::default()).collect();
        // Reverse so the first obtain hands out slot 0
        let free = (0..capacity as u32).rev().collect();
        Self { slots, free }
    }

    /// Check out an idle object, `None` when the arena is exhausted
    pub fn obtain(&mut self) -> Option<Handle<T>> {
        let index = self.free.pop()?;
        Some(Handle {
            index,
            _marker: PhantomData,
        })
    }

    /// Reset the object and return its slot to the free list
    pub fn release(&mut self, handle: Handle<T>) {
        self.slots[handle.index()].reset();
        self.free.push(handle.index);
    }

    pub fn get(&self, handle: &Handle<T>) -> &T {
        &self.slots[handle.index()]
    }

    pub fn get_mut(&mut self, handle: &Handle<T>) -> &mut T {
        &mut self.slots[handle.index()]
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Objects waiting in the free list
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    /// Objects currently held by handles
    pub fn checked_out(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Default, PartialEq)]
    struct Token {
        value: u32,
    }

    impl Reset for Token {
        fn reset(&mut self) {
            self.value = 0;
        }
    }

    #[test]
    fn test_obtain_until_exhausted() {
        let mut pool: Pool<Token> = Pool::with_capacity(2);
        let a = pool.obtain().unwrap();
        let b = pool.obtain().unwrap();
        assert_ne!(a, b);
        assert!(pool.obtain().is_none());
        assert_eq!(pool.checked_out(), 2);
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_release_resets_object() {
        let mut pool: Pool<Token> = Pool::with_capacity(1);
        let h = pool.obtain().unwrap();
        pool.get_mut(&h).value = 17;
        assert_eq!(pool.get(&h).value, 17);
        pool.release(h);

        let h = pool.obtain().unwrap();
        assert_eq!(pool.get(&h), &Token::default());
    }

    #[test]
    fn test_released_slot_is_reused() {
        let mut pool: Pool<Token> = Pool::with_capacity(4);
        let first = pool.obtain().unwrap();
        let index = first.index();
        pool.release(first);
        let again = pool.obtain().unwrap();
        assert_eq!(again.index(), index);
    }

    proptest! {
        #[test]
        fn prop_checked_out_plus_idle_is_constant(ops in prop::collection::vec(any::<bool>(), 0..200)) {
            let mut pool: Pool<Token> = Pool::with_capacity(16);
            let mut held = Vec::new();
            for obtain in ops {
                if obtain {
                    if let Some(h) = pool.obtain() {
                        held.push(h);
                    }
                } else if let Some(h) = held.pop() {
                    pool.release(h);
                }
                prop_assert_eq!(pool.checked_out() + pool.idle(), pool.capacity());
                prop_assert_eq!(pool.checked_out(), held.len());
            }
        }
    }
}
