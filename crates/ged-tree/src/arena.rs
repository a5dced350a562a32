use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::{Index, IndexMut},
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_STAMP: AtomicU32 = AtomicU32::new(1);

/// A type-safe identifier for elements stored in an [`Arena`].
///
/// Every id carries the stamp of the arena that issued it, so an id handed out
/// by one arena never resolves in another one, even after the issuing arena
/// has been dropped.
pub struct ArenaId<T> {
    stamp: u32,
    id: u32,
    _phantom_data: PhantomData<T>,
}

impl<T> fmt::Debug for ArenaId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaId({}:{})", self.stamp, self.id)
    }
}

impl<T> PartialEq for ArenaId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.stamp == other.stamp && self.id == other.id
    }
}

impl<T> Eq for ArenaId<T> {}

impl<T> Hash for ArenaId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stamp.hash(state);
        self.id.hash(state);
    }
}

impl<T> Copy for ArenaId<T> {}

impl<T> Clone for ArenaId<T> {
    #[inline(always)]
    fn clone(&self) -> ArenaId<T> {
        *self
    }
}

impl<T> ArenaId<T> {
    const fn new(stamp: u32, id: u32) -> ArenaId<T> {
        Self {
            stamp,
            id,
            _phantom_data: PhantomData,
        }
    }
}

/// Append-only storage handing out stamped [`ArenaId`]s.
///
/// Elements are never removed, so an id stays valid for the lifetime of the
/// arena that issued it.
#[derive(Debug)]
pub struct Arena<T> {
    stamp: u32,
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T> Arena<T> {
    /// Creates a new arena with the specified initial capacity.
    pub fn new(size: usize) -> Self {
        Arena {
            stamp: NEXT_STAMP.fetch_add(1, Ordering::Relaxed),
            items: Vec::with_capacity(size),
        }
    }

    /// Allocates a value in the arena and returns its identifier.
    pub fn alloc(&mut self, value: T) -> ArenaId<T> {
        let arena_id = self.items.len() as u32;
        self.items.push(value);
        ArenaId::new(self.stamp, arena_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `id` was issued by this arena.
    pub fn owns(&self, id: ArenaId<T>) -> bool {
        id.stamp == self.stamp && (id.id as usize) < self.items.len()
    }

    /// Returns the element for `id`, or `None` if it belongs to another arena.
    pub fn get(&self, id: ArenaId<T>) -> Option<&T> {
        if id.stamp != self.stamp {
            return None;
        }
        self.items.get(id.id as usize)
    }
}

impl<T> Index<ArenaId<T>> for Arena<T> {
    type Output = T;

    fn index(&self, index: ArenaId<T>) -> &Self::Output {
        debug_assert_eq!(index.stamp, self.stamp, "id issued by another arena");
        &self.items[index.id as usize]
    }
}

impl<T> IndexMut<ArenaId<T>> for Arena<T> {
    fn index_mut(&mut self, index: ArenaId<T>) -> &mut Self::Output {
        debug_assert_eq!(index.stamp, self.stamp, "id issued by another arena");
        &mut self.items[index.id as usize]
    }
}
