//! Recency Queue Module
//!
//! Slot arena holding every live entry, threaded into a doubly linked list
//! ordered from most recently used (head) to least recently used (tail).

use std::ops::{Index, IndexMut};

use crate::cache::{CacheEntry, SlotId};

// == Recency Queue ==
/// Arena-backed recency queue.
///
/// Entries link to each other through [`SlotId`] handles, so unlink and
/// relink are O(1) without shared ownership. Freed slots are reused by later
/// insertions.
#[derive(Debug)]
pub struct RecencyQueue<K, V> {
    slots: Vec<Option<CacheEntry<K, V>>>,
    free_list: Vec<usize>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl<K, V> RecencyQueue<K, V> {
    // == Constructor ==
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Stores `entry` and links it at the head.
    pub fn push_front(&mut self, mut entry: CacheEntry<K, V>) -> SlotId {
        entry.prev = None;
        entry.next = None;

        let id = match self.free_list.pop() {
            Some(idx) => {
                self.slots[idx] = Some(entry);
                SlotId(idx)
            }
            None => {
                self.slots.push(Some(entry));
                SlotId(self.slots.len() - 1)
            }
        };
        self.len += 1;
        self.link_front(id);
        id
    }

    // == Move To Front ==
    /// Relinks an existing entry at the head, keeping everyone else in order.
    pub fn move_to_front(&mut self, id: SlotId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(id);
        self.link_front(id);
    }

    // == Remove ==
    /// Unlinks and frees the entry behind `id`.
    pub fn remove(&mut self, id: SlotId) -> Option<CacheEntry<K, V>> {
        self.slots.get(id.0)?.as_ref()?;
        self.unlink(id);
        let entry = self.slots[id.0].take()?;
        self.free_list.push(id.0);
        self.len -= 1;
        Some(entry)
    }

    // == Pop Back ==
    /// Removes and returns the least recently used entry.
    pub fn pop_back(&mut self) -> Option<CacheEntry<K, V>> {
        let tail = self.tail?;
        self.remove(tail)
    }

    // == Accessors ==
    pub fn get(&self, id: SlotId) -> Option<&CacheEntry<K, V>> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut CacheEntry<K, V>> {
        self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    pub fn head(&self) -> Option<SlotId> {
        self.head
    }

    pub fn tail(&self) -> Option<SlotId> {
        self.tail
    }

    /// Neighbour of `id` towards the head.
    pub fn prev(&self, id: SlotId) -> Option<SlotId> {
        self.get(id).and_then(|entry| entry.prev)
    }

    /// Neighbour of `id` towards the tail.
    pub fn next(&self, id: SlotId) -> Option<SlotId> {
        self.get(id).and_then(|entry| entry.next)
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    // == Iteration ==
    /// Walks entries from head (MRU) to tail (LRU).
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            queue: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    fn link_front(&mut self, id: SlotId) {
        let old_head = self.head;
        if let Some(entry) = self.get_mut(id) {
            entry.prev = None;
            entry.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(entry) = self.get_mut(h) {
                    entry.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    fn unlink(&mut self, id: SlotId) {
        let (prev, next) = match self.get_mut(id) {
            Some(entry) => (entry.prev.take(), entry.next.take()),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(entry) = self.get_mut(p) {
                    entry.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(entry) = self.get_mut(n) {
                    entry.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}

impl<K, V> Default for RecencyQueue<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// Handles come from the cache's own table, so a stale one is a logic error.
impl<K, V> Index<SlotId> for RecencyQueue<K, V> {
    type Output = CacheEntry<K, V>;

    fn index(&self, id: SlotId) -> &Self::Output {
        match self.get(id) {
            Some(entry) => entry,
            None => panic!("stale slot handle {}", id.0),
        }
    }
}

impl<K, V> IndexMut<SlotId> for RecencyQueue<K, V> {
    fn index_mut(&mut self, id: SlotId) -> &mut Self::Output {
        match self.get_mut(id) {
            Some(entry) => entry,
            None => panic!("stale slot handle {}", id.0),
        }
    }
}

// == Iterator ==
/// Borrowing MRU-to-LRU iterator over a [`RecencyQueue`].
pub struct Iter<'a, K, V> {
    queue: &'a RecencyQueue<K, V>,
    cursor: Option<SlotId>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        // bounded by len so a corrupted link cannot loop forever
        if self.remaining == 0 {
            return None;
        }
        let entry = self.queue.get(self.cursor?)?;
        self.cursor = entry.next;
        self.remaining -= 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
