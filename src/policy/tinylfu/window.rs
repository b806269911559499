//! Window cache: the small LRU every new key enters first.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{SlotArena, SlotId};

use super::item::{Entry, Node, Segment};
use super::list::SegmentList;

#[derive(Debug)]
pub(crate) struct WindowCache {
    list: SegmentList,
    capacity: usize,
}

impl WindowCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            list: SegmentList::new(Segment::Window),
            capacity,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn list(&self) -> &SegmentList {
        &self.list
    }

    /// Marks `id` as most recently used.
    #[inline]
    pub(crate) fn get<K, V>(&mut self, arena: &mut SlotArena<Node<K, V>>, id: SlotId) {
        self.list.move_to_front(arena, id);
    }

    /// Inserts `entry` at the MRU end and registers it in `map`.
    ///
    /// When the window is full, the LRU slot is overwritten in place with the
    /// new entry and the displaced entry is returned by value.
    pub(crate) fn add<K, V>(
        &mut self,
        arena: &mut SlotArena<Node<K, V>>,
        map: &mut FxHashMap<K, SlotId>,
        entry: Entry<K, V>,
    ) -> Option<Entry<K, V>>
    where
        K: Clone + Eq + Hash,
    {
        match self.list.tail() {
            Some(tail) if self.list.len() >= self.capacity => {
                let (old, key) = {
                    let node = arena.get_mut(tail).expect("window tail out of sync");
                    let old = std::mem::replace(&mut node.entry, entry);
                    (old, node.entry.key.clone())
                };
                map.remove(&old.key);
                map.insert(key, tail);
                self.list.move_to_front(arena, tail);
                Some(old)
            },
            _ => {
                let key = entry.key.clone();
                let id = arena.insert(Node::detached(entry, Segment::Window));
                map.insert(key, id);
                self.list.push_front(arena, id);
                None
            },
        }
    }

    pub(crate) fn remove<K, V>(&mut self, arena: &mut SlotArena<Node<K, V>>, id: SlotId) {
        self.list.unlink(arena, id);
    }

    pub(crate) fn clear(&mut self) {
        self.list.clear();
    }
}
