//! Main cache: segmented LRU with probation and protected segments.
//!
//! ```text
//!   window evictee ──admit──► PROBATION (MRU ... LRU=victim)
//!                                  │ hit
//!                                  ▼
//!                             PROTECTED (MRU ... LRU) ──full──► demote to probation MRU
//! ```
//!
//! Entrants always land in probation. A hit in probation earns residency in
//! protected; when protected is full its LRU is demoted back to probation.
//! The probation LRU is the eviction victim the admission policy compares
//! against.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{SlotArena, SlotId};

use super::item::{Entry, Node, Segment};
use super::list::SegmentList;

/// What a main-cache hit did to segment membership.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum MainAccess {
    /// Moved to the MRU end of its own segment.
    Refreshed,
    /// Moved from probation to protected.
    Promoted,
    /// Promoted, and the protected LRU was demoted into probation.
    PromotedWithDemotion,
}

#[derive(Debug)]
pub(crate) struct MainCache {
    probation: SegmentList,
    protected: SegmentList,
    probation_cap: usize,
    protected_cap: usize,
}

impl MainCache {
    pub(crate) fn new(probation_cap: usize, protected_cap: usize) -> Self {
        Self {
            probation: SegmentList::new(Segment::Probation),
            protected: SegmentList::new(Segment::Protected),
            probation_cap,
            protected_cap,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.probation_cap + self.protected_cap
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.probation.len() + self.protected.len()
    }

    #[inline]
    pub(crate) fn probation(&self) -> &SegmentList {
        &self.probation
    }

    #[inline]
    pub(crate) fn protected(&self) -> &SegmentList {
        &self.protected
    }

    #[inline]
    pub(crate) fn probation_capacity(&self) -> usize {
        self.probation_cap
    }

    #[inline]
    pub(crate) fn protected_capacity(&self) -> usize {
        self.protected_cap
    }

    /// Records a hit on `id`, which must be linked into probation or protected.
    pub(crate) fn get<K, V>(
        &mut self,
        arena: &mut SlotArena<Node<K, V>>,
        id: SlotId,
    ) -> MainAccess {
        let segment = arena.get(id).expect("main get: stale SlotId").segment;
        match segment {
            Segment::Protected => {
                self.protected.move_to_front(arena, id);
                MainAccess::Refreshed
            },
            Segment::Probation if self.protected_cap == 0 => {
                self.probation.move_to_front(arena, id);
                MainAccess::Refreshed
            },
            Segment::Probation => {
                self.probation.unlink(arena, id);
                let mut access = MainAccess::Promoted;
                if self.protected.len() >= self.protected_cap {
                    if let Some(demoted) = self.protected.tail() {
                        self.protected.unlink(arena, demoted);
                        self.probation.push_front(arena, demoted);
                        access = MainAccess::PromotedWithDemotion;
                    }
                }
                self.protected.push_front(arena, id);
                access
            },
            Segment::Window => {
                debug_assert!(false, "window node passed to main cache");
                MainAccess::Refreshed
            },
        }
    }

    /// Inserts `entry` at the MRU end of probation and registers it in `map`.
    ///
    /// When the main cache is full, the probation LRU slot (the victim) is
    /// overwritten in place and its entry is returned.
    pub(crate) fn add<K, V>(
        &mut self,
        arena: &mut SlotArena<Node<K, V>>,
        map: &mut FxHashMap<K, SlotId>,
        entry: Entry<K, V>,
    ) -> Option<Entry<K, V>>
    where
        K: Clone + Eq + Hash,
    {
        match self.probation.tail() {
            Some(victim) if self.len() >= self.capacity() => {
                let (old, key) = {
                    let node = arena.get_mut(victim).expect("probation tail out of sync");
                    let old = std::mem::replace(&mut node.entry, entry);
                    (old, node.entry.key.clone())
                };
                map.remove(&old.key);
                map.insert(key, victim);
                self.probation.move_to_front(arena, victim);
                Some(old)
            },
            _ => {
                let key = entry.key.clone();
                let id = arena.insert(Node::detached(entry, Segment::Probation));
                map.insert(key, id);
                self.probation.push_front(arena, id);
                None
            },
        }
    }

    /// Returns the next eviction candidate, or `None` while there is spare room.
    #[inline]
    pub(crate) fn victim(&self) -> Option<SlotId> {
        if self.len() < self.capacity() {
            return None;
        }
        self.probation.tail()
    }

    /// Unlinks `id` from whichever segment holds it.
    pub(crate) fn remove<K, V>(&mut self, arena: &mut SlotArena<Node<K, V>>, id: SlotId) {
        match arena.get(id).map(|node| node.segment) {
            Some(Segment::Probation) => self.probation.unlink(arena, id),
            Some(Segment::Protected) => self.protected.unlink(arena, id),
            _ => debug_assert!(false, "main remove: {:?} not in main cache", id),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.probation.clear();
        self.protected.clear();
    }
}
