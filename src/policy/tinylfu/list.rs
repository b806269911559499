//! Index-linked LRU list over the shared slot arena.
//!
//! The window, probation and protected segments are each a `SegmentList`.
//! A list owns no storage: it only tracks `head`/`tail`/`len` and rewrites the
//! `prev`/`next` links of nodes that live in the cache's single
//! [`SlotArena`]. Head is MRU, tail is LRU.

use crate::ds::{SlotArena, SlotId};

use super::item::{Node, Segment};

#[derive(Debug)]
pub(crate) struct SegmentList {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
    segment: Segment,
}

impl SegmentList {
    pub(crate) fn new(segment: Segment) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            segment,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Least recently used node.
    #[inline]
    pub(crate) fn tail(&self) -> Option<SlotId> {
        self.tail
    }

    /// Links `id` at the MRU end and tags it with this list's segment.
    ///
    /// `id` must not currently be linked into any list.
    pub(crate) fn push_front<K, V>(&mut self, arena: &mut SlotArena<Node<K, V>>, id: SlotId) {
        {
            let node = arena.get_mut(id).expect("push_front: stale SlotId");
            node.prev = None;
            node.next = self.head;
            node.segment = self.segment;
        }

        match self.head {
            Some(old_head) => {
                arena.get_mut(old_head).expect("list head out of sync").prev = Some(id);
            },
            None => self.tail = Some(id),
        }

        self.head = Some(id);
        self.len += 1;
    }

    /// Unlinks `id` from this list, leaving it in the arena.
    pub(crate) fn unlink<K, V>(&mut self, arena: &mut SlotArena<Node<K, V>>, id: SlotId) {
        let (prev, next) = {
            let node = arena.get_mut(id).expect("unlink: stale SlotId");
            debug_assert_eq!(node.segment, self.segment);
            (node.prev.take(), node.next.take())
        };

        match prev {
            Some(p) => arena.get_mut(p).expect("prev link out of sync").next = next,
            None => self.head = next,
        }

        match next {
            Some(n) => arena.get_mut(n).expect("next link out of sync").prev = prev,
            None => self.tail = prev,
        }

        self.len -= 1;
    }

    /// Moves a node already in this list to the MRU end.
    pub(crate) fn move_to_front<K, V>(&mut self, arena: &mut SlotArena<Node<K, V>>, id: SlotId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(arena, id);
        self.push_front(arena, id);
    }

    pub(crate) fn clear(&mut self) {
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Walks the list head to tail, verifying links and segment tags.
    ///
    /// Returns the keys in MRU-to-LRU order.
    #[cfg(debug_assertions)]
    pub(crate) fn walk<'a, K, V>(
        &self,
        arena: &'a SlotArena<Node<K, V>>,
    ) -> Result<Vec<&'a K>, crate::error::InvariantError>
    where
        K: std::fmt::Debug,
    {
        use crate::error::InvariantError;

        let mut keys = Vec::with_capacity(self.len);
        let mut current = self.head;
        let mut prev: Option<SlotId> = None;

        while let Some(id) = current {
            if keys.len() >= self.len {
                return Err(InvariantError::new(format!(
                    "{:?} list: more nodes than len {} (cycle?)",
                    self.segment, self.len
                )));
            }
            let node = arena.get(id).ok_or_else(|| {
                InvariantError::new(format!("{:?} list: stale SlotId {:?}", self.segment, id))
            })?;
            if node.segment != self.segment {
                return Err(InvariantError::new(format!(
                    "node {:?} in {:?} list is tagged {:?}",
                    node.entry.key, self.segment, node.segment
                )));
            }
            if node.prev != prev {
                return Err(InvariantError::new(format!(
                    "{:?} list: node {:?} prev pointer inconsistent",
                    self.segment, node.entry.key
                )));
            }
            keys.push(&node.entry.key);
            prev = Some(id);
            current = node.next;
        }

        if keys.len() != self.len {
            return Err(InvariantError::new(format!(
                "{:?} list: counted {} but len = {}",
                self.segment,
                keys.len(),
                self.len
            )));
        }
        if self.tail != prev {
            return Err(InvariantError::new(format!(
                "{:?} list: tail does not match last node",
                self.segment
            )));
        }

        Ok(keys)
    }
}
