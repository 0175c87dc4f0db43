//! Slab arena for timer nodes.
//!
//! Nodes are fixed-size and linked into per-bucket FIFO lists by index. Freed
//! slots go on an intrusive free list and are reused before the arena grows,
//! so a warmed-up wheel schedules without touching the allocator.

use core::num::NonZeroUsize;

use crate::runtime::timing::tick::TickInstant;
use crate::runtime::timing::wheel::TimerEvent;

/// Index of a node in the arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeIndex(u32);

impl From<NodeIndex> for usize {
    #[inline]
    fn from(idx: NodeIndex) -> Self {
        idx.0 as Self
    }
}

/// A scheduled timer.
#[derive(Debug)]
pub struct Node {
    pub event: TimerEvent,
    pub expire: TickInstant,
    /// Next node in the same bucket.
    pub next: Option<NodeIndex>,
}

#[derive(Debug)]
enum Entry {
    Occupied(Node),
    Free { next: Option<NodeIndex> },
}

/// Growable arena with a free list.
#[derive(Debug)]
pub struct Slab {
    entries: Vec<Entry>,
    free_head: Option<NodeIndex>,
    len: usize,
}

impl Slab {
    /// Creates an arena with `cap` free slots.
    ///
    /// # Panics
    ///
    /// Panics if `cap` exceeds `u32::MAX`.
    #[must_use]
    pub fn with_capacity(cap: NonZeroUsize) -> Self {
        let capacity = cap.get();
        assert!(
            u32::try_from(capacity).is_ok(),
            "slab capacity must fit in u32"
        );
        let entries = (0..capacity)
            .map(|i| Entry::Free {
                next: (i + 1 < capacity).then(|| NodeIndex((i + 1) as u32)),
            })
            .collect();
        Self {
            entries,
            free_head: Some(NodeIndex(0)),
            len: 0,
        }
    }

    /// Stores a node, reusing a free slot when one exists.
    pub fn insert(&mut self, event: TimerEvent, expire: TickInstant) -> NodeIndex {
        let node = Node {
            event,
            expire,
            next: None,
        };
        self.len += 1;
        match self.free_head {
            Some(idx) => {
                let slot = &mut self.entries[usize::from(idx)];
                self.free_head = match slot {
                    Entry::Free { next } => *next,
                    Entry::Occupied(_) => unreachable!("free list points at an occupied slot"),
                };
                *slot = Entry::Occupied(node);
                idx
            }
            None => {
                let idx = NodeIndex(
                    u32::try_from(self.entries.len()).expect("more than u32::MAX pending timers"),
                );
                self.entries.push(Entry::Occupied(node));
                idx
            }
        }
    }

    /// Removes a node and returns it; its slot goes back on the free list.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not occupied. Bucket lists only ever hold live
    /// indices, so this would mean the wheel's bookkeeping is broken.
    pub fn remove(&mut self, idx: NodeIndex) -> Node {
        let slot = &mut self.entries[usize::from(idx)];
        let entry = core::mem::replace(
            slot,
            Entry::Free {
                next: self.free_head,
            },
        );
        let Entry::Occupied(node) = entry else {
            unreachable!("removing a free slab slot");
        };
        self.free_head = Some(idx);
        self.len -= 1;
        node
    }

    #[must_use]
    pub fn get(&self, idx: NodeIndex) -> Option<&Node> {
        match &self.entries[usize::from(idx)] {
            Entry::Occupied(n) => Some(n),
            Entry::Free { .. } => None,
        }
    }

    pub fn get_mut(&mut self, idx: NodeIndex) -> Option<&mut Node> {
        match &mut self.entries[usize::from(idx)] {
            Entry::Occupied(n) => Some(n),
            Entry::Free { .. } => None,
        }
    }

    /// Occupied nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actor::{ActorHandle, Session};

    fn event(n: u32) -> TimerEvent {
        TimerEvent {
            target: ActorHandle::new(n),
            session: Session::new(n as i32),
        }
    }

    fn slab(cap: usize) -> Slab {
        Slab::with_capacity(NonZeroUsize::new(cap).unwrap())
    }

    #[test]
    fn freed_slots_are_reused_before_growing() {
        let mut s = slab(2);
        let a = s.insert(event(1), TickInstant::new(1));
        let _b = s.insert(event(2), TickInstant::new(2));
        assert_eq!(s.entries.len(), 2);

        let node = s.remove(a);
        assert_eq!(node.event, event(1));
        let c = s.insert(event(3), TickInstant::new(3));
        assert_eq!(c, a, "free slot should be recycled");
        assert_eq!(s.entries.len(), 2);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn grows_when_exhausted() {
        let mut s = slab(1);
        let _ = s.insert(event(1), TickInstant::new(1));
        let b = s.insert(event(2), TickInstant::new(1));
        assert_eq!(usize::from(b), 1);
        assert_eq!(s.entries.len(), 2);
        assert_eq!(s.get(b).map(|n| n.event), Some(event(2)));
    }

    #[test]
    fn removed_slot_reads_as_empty() {
        let mut s = slab(4);
        let a = s.insert(event(1), TickInstant::new(9));
        let _ = s.remove(a);
        assert!(s.get(a).is_none());
        assert_eq!(s.len(), 0);
    }
}
