// Grounded on the reference C implementation's `Fiber_List` (`push`/`pop`/
// linear `fiber_join` walk) and on design note §9 ("encode as an arena plus
// integer indices, not as owning pointers").

//! The fiber ring: an arena of [`Fcb`]s plus the circular-list bookkeeping
//! (`head`/`tail`/`running`) described in §3/§4.2.

use crate::fcb::{Fcb, FiberId};

/// The circular list of all live fiber control blocks, realized as an arena
/// addressed by generation-counted index so the structure stays free of
/// owning pointers despite being inherently cyclic.
pub(crate) struct Ring {
    slots: Vec<Option<Fcb>>,
    generation: Vec<u64>,
    free: Vec<usize>,
    pub(crate) head: usize,
    pub(crate) tail: usize,
    pub(crate) running: usize,
    pub(crate) size: usize,
}

impl Ring {
    /// Bootstrap a ring containing only `main`, linked to itself.
    pub(crate) fn new(mut main: Fcb) -> Ring {
        main.next = 0;
        Ring {
            slots: vec![Some(main)],
            generation: vec![0],
            free: Vec::new(),
            head: 0,
            tail: 0,
            running: 0,
            size: 1,
        }
    }

    fn insert(&mut self, fcb: Fcb) -> usize {
        if let Some(index) = self.free.pop() {
            self.slots[index] = Some(fcb);
            index
        } else {
            let index = self.slots.len();
            self.slots.push(Some(fcb));
            self.generation.push(0);
            index
        }
    }

    /// Append `fcb` after `tail`: `tail` becomes `fcb`, and `fcb.next`
    /// becomes `head` (§4.2).
    pub(crate) fn append(&mut self, mut fcb: Fcb) -> FiberId {
        fcb.next = self.head;
        let index = self.insert(fcb);
        self.fcb_mut_raw(self.tail).next = index;
        self.tail = index;
        self.size += 1;
        FiberId {
            index,
            generation: self.generation[index],
        }
    }

    /// Resolve `id` to a live arena index, rejecting ids whose generation
    /// has moved on (the slot exists but holds a different fiber now) or
    /// that never existed.
    pub(crate) fn locate(&self, id: FiberId) -> Option<usize> {
        if id.index >= self.slots.len() {
            return None;
        }
        if self.generation[id.index] != id.generation {
            return None;
        }
        self.slots[id.index].as_ref()?;
        Some(id.index)
    }

    pub(crate) fn fcb(&self, index: usize) -> &Fcb {
        self.slots[index]
            .as_ref()
            .expect("ring index must name a live slot")
    }

    pub(crate) fn fcb_mut(&mut self, index: usize) -> &mut Fcb {
        self.slots[index]
            .as_mut()
            .expect("ring index must name a live slot")
    }

    fn fcb_mut_raw(&mut self, index: usize) -> &mut Fcb {
        self.fcb_mut(index)
    }

    pub(crate) fn id_of(&self, index: usize) -> FiberId {
        FiberId {
            index,
            generation: self.generation[index],
        }
    }

    /// Unlink a `Finished` fiber from the ring, releasing its control block
    /// and stack, and return its former successor (the scheduler's cursor
    /// advance, §4.2).
    ///
    /// # Panics
    ///
    /// If `index` does not name a `Finished` slot — callers (the scheduler)
    /// are expected to have checked this already.
    pub(crate) fn unlink(&mut self, index: usize) -> usize {
        assert!(
            self.fcb(index).is_finished(),
            "unlink precondition: fiber must be Finished"
        );

        let next = self.fcb(index).next;

        let mut predecessor = self.head;
        while self.fcb(predecessor).next != index {
            predecessor = self.fcb(predecessor).next;
        }
        self.fcb_mut(predecessor).next = next;

        if self.head == index {
            self.head = next;
        }
        if self.tail == index {
            self.tail = predecessor;
        }

        // Dropping the slot's Fcb drops its Stack (munmap) and its boxed
        // outcome, if any.
        self.slots[index] = None;
        self.generation[index] += 1;
        self.free.push(index);
        self.size -= 1;

        next
    }

    /// Force-free every remaining slot without attempting a context switch.
    ///
    /// Used only when the owning thread-local `Runtime` itself is being
    /// torn down (thread exit) — by that point nothing will ever resume a
    /// suspended fiber again, so the only correct action is to release the
    /// memory, not to pretend the ring can keep scheduling.
    pub(crate) fn drain_unconditionally(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.size = 0;
    }
}
