use std::fmt;

use crate::error::{FilterError, FilterResult};

/// Stable handle to a node in a filter chain.
///
/// Handles are never reused within a chain, so a handle to a disposed node
/// stays invalid instead of aliasing a newer node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

struct Slot<F: ?Sized> {
    /// `None` while the filter is checked out for a call.
    filter: Option<Box<F>>,
    next: Option<NodeId>,
    prev: Option<NodeId>,
}

/// Arena of doubly linked filter nodes.
///
/// `next` points in the direction data is requested (pull) or delivered
/// (push); `prev` is the back-reference. `a.next == Some(b)` holds exactly
/// when `b.prev == Some(a)`.
pub(crate) struct Links<F: ?Sized> {
    slots: Vec<Option<Slot<F>>>,
}

impl<F: ?Sized> Links<F> {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub(crate) fn insert(&mut self, filter: Box<F>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Some(Slot {
            filter: Some(filter),
            next: None,
            prev: None,
        }));
        id
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn next(&self, id: NodeId) -> FilterResult<Option<NodeId>> {
        Ok(self.slot(id)?.next)
    }

    pub(crate) fn prev(&self, id: NodeId) -> FilterResult<Option<NodeId>> {
        Ok(self.slot(id)?.prev)
    }

    /// First node of the list containing `id`.
    pub(crate) fn head(&self, id: NodeId) -> FilterResult<NodeId> {
        let mut cur = id;
        while let Some(prev) = self.slot(cur)?.prev {
            cur = prev;
        }
        Ok(cur)
    }

    /// Check that `from.next = to` keeps the list shape.
    pub(crate) fn check_link(&self, from: NodeId, to: NodeId) -> FilterResult<()> {
        self.slot(from)?;
        self.slot(to)?;
        if from == to {
            return Err(FilterError::InvalidLink {
                from,
                to,
                reason: "a node cannot feed itself",
            });
        }
        let mut cur = Some(to);
        while let Some(id) = cur {
            if id == from {
                return Err(FilterError::InvalidLink {
                    from,
                    to,
                    reason: "link would form a cycle",
                });
            }
            cur = self.slot(id)?.next;
        }
        Ok(())
    }

    /// Cut the forward link of `id`, clearing the neighbour's back-reference.
    pub(crate) fn detach_next(&mut self, id: NodeId) -> FilterResult<Option<NodeId>> {
        let next = self.slot_mut(id)?.next.take();
        if let Some(n) = next {
            self.slot_mut(n)?.prev = None;
        }
        Ok(next)
    }

    /// Cut the back-reference of `id`, clearing the neighbour's forward link.
    pub(crate) fn detach_prev(&mut self, id: NodeId) -> FilterResult<Option<NodeId>> {
        let prev = self.slot_mut(id)?.prev.take();
        if let Some(p) = prev {
            self.slot_mut(p)?.next = None;
        }
        Ok(prev)
    }

    /// Establish `from.next = to`. Both sides must already be detached.
    pub(crate) fn attach(&mut self, from: NodeId, to: NodeId) -> FilterResult<()> {
        debug_assert!(self.slot(from)?.next.is_none());
        debug_assert!(self.slot(to)?.prev.is_none());
        self.slot_mut(from)?.next = Some(to);
        self.slot_mut(to)?.prev = Some(from);
        Ok(())
    }

    /// Take the filter out for a call; returns it with its forward link.
    pub(crate) fn checkout(&mut self, id: NodeId) -> FilterResult<(Box<F>, Option<NodeId>)> {
        let slot = self.slot_mut(id)?;
        let filter = slot.filter.take().ok_or(FilterError::Reentrant(id))?;
        Ok((filter, slot.next))
    }

    pub(crate) fn checkin(&mut self, id: NodeId, filter: Box<F>) {
        if let Some(Some(slot)) = self.slots.get_mut(id.0) {
            slot.filter = Some(filter);
        }
    }

    pub(crate) fn filter(&self, id: NodeId) -> Option<&F> {
        self.slot(id).ok()?.filter.as_deref()
    }

    pub(crate) fn filter_mut(&mut self, id: NodeId) -> Option<&mut F> {
        self.slot_mut(id).ok()?.filter.as_deref_mut()
    }

    /// Tear down the whole list containing `id`.
    ///
    /// The node is spliced out first, then each old neighbour is disposed in
    /// turn. Removing the slot before recursing clears every back-reference
    /// into it, so the recursion always terminates.
    pub(crate) fn dispose(&mut self, id: NodeId, removed: &mut Vec<Box<F>>) {
        let Some(slot) = self.slots.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        let (prev, next) = (slot.prev, slot.next);
        if let Some(Some(p)) = prev.and_then(|p| self.slots.get_mut(p.0)) {
            p.next = next;
        }
        if let Some(Some(n)) = next.and_then(|n| self.slots.get_mut(n.0)) {
            n.prev = prev;
        }
        removed.extend(slot.filter);

        if let Some(p) = prev {
            self.dispose(p, removed);
        }
        if let Some(n) = next {
            self.dispose(n, removed);
        }
    }

    fn slot(&self, id: NodeId) -> FilterResult<&Slot<F>> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(FilterError::UnknownNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> FilterResult<&mut Slot<F>> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(FilterError::UnknownNode(id))
    }
}
