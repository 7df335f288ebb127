use tracing::debug;

use crate::error::FilterResult;
use crate::links::{Links, NodeId};
use crate::AsAny;

/// A node of a push chain.
pub trait PushFilter: AsAny {
    /// Consume `data`, forwarding transformed bytes downstream.
    ///
    /// Returns the number of input bytes consumed. The default
    /// implementation forwards `data` unchanged.
    fn put(&mut self, downstream: &mut Downstream<'_>, data: &[u8]) -> FilterResult<usize> {
        downstream.put(data)
    }

    /// Emit any buffered state, then flush downstream.
    fn flush(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
        downstream.flush()
    }

    /// Final flush at the end of the stream.
    ///
    /// While ending, [`Downstream::flush`] ends the downstream node, so the
    /// default simply flushes.
    fn end(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
        self.flush(downstream)
    }
}

/// A filter's view of the node it pushes into.
pub struct Downstream<'a> {
    chain: &'a mut PushChain,
    node: Option<NodeId>,
    /// Set while the chain is being ended rather than flushed.
    ending: bool,
}

impl Downstream<'_> {
    /// Push into the downstream node; with none, everything is consumed.
    pub fn put(&mut self, data: &[u8]) -> FilterResult<usize> {
        match self.node {
            Some(id) if !data.is_empty() => self.chain.put(id, data),
            _ => Ok(data.len()),
        }
    }

    /// Flush (or, while ending, end) the downstream node; 0 if there is none.
    pub fn flush(&mut self) -> FilterResult<usize> {
        match self.node {
            Some(id) if self.ending => self.chain.end(id),
            Some(id) => self.chain.flush(id),
            None => Ok(0),
        }
    }

    /// End the downstream node; 0 if there is none.
    pub fn end(&mut self) -> FilterResult<usize> {
        match self.node {
            Some(id) => self.chain.end(id),
            None => Ok(0),
        }
    }

    /// Whether a downstream node is linked.
    pub fn is_linked(&self) -> bool {
        self.node.is_some()
    }
}

/// Arena of push filters.
///
/// Nodes are added with [`PushChain::add`] and wired producer-to-sink with
/// [`PushChain::link`]. Putting into any node pushes through every node
/// downstream of it.
pub struct PushChain {
    links: Links<dyn PushFilter>,
}

impl PushChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            links: Links::new(),
        }
    }

    /// Add an unlinked node.
    pub fn add(&mut self, filter: impl PushFilter) -> NodeId {
        self.links.insert(Box::new(filter))
    }

    /// Add an unlinked, already boxed node.
    pub fn add_boxed(&mut self, filter: Box<dyn PushFilter>) -> NodeId {
        self.links.insert(filter)
    }

    /// Make `producer` push into `sink`.
    ///
    /// An existing downstream link of `producer` and an existing producer of
    /// `sink` are each flushed and then detached before the new link is made.
    pub fn link(&mut self, producer: NodeId, sink: NodeId) -> FilterResult<()> {
        if self.links.next(producer)? == Some(sink) {
            return Ok(());
        }
        self.links.check_link(producer, sink)?;
        if self.links.next(producer)?.is_some() {
            self.flush(producer)?;
            self.links.detach_next(producer)?;
        }
        if let Some(old) = self.links.prev(sink)? {
            self.flush(old)?;
            self.links.detach_next(old)?;
        }
        self.links.attach(producer, sink)?;
        debug!(%producer, %sink, "push link");
        Ok(())
    }

    /// Link `nodes` in order, each pushing into the one after it.
    ///
    /// Returns the head (the first node).
    pub fn link_all(&mut self, nodes: &[NodeId]) -> FilterResult<Option<NodeId>> {
        for pair in nodes.windows(2) {
            self.link(pair[0], pair[1])?;
        }
        Ok(nodes.first().copied())
    }

    /// Flush `node` and detach it from its downstream.
    pub fn unlink(&mut self, node: NodeId) -> FilterResult<Option<NodeId>> {
        if self.links.next(node)?.is_some() {
            self.flush(node)?;
        }
        self.links.detach_next(node)
    }

    /// Push `data` through `node`.
    pub fn put(&mut self, node: NodeId, data: &[u8]) -> FilterResult<usize> {
        self.call(node, false, |filter, down| filter.put(down, data))
    }

    /// Flush `node` and everything downstream of it.
    pub fn flush(&mut self, node: NodeId) -> FilterResult<usize> {
        self.call(node, false, |filter, down| filter.flush(down))
    }

    /// Final flush of `node` and everything downstream of it.
    pub fn end(&mut self, node: NodeId) -> FilterResult<usize> {
        self.call(node, true, |filter, down| filter.end(down))
    }

    /// The node `node` pushes into.
    pub fn downstream(&self, node: NodeId) -> FilterResult<Option<NodeId>> {
        self.links.next(node)
    }

    /// The node pushing into `node`.
    pub fn upstream(&self, node: NodeId) -> FilterResult<Option<NodeId>> {
        self.links.prev(node)
    }

    /// Borrow a node's filter as its concrete type.
    pub fn filter<T: PushFilter>(&self, node: NodeId) -> Option<&T> {
        self.links.filter(node)?.as_any().downcast_ref()
    }

    /// Mutably borrow a node's filter as its concrete type.
    pub fn filter_mut<T: PushFilter>(&mut self, node: NodeId) -> Option<&mut T> {
        self.links.filter_mut(node)?.as_any_mut().downcast_mut()
    }

    /// Tear down the whole chain containing `node`.
    ///
    /// The chain is flushed from its head first so buffered bytes reach the
    /// final sink. The chain is removed even if that flush fails; the flush
    /// error is returned. On success returns the number of nodes removed.
    pub fn dispose(&mut self, node: NodeId) -> FilterResult<usize> {
        let head = self.links.head(node)?;
        let flushed = self.flush(head);
        let mut removed = Vec::new();
        self.links.dispose(node, &mut removed);
        debug!(%node, removed = removed.len(), "push chain disposed");
        flushed.map(|_| removed.len())
    }

    /// Whether `node` is a live node of this chain.
    pub fn contains(&self, node: NodeId) -> bool {
        self.links.contains(node)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if the chain has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn call<R>(
        &mut self,
        node: NodeId,
        ending: bool,
        op: impl FnOnce(&mut Box<dyn PushFilter>, &mut Downstream<'_>) -> FilterResult<R>,
    ) -> FilterResult<R> {
        let (mut filter, downstream) = self.links.checkout(node)?;
        let result = op(
            &mut filter,
            &mut Downstream {
                chain: self,
                node: downstream,
                ending,
            },
        );
        self.links.checkin(node, filter);
        result
    }
}

impl Default for PushChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PushChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChain")
            .field("nodes", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::{BufferSink, PassThrough};

    /// Holds everything until flushed.
    #[derive(Default)]
    struct Hold {
        held: Vec<u8>,
        ended: bool,
    }

    impl PushFilter for Hold {
        fn put(&mut self, _downstream: &mut Downstream<'_>, data: &[u8]) -> FilterResult<usize> {
            self.held.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
            let n = downstream.put(&self.held)?;
            self.held.clear();
            Ok(n + downstream.flush()?)
        }

        fn end(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
            self.ended = true;
            self.flush(downstream)
        }
    }

    #[test]
    fn tail_without_downstream_consumes_everything() {
        let mut chain = PushChain::new();
        let node = chain.add(PassThrough);
        assert_eq!(chain.put(node, b"abc").unwrap(), 3);
        assert_eq!(chain.flush(node).unwrap(), 0);
    }

    #[test]
    fn pass_through_forwards() {
        let mut chain = PushChain::new();
        let ids = [chain.add(PassThrough), chain.add(BufferSink::with_capacity(16))];
        let head = chain.link_all(&ids).unwrap().unwrap();
        chain.put(head, b"save").unwrap();
        chain.put(head, b"game").unwrap();
        assert_eq!(chain.filter::<BufferSink>(ids[1]).unwrap().as_bytes(), b"savegame");
    }

    #[test]
    fn relink_flushes_before_detaching() {
        let mut chain = PushChain::new();
        let hold = chain.add(Hold::default());
        let first = chain.add(BufferSink::with_capacity(16));
        let second = chain.add(BufferSink::with_capacity(16));

        chain.link(hold, first).unwrap();
        chain.put(hold, b"early").unwrap();
        chain.link(hold, second).unwrap();
        chain.put(hold, b"late").unwrap();
        chain.flush(hold).unwrap();

        assert_eq!(chain.filter::<BufferSink>(first).unwrap().as_bytes(), b"early");
        assert_eq!(chain.filter::<BufferSink>(second).unwrap().as_bytes(), b"late");
        assert_eq!(chain.upstream(first).unwrap(), None);
    }

    #[test]
    fn stealing_a_sink_flushes_its_old_producer() {
        let mut chain = PushChain::new();
        let a = chain.add(Hold::default());
        let b = chain.add(PassThrough);
        let sink = chain.add(BufferSink::with_capacity(16));
        chain.link(a, sink).unwrap();
        chain.put(a, b"from-a").unwrap();
        chain.link(b, sink).unwrap();

        assert_eq!(chain.filter::<BufferSink>(sink).unwrap().as_bytes(), b"from-a");
        assert_eq!(chain.downstream(a).unwrap(), None);
    }

    #[test]
    fn end_reaches_every_node() {
        let mut chain = PushChain::new();
        let ids = [
            chain.add(PassThrough),
            chain.add(Hold::default()),
            chain.add(PassThrough),
            chain.add(Hold::default()),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        chain.put(head, b"x").unwrap();
        chain.end(head).unwrap();
        assert!(chain.filter::<Hold>(ids[1]).unwrap().ended);
        assert!(chain.filter::<Hold>(ids[3]).unwrap().ended);
    }

    #[test]
    fn dispose_flushes_then_removes_chain() {
        let mut chain = PushChain::new();
        let hold = chain.add(Hold::default());
        let sink = chain.add(BufferSink::with_capacity(16));
        chain.link(hold, sink).unwrap();
        chain.put(hold, b"pending").unwrap();

        assert_eq!(chain.dispose(sink).unwrap(), 2);
        assert!(chain.is_empty());
        assert!(matches!(
            chain.put(hold, b"more"),
            Err(FilterError::UnknownNode(_))
        ));
    }

    #[test]
    fn self_link_rejected() {
        let mut chain = PushChain::new();
        let a = chain.add(PassThrough);
        assert!(matches!(
            chain.link(a, a),
            Err(FilterError::InvalidLink { .. })
        ));
    }
}
