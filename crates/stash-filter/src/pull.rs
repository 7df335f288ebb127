use tracing::debug;

use crate::error::FilterResult;
use crate::links::{Links, NodeId};
use crate::AsAny;

/// A node of a pull chain.
pub trait PullFilter: AsAny {
    /// Fill `buf` with up to `buf.len()` bytes.
    ///
    /// Returns the number of bytes written; 0 only at the end of data. The
    /// default implementation delegates to the upstream node unchanged.
    fn get(&mut self, upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        upstream.get(buf)
    }
}

/// A filter's view of the node it pulls from.
pub struct Upstream<'a> {
    chain: &'a mut PullChain,
    node: Option<NodeId>,
}

impl Upstream<'_> {
    /// Pull from the upstream node; 0 if there is none.
    pub fn get(&mut self, buf: &mut [u8]) -> FilterResult<usize> {
        match self.node {
            Some(id) if !buf.is_empty() => self.chain.get(id, buf),
            _ => Ok(0),
        }
    }

    /// Pull until `buf` is full or the upstream is exhausted.
    pub fn read_full(&mut self, buf: &mut [u8]) -> FilterResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.get(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Whether an upstream node is linked.
    pub fn is_linked(&self) -> bool {
        self.node.is_some()
    }
}

/// Arena of pull filters.
///
/// Nodes are added with [`PullChain::add`] and wired consumer-to-source
/// with [`PullChain::link`]. Reading from any node pulls through every node
/// upstream of it.
pub struct PullChain {
    links: Links<dyn PullFilter>,
}

impl PullChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            links: Links::new(),
        }
    }

    /// Add an unlinked node.
    pub fn add(&mut self, filter: impl PullFilter) -> NodeId {
        self.links.insert(Box::new(filter))
    }

    /// Add an unlinked, already boxed node.
    pub fn add_boxed(&mut self, filter: Box<dyn PullFilter>) -> NodeId {
        self.links.insert(filter)
    }

    /// Make `consumer` pull from `source`.
    ///
    /// Any existing upstream of `consumer` and any existing consumer of
    /// `source` are detached first.
    pub fn link(&mut self, consumer: NodeId, source: NodeId) -> FilterResult<()> {
        if self.links.next(consumer)? == Some(source) {
            return Ok(());
        }
        self.links.check_link(consumer, source)?;
        self.links.detach_next(consumer)?;
        self.links.detach_prev(source)?;
        self.links.attach(consumer, source)?;
        debug!(%consumer, %source, "pull link");
        Ok(())
    }

    /// Link `nodes` in order, each pulling from the one after it.
    ///
    /// Returns the head (the first node).
    pub fn link_all(&mut self, nodes: &[NodeId]) -> FilterResult<Option<NodeId>> {
        for pair in nodes.windows(2) {
            self.link(pair[0], pair[1])?;
        }
        Ok(nodes.first().copied())
    }

    /// Detach `node` from its upstream.
    pub fn unlink(&mut self, node: NodeId) -> FilterResult<Option<NodeId>> {
        self.links.detach_next(node)
    }

    /// Pull up to `buf.len()` bytes through `node`.
    pub fn get(&mut self, node: NodeId, buf: &mut [u8]) -> FilterResult<usize> {
        let (mut filter, upstream) = self.links.checkout(node)?;
        let result = filter.get(
            &mut Upstream {
                chain: self,
                node: upstream,
            },
            buf,
        );
        self.links.checkin(node, filter);
        let n = result?;
        debug_assert!(n <= buf.len());
        Ok(n)
    }

    /// Pull everything `node` produces, appending it to `out`.
    pub fn read_to_end(&mut self, node: NodeId, out: &mut Vec<u8>) -> FilterResult<usize> {
        let mut buf = [0u8; 4096];
        let mut total = 0;
        loop {
            let n = self.get(node, &mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&buf[..n]);
            total += n;
        }
    }

    /// The node `node` pulls from.
    pub fn upstream(&self, node: NodeId) -> FilterResult<Option<NodeId>> {
        self.links.next(node)
    }

    /// The node pulling from `node`.
    pub fn downstream(&self, node: NodeId) -> FilterResult<Option<NodeId>> {
        self.links.prev(node)
    }

    /// Borrow a node's filter as its concrete type.
    pub fn filter<T: PullFilter>(&self, node: NodeId) -> Option<&T> {
        self.links.filter(node)?.as_any().downcast_ref()
    }

    /// Mutably borrow a node's filter as its concrete type.
    pub fn filter_mut<T: PullFilter>(&mut self, node: NodeId) -> Option<&mut T> {
        self.links.filter_mut(node)?.as_any_mut().downcast_mut()
    }

    /// Tear down the whole chain containing `node`.
    ///
    /// Returns the number of nodes removed.
    pub fn dispose(&mut self, node: NodeId) -> usize {
        let mut removed = Vec::new();
        self.links.dispose(node, &mut removed);
        debug!(%node, removed = removed.len(), "pull chain disposed");
        removed.len()
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
}

impl Default for PullChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PullChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullChain")
            .field("nodes", &self.len())
            .finish()
    }
}
