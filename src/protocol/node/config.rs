//! Construction parameters of a [`Node`](super::Node).
use crate::core::{Mtu, NodeId};

/// Transmit queue capacity used when none is configured, in frames.
pub const DEFAULT_TX_QUEUE_CAPACITY: usize = 32;

/// Identity and sizing of a node.
///
/// Receive-queue and registry capacities are const generics of their types;
/// the heap is sized by the arena handed to [`Node::new`](super::Node::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    /// `None` runs the node anonymously (it may only publish single-frame messages).
    pub node_id: Option<NodeId>,
    pub mtu: Mtu,
    /// Upper bound on frames waiting in the engine transmit queue.
    pub tx_queue_capacity: usize,
}

impl NodeConfig {
    pub const fn new() -> Self {
        Self {
            node_id: None,
            mtu: Mtu::Classic,
            tx_queue_capacity: DEFAULT_TX_QUEUE_CAPACITY,
        }
    }

    pub const fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub const fn with_mtu(mut self, mtu: Mtu) -> Self {
        self.mtu = mtu;
        self
    }

    pub const fn with_tx_queue_capacity(mut self, capacity: usize) -> Self {
        self.tx_queue_capacity = capacity;
        self
    }

    pub const fn is_anonymous(&self) -> bool {
        self.node_id.is_none()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new()
    }
}
