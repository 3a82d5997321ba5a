//! Contract of the protocol engine the node delegates to.
//!
//! The engine owns everything wire-specific: multi-frame reassembly, CRC,
//! transfer-ID deduplication, session timeouts and the priority-ordered
//! transmit queue. The node only moves frames in, transfers out, and drains
//! the transmit queue against deadlines.
//!
//! Every call that may allocate or release memory receives the node heap as a
//! `&mut dyn MemoryResource`; the engine keeps no pointer to it between calls.
use crate::core::{Microsecond, PortId, TransferKind, TransferMetadata};
use crate::error::EngineError;
use crate::infra::heap::{Block, MemoryResource};
use crate::protocol::node::config::NodeConfig;
use crate::protocol::transport::can_frame::ReceivedFrame;
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::DEFAULT_TRANSFER_ID_TIMEOUT_US;

//==================================================================================RX_TRANSFER
/// Transfer reassembled by the engine. The payload block belongs to the node
/// heap; whoever receives this value must free it.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxTransfer {
    pub metadata: TransferMetadata,
    /// Reception time of the first frame.
    pub timestamp_us: Microsecond,
    /// `None` for an empty transfer.
    pub payload: Option<Block>,
}

/// Outcome of feeding one frame to the engine.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcceptResult {
    /// Not for this node, malformed, duplicate or without a session.
    Rejected,
    /// Part of a multi-frame transfer still in progress.
    FragmentConsumed,
    /// Last frame of a transfer.
    TransferComplete(RxTransfer),
    /// The heap could not hold the session state or the payload.
    OutOfMemory,
}

//==================================================================================TX_QUEUE_ITEM
/// One frame waiting in the engine transmit queue.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxQueueItem {
    /// Absolute time after which the frame must not be sent.
    pub deadline_us: Microsecond,
    pub id: CanId,
    /// Data field (padding and tail byte included), allocated from the node heap.
    pub payload: Block,
}

//==================================================================================SUBSCRIPTION_PARAMS
/// Session parameters of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriptionParams {
    /// Largest payload kept per transfer; longer payloads are truncated.
    pub extent: usize,
    /// Window within which a repeated transfer ID is a duplicate.
    pub transfer_id_timeout_us: Microsecond,
}

impl SubscriptionParams {
    pub const fn new(extent: usize) -> Self {
        Self {
            extent,
            transfer_id_timeout_us: DEFAULT_TRANSFER_ID_TIMEOUT_US,
        }
    }

    pub const fn with_transfer_id_timeout(mut self, timeout_us: Microsecond) -> Self {
        self.transfer_id_timeout_us = timeout_us;
        self
    }
}

impl Default for SubscriptionParams {
    fn default() -> Self {
        Self::new(0)
    }
}

//==================================================================================TRANSFER_ENGINE
/// Protocol engine driven by the [`Node`](crate::protocol::node::Node).
pub trait TransferEngine {
    /// Apply the local node identity, MTU and transmit queue capacity.
    /// Called once by the node constructor.
    fn configure(&mut self, config: &NodeConfig);

    /// Feed one received frame.
    fn accept(&mut self, heap: &mut dyn MemoryResource, frame: &ReceivedFrame) -> AcceptResult;

    /// Open (or refresh) the reception session for `(kind, port_id)`.
    fn subscribe(
        &mut self,
        kind: TransferKind,
        port_id: PortId,
        params: &SubscriptionParams,
    ) -> Result<(), EngineError>;

    /// Close the session and release its state; `false` if there was none.
    fn unsubscribe(
        &mut self,
        heap: &mut dyn MemoryResource,
        kind: TransferKind,
        port_id: PortId,
    ) -> bool;

    /// Split `payload` into frames and queue them. Returns the frame count.
    fn push(
        &mut self,
        heap: &mut dyn MemoryResource,
        deadline_us: Microsecond,
        metadata: &TransferMetadata,
        payload: &[u8],
    ) -> Result<usize, EngineError>;

    /// Frame that would be transmitted next.
    fn peek(&self) -> Option<&TxQueueItem>;

    /// Remove the head of the transmit queue; the caller frees its payload.
    fn pop(&mut self) -> Option<TxQueueItem>;
}
