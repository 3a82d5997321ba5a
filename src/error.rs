//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (frame buffering, heap setup,
//! engine calls, subscriptions, configuration). None of them is fatal: every
//! error is a local signal returned to the immediate caller.
use thiserror_no_std::Error;

//==================================================================================CAN_ID_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur while building a 29-bit Cyphal/CAN identifier.
pub enum CanIdBuildError {
    /// Subject-ID above 8191 or service-ID above 511.
    #[error("Port {port} out of range for the transfer kind")]
    PortOutOfRange { port: u16 },
    /// Messages are broadcast and cannot be addressed.
    #[error("Messages cannot carry a destination")]
    DestinationOnMessage,
    /// Service transfers require a destination node.
    #[error("Service transfer without destination")]
    MissingDestination,
    /// Anonymous nodes may only publish messages.
    #[error("Anonymous node cannot exchange service transfers")]
    AnonymousService,
}

//==================================================================================RX_QUEUE_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures of the bounded receive frame buffer.
pub enum RxQueueError {
    /// The buffer holds `capacity` frames already; the new frame was dropped.
    #[error("Receive buffer full")]
    Full,
    /// Nothing to dequeue.
    #[error("Receive buffer empty")]
    EmptyBuffer,
    /// Payload does not fit the MTU the buffer was built for.
    #[error("Payload too long: {len} bytes for an MTU of {mtu}")]
    PayloadTooLong { len: usize, mtu: usize },
    /// Identifier does not fit into 29 bits, or is a standard identifier.
    #[error("Invalid extended CAN identifier: {id:#X}")]
    InvalidIdentifier { id: u32 },
    /// Remote frames carry no data and are not part of Cyphal/CAN.
    #[error("Remote frame {id:#X} rejected")]
    RemoteFrame { id: u32 },
    /// Payload stored for another MTU than the one the buffer was built for.
    #[error("Payload stored for an MTU of {payload}, buffer MTU is {queue}")]
    MtuMismatch { payload: usize, queue: usize },
}

//==================================================================================HEAP_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Arena rejected by [`O1Heap::new`](crate::infra::heap::O1Heap::new).
pub enum HeapError {
    /// Arena cannot hold a single minimal fragment.
    #[error("Arena too small: {size} bytes")]
    ArenaTooSmall { size: usize },
    /// Fragment offsets are stored on 32 bits.
    #[error("Arena too large: {size} bytes")]
    ArenaTooLarge { size: usize },
}

//==================================================================================ENGINE_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures reported by a [`TransferEngine`](crate::protocol::transport::traits::transfer_engine::TransferEngine).
pub enum EngineError {
    /// The heap could not serve an allocation.
    #[error("Out of memory")]
    OutOfMemory,
    /// The transmit queue reached its configured capacity.
    #[error("Transmit queue full")]
    QueueFull,
    /// Metadata, port identifier or payload rejected by the engine.
    #[error("Invalid argument")]
    InvalidArgument,
}

//==================================================================================ENQUEUE_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failure to queue an outgoing transfer.
pub enum EnqueueError {
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Transmit queue full")]
    QueueFull,
    #[error("Invalid transfer")]
    InvalidArgument,
}

impl From<EngineError> for EnqueueError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::OutOfMemory => EnqueueError::OutOfMemory,
            EngineError::QueueFull => EnqueueError::QueueFull,
            EngineError::InvalidArgument => EnqueueError::InvalidArgument,
        }
    }
}

//==================================================================================SUBSCRIBE_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failure to register a receiver.
pub enum SubscribeError {
    /// No slot left for a new (kind, port) key.
    #[error("Subscription registry full")]
    RegistryFull,
    /// Port identifier out of range for the transfer kind.
    #[error("Port {port} out of range")]
    InvalidPort { port: u16 },
    /// The engine refused to open a session.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

//==================================================================================CONFIG_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Invalid construction parameters.
pub enum ConfigError {
    /// Only 8 (classic) and 64 (FD) byte MTUs exist.
    #[error("Invalid MTU: {mtu}")]
    InvalidMtu { mtu: usize },
    /// Node identifiers are 7-bit.
    #[error("Invalid node id: {id}")]
    InvalidNodeId { id: u8 },
    /// The receive queue stores payloads for another MTU than the node.
    #[error("Receive queue MTU {queue} differs from node MTU {node}")]
    MtuMismatch { node: usize, queue: usize },
}

//==================================================================================INIT_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Node construction failure.
pub enum InitError {
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
