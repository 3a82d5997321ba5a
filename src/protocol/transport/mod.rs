//! Cyphal/CAN transport layer: CAN frame representations, 29-bit identifier
//! layout, the bounded receive queue fed from interrupt context, and the
//! traits the node uses to reach the protocol engine, the CAN driver and the
//! clock.
//!
//! ## Timing constants
//!
//! Defaults used when the application does not provide its own values.

pub mod can_frame;
pub mod can_id;
pub mod rx_queue;
pub mod traits;

/// Default transfer-ID timeout for a new subscription (µs).
///
/// A transfer whose ID repeats within this window is treated as a duplicate by
/// the engine; after it, the session restarts. Two seconds is the value
/// recommended for Cyphal/CAN.
pub const DEFAULT_TRANSFER_ID_TIMEOUT_US: u64 = 2_000_000;

/// Default transmission timeout for outgoing transfers (µs).
///
/// A frame still queued one second after it was enqueued is dropped by the
/// pump instead of being sent late.
pub const DEFAULT_TX_TIMEOUT_US: u64 = 1_000_000;
