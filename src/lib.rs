//! `korri-cyphal` library: transport-layer engine of a Cyphal/CAN node for
//! `no_std` targets. The crate exposes the infrastructure modules (deterministic
//! heap, interrupt-safe locking), the transport primitives (CAN identifiers,
//! frames, bounded receive queue, collaborator traits) and the node itself:
//! the frame pump and the subscription registry.
#![no_std]
//==================================================================================
/// Data types shared by every layer (priorities, port and node identifiers,
/// transfer metadata, MTU).
pub mod core;
/// Recoverable error types returned by the queue, heap, engine and registry.
pub mod error;
/// Deterministic-time heap and scoped critical sections.
pub mod infra;
/// Cyphal/CAN transport primitives and the node built on top of them.
pub mod protocol;
//==================================================================================
