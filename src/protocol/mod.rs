//! Cyphal/CAN protocol side of the crate: transport primitives (identifiers,
//! frames, receive queue, collaborator traits) and the node that pumps frames
//! and transfers between them.
pub mod node;
pub mod transport;
