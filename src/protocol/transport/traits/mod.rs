//! Abstraction traits used by the node: the protocol engine it delegates
//! reassembly and TX ordering to, the CAN transmitter and the clock.
pub mod can_tx;
pub mod micros_clock;
pub mod transfer_engine;
