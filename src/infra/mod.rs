//! Infrastructure shared by the transport layer: the deterministic heap that
//! backs every engine allocation.
pub mod heap;
