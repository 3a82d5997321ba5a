//! Scoped ownership of a received transfer.
//!
//! The engine hands completed transfers over with their payload still
//! allocated from the node heap. [`ReceivedTransfer`] keeps that block and a
//! borrow of the heap together and frees the block when it goes out of scope,
//! so the payload is released exactly once whether or not a subscriber saw it.
use crate::core::{Microsecond, TransferMetadata};
use crate::infra::heap::{Block, MemoryResource};
use crate::protocol::transport::traits::transfer_engine::RxTransfer;

/// Transfer lent to subscribers for the duration of one dispatch.
pub struct ReceivedTransfer<'h> {
    heap: &'h mut dyn MemoryResource,
    metadata: TransferMetadata,
    timestamp_us: Microsecond,
    payload: Option<Block>,
}

impl<'h> ReceivedTransfer<'h> {
    /// Take ownership of `transfer`; its payload must come from `heap`.
    pub fn new(heap: &'h mut dyn MemoryResource, transfer: RxTransfer) -> Self {
        Self {
            heap,
            metadata: transfer.metadata,
            timestamp_us: transfer.timestamp_us,
            payload: transfer.payload,
        }
    }

    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    /// Reception time of the first frame of the transfer.
    pub fn timestamp_us(&self) -> Microsecond {
        self.timestamp_us
    }

    /// Payload bytes; empty for a transfer without payload.
    pub fn payload(&self) -> &[u8] {
        match &self.payload {
            Some(block) => self.heap.bytes(block),
            None => &[],
        }
    }
}

impl Drop for ReceivedTransfer<'_> {
    fn drop(&mut self) {
        if let Some(block) = self.payload.take() {
            self.heap.free(block);
        }
    }
}

impl core::fmt::Debug for ReceivedTransfer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReceivedTransfer")
            .field("metadata", &self.metadata)
            .field("timestamp_us", &self.timestamp_us)
            .field("payload", &self.payload())
            .finish()
    }
}
