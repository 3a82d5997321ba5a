//! Bounded receive queue between the CAN interrupt (producer) and the node
//! pump (consumer).
//!
//! Frames are copied into fixed storage on arrival, so the driver may reuse its
//! buffer as soon as [`FrameBuffer::on_frame_received`] returns. Each access
//! runs in one short lock of the raw mutex `M`; with the default
//! [`CriticalSectionRawMutex`] that lock is a `critical-section` scope, which
//! masks interrupts on single-core targets and restores the previous state on
//! exit. The consumer never observes a half-written entry and the producer
//! never waits on anything longer than a queue operation.
//!
//! Overflow policy: the incoming frame is rejected, the queued ones are kept
//! and [`FrameBuffer::dropped`] is incremented.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{
    raw::{CriticalSectionRawMutex, RawMutex},
    Mutex,
};
use embedded_can::{Frame, Id};
use heapless::Deque;

use crate::core::{Microsecond, Mtu};
use crate::error::RxQueueError;
use crate::protocol::transport::can_frame::ReceivedFrame;

/// Queue interface the node drains; object safe so the node does not carry
/// the queue's mutex type and capacity as generics.
pub trait RxFrameQueue {
    /// MTU the queue stores payloads for.
    fn mtu(&self) -> Mtu;
    /// Number of frames currently queued.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Oldest frame, or [`RxQueueError::EmptyBuffer`].
    fn dequeue(&self) -> Result<ReceivedFrame, RxQueueError>;
    /// Producer entry point, see [`FrameBuffer::on_frame_received`].
    fn on_frame_received(
        &self,
        extended_can_id: u32,
        payload: &[u8],
        timestamp_us: Microsecond,
    ) -> Result<(), RxQueueError>;
}

struct Inner<const N: usize> {
    frames: Deque<ReceivedFrame, N>,
    dropped: u32,
}

/// Fixed-capacity FIFO of received frames.
///
/// Meant to live in a `static` (or a `StaticCell`) shared by the CAN interrupt
/// and the node.
pub struct FrameBuffer<M: RawMutex = CriticalSectionRawMutex, const N: usize = 16> {
    mtu: Mtu,
    inner: Mutex<M, RefCell<Inner<N>>>,
}

impl<M: RawMutex, const N: usize> FrameBuffer<M, N> {
    /// Empty queue storing payloads for `mtu`.
    pub const fn new(mtu: Mtu) -> Self {
        Self {
            mtu,
            inner: Mutex::new(RefCell::new(Inner {
                frames: Deque::new(),
                dropped: 0,
            })),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn mtu(&self) -> Mtu {
        self.mtu
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock(|inner| inner.borrow().frames.len())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock(|inner| inner.borrow().frames.is_empty())
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock(|inner| inner.borrow().frames.is_full())
    }

    /// Frames rejected since construction (full queue, bad identifier, oversized payload).
    pub fn dropped(&self) -> u32 {
        self.inner.lock(|inner| inner.borrow().dropped)
    }

    /// Append a frame; on a full queue the frame is dropped and counted.
    ///
    /// The payload must be stored for the queue MTU.
    pub fn enqueue(&self, frame: ReceivedFrame) -> Result<(), RxQueueError> {
        if frame.payload.mtu() != self.mtu {
            self.count_drop();
            return Err(RxQueueError::MtuMismatch {
                payload: frame.payload.mtu().bytes(),
                queue: self.mtu.bytes(),
            });
        }
        if frame.payload.len() > self.mtu.bytes() {
            let len = frame.payload.len();
            self.count_drop();
            return Err(RxQueueError::PayloadTooLong {
                len,
                mtu: self.mtu.bytes(),
            });
        }
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            match inner.frames.push_back(frame) {
                Ok(()) => Ok(()),
                Err(_rejected) => {
                    inner.dropped = inner.dropped.wrapping_add(1);
                    Err(RxQueueError::Full)
                }
            }
        })
    }

    /// Remove the oldest frame.
    pub fn dequeue(&self) -> Result<ReceivedFrame, RxQueueError> {
        self.inner.lock(|inner| {
            inner
                .borrow_mut()
                .frames
                .pop_front()
                .ok_or(RxQueueError::EmptyBuffer)
        })
    }

    /// Copy a frame coming from the driver and queue it.
    ///
    /// Safe to call from an interrupt handler that preempts the pump.
    pub fn on_frame_received(
        &self,
        extended_can_id: u32,
        payload: &[u8],
        timestamp_us: Microsecond,
    ) -> Result<(), RxQueueError> {
        match ReceivedFrame::new(self.mtu, extended_can_id, payload, timestamp_us) {
            Ok(frame) => self.enqueue(frame),
            Err(e) => {
                self.count_drop();
                Err(e)
            }
        }
    }

    /// Queue an `embedded-can` frame. Standard identifiers and remote frames
    /// are not Cyphal traffic and are rejected with distinct errors.
    pub fn on_can_frame<F: Frame>(
        &self,
        frame: &F,
        timestamp_us: Microsecond,
    ) -> Result<(), RxQueueError> {
        match frame.id() {
            Id::Extended(id) if !frame.is_remote_frame() => {
                self.on_frame_received(id.as_raw(), frame.data(), timestamp_us)
            }
            Id::Extended(id) => {
                self.count_drop();
                Err(RxQueueError::RemoteFrame { id: id.as_raw() })
            }
            Id::Standard(id) => {
                self.count_drop();
                Err(RxQueueError::InvalidIdentifier {
                    id: id.as_raw() as u32,
                })
            }
        }
    }

    fn count_drop(&self) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            inner.dropped = inner.dropped.wrapping_add(1);
        });
        #[cfg(feature = "defmt")]
        defmt::debug!("RX frame dropped");
    }
}

impl<M: RawMutex, const N: usize> RxFrameQueue for FrameBuffer<M, N> {
    fn mtu(&self) -> Mtu {
        self.mtu
    }

    fn len(&self) -> usize {
        FrameBuffer::len(self)
    }

    fn dequeue(&self) -> Result<ReceivedFrame, RxQueueError> {
        FrameBuffer::dequeue(self)
    }

    fn on_frame_received(
        &self,
        extended_can_id: u32,
        payload: &[u8],
        timestamp_us: Microsecond,
    ) -> Result<(), RxQueueError> {
        FrameBuffer::on_frame_received(self, extended_can_id, payload, timestamp_us)
    }
}
