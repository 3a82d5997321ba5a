//! In-memory representations of Cyphal/CAN frames: the received frame as it
//! sits in the receive queue, and the borrowed view handed to the transmitter.
use core::ops::Deref;

use embedded_can::{ExtendedId, Frame};
use heapless::Vec;

use crate::core::{Microsecond, Mtu};
use crate::error::RxQueueError;
use crate::protocol::transport::can_id::CanId;

//==================================================================================FRAME_PAYLOAD
/// Payload storage sized for the MTU selected at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramePayload {
    /// Classic CAN, up to eight bytes.
    Classic(Vec<u8, 8>),
    /// CAN FD, up to 64 bytes.
    Fd(Vec<u8, 64>),
}

impl FramePayload {
    /// Copy `data` into storage for `mtu`.
    pub fn new(mtu: Mtu, data: &[u8]) -> Result<Self, RxQueueError> {
        let too_long = RxQueueError::PayloadTooLong {
            len: data.len(),
            mtu: mtu.bytes(),
        };
        match mtu {
            Mtu::Classic => Vec::from_slice(data)
                .map(FramePayload::Classic)
                .map_err(|_| too_long),
            Mtu::Fd => Vec::from_slice(data)
                .map(FramePayload::Fd)
                .map_err(|_| too_long),
        }
    }

    /// MTU this payload was stored for.
    pub fn mtu(&self) -> Mtu {
        match self {
            FramePayload::Classic(_) => Mtu::Classic,
            FramePayload::Fd(_) => Mtu::Fd,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            FramePayload::Classic(bytes) => bytes.as_slice(),
            FramePayload::Fd(bytes) => bytes.as_slice(),
        }
    }
}

impl Deref for FramePayload {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

//==================================================================================RECEIVED_FRAME
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Raw Cyphal/CAN frame as read from the bus, stamped on reception.
pub struct ReceivedFrame {
    /// Full 29-bit CAN identifier.
    pub id: CanId,
    /// Copy of the data field.
    pub payload: FramePayload,
    /// Monotonic reception time.
    pub timestamp_us: Microsecond,
}

impl ReceivedFrame {
    /// Validate and copy a frame; the caller keeps ownership of `data`.
    pub fn new(
        mtu: Mtu,
        extended_can_id: u32,
        data: &[u8],
        timestamp_us: Microsecond,
    ) -> Result<Self, RxQueueError> {
        let id = CanId(extended_can_id);
        if !id.is_extended() {
            return Err(RxQueueError::InvalidIdentifier {
                id: extended_can_id,
            });
        }
        Ok(Self {
            id,
            payload: FramePayload::new(mtu, data)?,
            timestamp_us,
        })
    }
}

//==================================================================================OUTGOING_FRAME
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Head of the transmit queue, lent to the transmitter for one attempt.
pub struct OutgoingFrame<'a> {
    pub id: CanId,
    /// Data field, padding and tail byte included.
    pub payload: &'a [u8],
    /// Absolute time after which the frame is dropped instead of sent.
    pub deadline_us: Microsecond,
}

impl OutgoingFrame<'_> {
    /// Convert into a driver frame type; `None` if the driver rejects the length.
    pub fn to_can_frame<F: Frame>(&self) -> Option<F> {
        let id = ExtendedId::new(self.id.0)?;
        F::new(id, self.payload)
    }
}
