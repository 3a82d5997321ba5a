//! Minimal abstraction for the CAN peripheral transmit path. The pump never
//! waits on the driver: one call is one attempt.
use crate::protocol::transport::can_frame::OutgoingFrame;

/// Contract to hand one frame to the CAN controller.
pub trait CanTransmitter {
    /// Try to place `frame` into a hardware mailbox.
    ///
    /// Returns `true` when the frame was accepted. `false` means "busy, try
    /// later": the pump keeps the frame at the head of its queue and stops the
    /// transmit phase for this cycle.
    fn transmit(&mut self, frame: &OutgoingFrame<'_>) -> bool;
}

impl<F> CanTransmitter for F
where
    F: FnMut(&OutgoingFrame<'_>) -> bool,
{
    fn transmit(&mut self, frame: &OutgoingFrame<'_>) -> bool {
        self(frame)
    }
}
