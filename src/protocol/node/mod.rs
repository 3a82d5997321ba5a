//! Cyphal/CAN node: owns the heap, the protocol engine, the clock and the
//! subscription registry, and pumps frames and transfers between them.
//!
//! The node is driven by periodic calls to [`Node::spin_some`]. Each call runs
//! two bounded, non-blocking phases:
//!
//! 1. **Receive**: the frames queued when the phase starts are fed to the
//!    engine; completed transfers are dispatched to their subscriber and their
//!    payload is returned to the heap afterwards.
//! 2. **Transmit**: the engine transmit queue is drained against deadlines.
//!    Expired frames are dropped unsent; the phase stops at the first frame
//!    the transmitter refuses, leaving it at the head for the next call.
//!
//! Frames enter through a shared [`RxFrameQueue`] filled from interrupt
//! context; everything else is exclusively owned by the node.
pub mod config;
pub mod registry;
pub mod transfer;

use crate::core::{Microsecond, NodeId, PortId, TransferKind, TransferMetadata};
use crate::error::{ConfigError, EnqueueError, InitError, RxQueueError, SubscribeError};
use crate::infra::heap::{Diagnostics, MemoryResource, O1Heap};
use crate::protocol::transport::can_frame::OutgoingFrame;
use crate::protocol::transport::rx_queue::RxFrameQueue;
use crate::protocol::transport::traits::{
    can_tx::CanTransmitter,
    micros_clock::MicrosClock,
    transfer_engine::{AcceptResult, SubscriptionParams, TransferEngine},
};

use config::NodeConfig;
use registry::{SubscriptionKey, SubscriptionRegistry, TransferReceiver};
use transfer::ReceivedTransfer;

//==================================================================================PUMP_STATS
/// Event counters maintained by the pump. All counters wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PumpStats {
    /// Frames taken from the receive queue.
    pub rx_frames: u32,
    /// Transfers completed by the engine.
    pub rx_transfers: u32,
    /// Completed transfers handed to a receiver.
    pub rx_dispatched: u32,
    /// Completed transfers nobody subscribed to.
    pub rx_unhandled: u32,
    /// Frames the engine rejected.
    pub rx_rejected: u32,
    /// Frames dropped because the engine ran out of memory.
    pub rx_oom: u32,
    /// Frames queued by [`Node::enqueue_transfer`].
    pub tx_enqueued_frames: u32,
    /// Transfers the engine refused to queue.
    pub tx_enqueue_failures: u32,
    /// Frames accepted by the transmitter.
    pub tx_sent: u32,
    /// Frames dropped after their deadline.
    pub tx_expired: u32,
}

//==================================================================================NODE
/// Transport-layer engine of one Cyphal/CAN node.
///
/// * `E` – protocol engine (reassembly, deduplication, TX ordering)
/// * `C` – monotonic microsecond clock
/// * `SUBS` – maximum number of subscriptions
pub struct Node<'a, E, C, const SUBS: usize = 8>
where
    E: TransferEngine,
    C: MicrosClock,
{
    heap: O1Heap<'a>,
    engine: E,
    clock: C,
    rx_queue: &'a dyn RxFrameQueue,
    registry: SubscriptionRegistry<'a, SUBS>,
    config: NodeConfig,
    stats: PumpStats,
}

impl<'a, E, C, const SUBS: usize> Node<'a, E, C, SUBS>
where
    E: TransferEngine,
    C: MicrosClock,
{
    /// Wire a node together and configure the engine.
    ///
    /// Fails when `arena` cannot host the heap or when `rx_queue` stores
    /// payloads for another MTU than `config.mtu`.
    pub fn new(
        mut engine: E,
        arena: &'a mut [u8],
        clock: C,
        rx_queue: &'a dyn RxFrameQueue,
        config: NodeConfig,
    ) -> Result<Self, InitError> {
        if rx_queue.mtu() != config.mtu {
            return Err(ConfigError::MtuMismatch {
                node: config.mtu.bytes(),
                queue: rx_queue.mtu().bytes(),
            }
            .into());
        }
        let heap = O1Heap::new(arena)?;
        engine.configure(&config);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Node up: id {}, MTU {}, heap {} bytes",
            config.node_id,
            config.mtu,
            heap.diagnostics().capacity
        );

        Ok(Self {
            heap,
            engine,
            clock,
            rx_queue,
            registry: SubscriptionRegistry::new(),
            config,
            stats: PumpStats::default(),
        })
    }

    //------------------------------------------------------------------------------Pump

    /// Run one receive phase then one transmit phase.
    pub fn spin_some<T: CanTransmitter + ?Sized>(&mut self, transmitter: &mut T) {
        self.process_rx_queue();
        self.process_tx_queue(transmitter);
    }

    fn process_rx_queue(&mut self) {
        // Frames arriving during the phase wait for the next call.
        let pending = self.rx_queue.len();
        for _ in 0..pending {
            let Ok(frame) = self.rx_queue.dequeue() else {
                break;
            };
            self.stats.rx_frames = self.stats.rx_frames.wrapping_add(1);

            match self.engine.accept(&mut self.heap, &frame) {
                AcceptResult::TransferComplete(rx) => {
                    self.stats.rx_transfers = self.stats.rx_transfers.wrapping_add(1);
                    let transfer = ReceivedTransfer::new(&mut self.heap, rx);
                    if self.registry.dispatch(&transfer) {
                        self.stats.rx_dispatched = self.stats.rx_dispatched.wrapping_add(1);
                    } else {
                        self.stats.rx_unhandled = self.stats.rx_unhandled.wrapping_add(1);
                        #[cfg(feature = "defmt")]
                        defmt::trace!("No receiver for {}", transfer.metadata().port_id);
                    }
                }
                AcceptResult::FragmentConsumed => {}
                AcceptResult::Rejected => {
                    self.stats.rx_rejected = self.stats.rx_rejected.wrapping_add(1);
                }
                AcceptResult::OutOfMemory => {
                    self.stats.rx_oom = self.stats.rx_oom.wrapping_add(1);
                    #[cfg(feature = "defmt")]
                    defmt::warn!("RX out of memory, frame {} dropped", frame.id);
                }
            }
        }
    }

    fn process_tx_queue<T: CanTransmitter + ?Sized>(&mut self, transmitter: &mut T) {
        loop {
            let now = self.clock.micros();
            let Some(item) = self.engine.peek() else {
                break;
            };

            if item.deadline_us < now {
                #[cfg(feature = "defmt")]
                defmt::debug!("TX frame {} expired at {}", item.id, now);
                if !self.release_head() {
                    break;
                }
                self.stats.tx_expired = self.stats.tx_expired.wrapping_add(1);
                continue;
            }

            let frame = OutgoingFrame {
                id: item.id,
                payload: self.heap.bytes(&item.payload),
                deadline_us: item.deadline_us,
            };
            if !transmitter.transmit(&frame) {
                break;
            }
            if !self.release_head() {
                break;
            }
            self.stats.tx_sent = self.stats.tx_sent.wrapping_add(1);
        }
    }

    /// Pop the transmit queue head and free its payload.
    fn release_head(&mut self) -> bool {
        match self.engine.pop() {
            Some(item) => {
                self.heap.free(item.payload);
                true
            }
            None => false,
        }
    }

    //------------------------------------------------------------------------------Transmit

    /// Queue a transfer for transmission within `timeout_us` from now.
    ///
    /// Returns the number of frames queued.
    pub fn enqueue_transfer(
        &mut self,
        timeout_us: Microsecond,
        metadata: &TransferMetadata,
        payload: &[u8],
    ) -> Result<usize, EnqueueError> {
        let deadline_us = self.clock.micros().saturating_add(timeout_us);
        match self.engine.push(&mut self.heap, deadline_us, metadata, payload) {
            Ok(frames) => {
                self.stats.tx_enqueued_frames =
                    self.stats.tx_enqueued_frames.wrapping_add(frames as u32);
                Ok(frames)
            }
            Err(e) => {
                self.stats.tx_enqueue_failures = self.stats.tx_enqueue_failures.wrapping_add(1);
                #[cfg(feature = "defmt")]
                defmt::warn!("TX enqueue on {} failed: {}", metadata.port_id, e);
                Err(e.into())
            }
        }
    }

    //------------------------------------------------------------------------------Subscriptions

    /// Register `receiver` for transfers of `kind` on `port_id`.
    ///
    /// Returns the receiver previously registered for the same key.
    pub fn subscribe(
        &mut self,
        kind: TransferKind,
        port_id: PortId,
        params: &SubscriptionParams,
        receiver: &'a dyn TransferReceiver,
    ) -> Result<Option<&'a dyn TransferReceiver>, SubscribeError> {
        self.registry.subscribe(
            &mut self.engine,
            SubscriptionKey::new(kind, port_id),
            params,
            receiver,
        )
    }

    pub fn subscribe_message(
        &mut self,
        subject: PortId,
        extent: usize,
        receiver: &'a dyn TransferReceiver,
    ) -> Result<Option<&'a dyn TransferReceiver>, SubscribeError> {
        let params = SubscriptionParams::new(extent);
        self.subscribe(TransferKind::Message, subject, &params, receiver)
    }

    pub fn subscribe_request(
        &mut self,
        service: PortId,
        extent: usize,
        receiver: &'a dyn TransferReceiver,
    ) -> Result<Option<&'a dyn TransferReceiver>, SubscribeError> {
        let params = SubscriptionParams::new(extent);
        self.subscribe(TransferKind::Request, service, &params, receiver)
    }

    pub fn subscribe_response(
        &mut self,
        service: PortId,
        extent: usize,
        receiver: &'a dyn TransferReceiver,
    ) -> Result<Option<&'a dyn TransferReceiver>, SubscribeError> {
        let params = SubscriptionParams::new(extent);
        self.subscribe(TransferKind::Response, service, &params, receiver)
    }

    /// Drop the subscription for `(kind, port_id)`; `false` if there was none.
    pub fn unsubscribe(&mut self, kind: TransferKind, port_id: PortId) -> bool {
        self.registry.unsubscribe(
            &mut self.engine,
            &mut self.heap,
            SubscriptionKey::new(kind, port_id),
        )
    }

    pub fn unsubscribe_message(&mut self, subject: PortId) -> bool {
        self.unsubscribe(TransferKind::Message, subject)
    }

    pub fn unsubscribe_request(&mut self, service: PortId) -> bool {
        self.unsubscribe(TransferKind::Request, service)
    }

    pub fn unsubscribe_response(&mut self, service: PortId) -> bool {
        self.unsubscribe(TransferKind::Response, service)
    }

    pub fn is_subscribed(&self, kind: TransferKind, port_id: PortId) -> bool {
        self.registry.is_subscribed(&SubscriptionKey::new(kind, port_id))
    }

    //------------------------------------------------------------------------------Accessors

    /// Queue a frame stamped with the node clock.
    ///
    /// Same as calling the receive queue directly; usable when the driver
    /// polls from the context that owns the node.
    pub fn on_frame_received(
        &self,
        extended_can_id: u32,
        payload: &[u8],
    ) -> Result<(), RxQueueError> {
        self.rx_queue.on_frame_received(extended_can_id, payload, self.clock.micros())
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.config.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    pub fn heap_diagnostics(&self) -> Diagnostics {
        self.heap.diagnostics()
    }

    pub fn now_us(&self) -> Microsecond {
        self.clock.micros()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}
