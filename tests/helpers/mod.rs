/// Test doubles for the node: a scripted transfer engine, a manual clock, a
/// recording transmitter and a counting receiver.
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use korri_cyphal::{
    core::{Microsecond, Mtu, NodeId, PortId, TransferId, TransferKind, TransferMetadata},
    error::EngineError,
    infra::heap::MemoryResource,
    protocol::{
        node::{config::NodeConfig, registry::TransferReceiver, transfer::ReceivedTransfer},
        transport::{
            can_frame::{OutgoingFrame, ReceivedFrame},
            can_id::CanId,
            traits::{
                can_tx::CanTransmitter,
                micros_clock::MicrosClock,
                transfer_engine::{
                    AcceptResult, RxTransfer, SubscriptionParams, TransferEngine, TxQueueItem,
                },
            },
        },
    },
};

#[allow(dead_code)]
pub const TAIL_SOT: u8 = 0x80;
#[allow(dead_code)]
pub const TAIL_EOT: u8 = 0x40;
#[allow(dead_code)]
pub const TAIL_TOGGLE: u8 = 0x20;

#[allow(dead_code)]
/// Tail byte of a single-frame transfer.
pub fn single_frame_tail(transfer_id: u8) -> u8 {
    TAIL_SOT | TAIL_EOT | TAIL_TOGGLE | (transfer_id & 0x1F)
}

#[allow(dead_code)]
/// Identifier of a message on `subject` published by `source`.
pub fn message_id(subject: u16, source: u8) -> u32 {
    CanId::message(PortId(subject), NodeId::new(source).unwrap())
        .build()
        .unwrap()
        .0
}

//==================================================================================MOCK_ENGINE
struct Session {
    kind: TransferKind,
    port_id: PortId,
    extent: usize,
}

struct InFlight {
    metadata: TransferMetadata,
    timestamp_us: Microsecond,
    data: heapless::Vec<u8, 256>,
}

#[allow(dead_code)]
/// Simplified Cyphal/CAN engine: tail-byte framing without CRC, one
/// multi-frame transfer in flight at a time, TX queue ordered by CAN id with
/// FIFO order among equal ids.
pub struct MockEngine {
    local: Option<NodeId>,
    mtu: Mtu,
    tx_capacity: usize,
    sessions: heapless::Vec<Session, 16>,
    in_flight: Option<InFlight>,
    tx_queue: heapless::Vec<TxQueueItem, 64>,
    /// Complete transfers even without a matching session.
    pub accept_all: bool,
    pub configured: bool,
    pub unsubscribed: usize,
}

#[allow(dead_code)]
impl MockEngine {
    pub fn new() -> Self {
        Self {
            local: None,
            mtu: Mtu::Classic,
            tx_capacity: 0,
            sessions: heapless::Vec::new(),
            in_flight: None,
            tx_queue: heapless::Vec::new(),
            accept_all: false,
            configured: false,
            unsubscribed: 0,
        }
    }

    pub fn accepting_all() -> Self {
        Self {
            accept_all: true,
            ..Self::new()
        }
    }

    pub fn tx_len(&self) -> usize {
        self.tx_queue.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn extent_for(&self, kind: TransferKind, port_id: PortId) -> Option<usize> {
        self.sessions
            .iter()
            .find(|s| s.kind == kind && s.port_id == port_id)
            .map(|s| s.extent)
            .or(if self.accept_all { Some(usize::MAX) } else { None })
    }

    fn complete(
        heap: &mut dyn MemoryResource,
        metadata: TransferMetadata,
        timestamp_us: Microsecond,
        data: &[u8],
        extent: usize,
    ) -> AcceptResult {
        let data = &data[..data.len().min(extent)];
        let payload = if data.is_empty() {
            None
        } else {
            match heap.allocate(data.len()) {
                Some(block) => {
                    heap.bytes_mut(&block).copy_from_slice(data);
                    Some(block)
                }
                None => return AcceptResult::OutOfMemory,
            }
        };
        AcceptResult::TransferComplete(RxTransfer {
            metadata,
            timestamp_us,
            payload,
        })
    }

    fn insert_sorted(&mut self, item: TxQueueItem) -> Result<(), TxQueueItem> {
        let position = self
            .tx_queue
            .iter()
            .position(|queued| queued.id.0 > item.id.0)
            .unwrap_or(self.tx_queue.len());
        self.tx_queue.insert(position, item)
    }
}

impl TransferEngine for MockEngine {
    fn configure(&mut self, config: &NodeConfig) {
        self.local = config.node_id;
        self.mtu = config.mtu;
        self.tx_capacity = config.tx_queue_capacity;
        self.configured = true;
    }

    fn accept(&mut self, heap: &mut dyn MemoryResource, frame: &ReceivedFrame) -> AcceptResult {
        let id = frame.id;
        if let Some(destination) = id.destination() {
            if Some(destination) != self.local {
                return AcceptResult::Rejected;
            }
        }
        let Some(extent) = self.extent_for(id.kind(), id.port_id()) else {
            return AcceptResult::Rejected;
        };
        let Some((&tail, data)) = frame.payload.split_last() else {
            return AcceptResult::Rejected;
        };
        let metadata = TransferMetadata {
            priority: id.priority(),
            kind: id.kind(),
            port_id: id.port_id(),
            remote_node_id: id.source(),
            transfer_id: TransferId::new(tail),
        };

        match (tail & TAIL_SOT != 0, tail & TAIL_EOT != 0) {
            (true, true) => Self::complete(heap, metadata, frame.timestamp_us, data, extent),
            (true, false) => {
                let mut buffer: heapless::Vec<u8, 256> = heapless::Vec::new();
                if buffer.extend_from_slice(data).is_err() {
                    return AcceptResult::Rejected;
                }
                self.in_flight = Some(InFlight {
                    metadata,
                    timestamp_us: frame.timestamp_us,
                    data: buffer,
                });
                AcceptResult::FragmentConsumed
            }
            (false, last) => {
                let Some(in_flight) = self.in_flight.as_mut() else {
                    return AcceptResult::Rejected;
                };
                if in_flight.metadata.port_id != metadata.port_id
                    || in_flight.metadata.transfer_id != metadata.transfer_id
                    || in_flight.data.extend_from_slice(data).is_err()
                {
                    self.in_flight = None;
                    return AcceptResult::Rejected;
                }
                if !last {
                    return AcceptResult::FragmentConsumed;
                }
                let Some(done) = self.in_flight.take() else {
                    return AcceptResult::Rejected;
                };
                Self::complete(heap, done.metadata, done.timestamp_us, &done.data, extent)
            }
        }
    }

    fn subscribe(
        &mut self,
        kind: TransferKind,
        port_id: PortId,
        params: &SubscriptionParams,
    ) -> Result<(), EngineError> {
        if let Some(session) = self
            .sessions
            .iter_mut()
            .find(|s| s.kind == kind && s.port_id == port_id)
        {
            session.extent = params.extent;
            return Ok(());
        }
        self.sessions
            .push(Session {
                kind,
                port_id,
                extent: params.extent,
            })
            .map_err(|_| EngineError::OutOfMemory)
    }

    fn unsubscribe(
        &mut self,
        _heap: &mut dyn MemoryResource,
        kind: TransferKind,
        port_id: PortId,
    ) -> bool {
        self.unsubscribed += 1;
        let before = self.sessions.len();
        self.sessions
            .retain(|s| !(s.kind == kind && s.port_id == port_id));
        self.sessions.len() != before
    }

    fn push(
        &mut self,
        heap: &mut dyn MemoryResource,
        deadline_us: Microsecond,
        metadata: &TransferMetadata,
        payload: &[u8],
    ) -> Result<usize, EngineError> {
        let builder = match (metadata.kind, self.local, metadata.remote_node_id) {
            (TransferKind::Message, Some(local), None) => CanId::message(metadata.port_id, local),
            (TransferKind::Message, None, None) => CanId::anonymous_message(metadata.port_id, 0),
            (kind, Some(local), Some(remote)) if kind != TransferKind::Message => {
                CanId::service(kind, metadata.port_id, local, remote)
            }
            _ => return Err(EngineError::InvalidArgument),
        };
        let id = builder
            .with_priority(metadata.priority)
            .build()
            .map_err(|_| EngineError::InvalidArgument)?;

        let chunk = self.mtu.bytes() - 1;
        let frame_count = payload.len().div_ceil(chunk).max(1);
        if frame_count > 1 && self.local.is_none() {
            return Err(EngineError::InvalidArgument);
        }
        if self.tx_queue.len() + frame_count > self.tx_capacity.min(self.tx_queue.capacity()) {
            return Err(EngineError::QueueFull);
        }

        let tid = metadata.transfer_id.into_u8();
        let mut staged: heapless::Vec<TxQueueItem, 64> = heapless::Vec::new();
        for index in 0..frame_count {
            let start = (index * chunk).min(payload.len());
            let end = ((index + 1) * chunk).min(payload.len());
            let data = &payload[start..end];
            let Some(block) = heap.allocate(data.len() + 1) else {
                for item in staged {
                    heap.free(item.payload);
                }
                return Err(EngineError::OutOfMemory);
            };
            let mut tail = tid;
            if index == 0 {
                tail |= TAIL_SOT;
            }
            if index + 1 == frame_count {
                tail |= TAIL_EOT;
            }
            if index % 2 == 0 {
                tail |= TAIL_TOGGLE;
            }
            let bytes = heap.bytes_mut(&block);
            bytes[..data.len()].copy_from_slice(data);
            bytes[data.len()] = tail;
            let item = TxQueueItem {
                deadline_us,
                id,
                payload: block,
            };
            if let Err(item) = staged.push(item) {
                heap.free(item.payload);
                for item in staged {
                    heap.free(item.payload);
                }
                return Err(EngineError::QueueFull);
            }
        }
        for item in staged {
            if let Err(item) = self.insert_sorted(item) {
                heap.free(item.payload);
                return Err(EngineError::QueueFull);
            }
        }
        Ok(frame_count)
    }

    fn peek(&self) -> Option<&TxQueueItem> {
        self.tx_queue.first()
    }

    fn pop(&mut self) -> Option<TxQueueItem> {
        if self.tx_queue.is_empty() {
            None
        } else {
            Some(self.tx_queue.remove(0))
        }
    }
}

//==================================================================================CLOCK
#[derive(Clone, Default)]
#[allow(dead_code)]
/// Clock moved by hand; clones share the same time.
pub struct ManualClock {
    now: Rc<Cell<Microsecond>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Microsecond) {
        self.now.set(now);
    }

    pub fn advance(&self, delta: Microsecond) {
        self.now.set(self.now.get() + delta);
    }
}

impl MicrosClock for ManualClock {
    fn micros(&self) -> Microsecond {
        self.now.get()
    }
}

//==================================================================================TRANSMITTER
#[allow(dead_code)]
/// Transmitter recording what it accepted; `busy` makes it refuse everything.
pub struct RecordingTransmitter {
    pub busy: bool,
    pub attempts: usize,
    pub sent: Vec<(u32, Vec<u8>)>,
}

#[allow(dead_code)]
impl RecordingTransmitter {
    pub fn new() -> Self {
        Self {
            busy: false,
            attempts: 0,
            sent: Vec::new(),
        }
    }

    pub fn busy() -> Self {
        Self {
            busy: true,
            ..Self::new()
        }
    }
}

impl CanTransmitter for RecordingTransmitter {
    fn transmit(&mut self, frame: &OutgoingFrame<'_>) -> bool {
        self.attempts += 1;
        if self.busy {
            return false;
        }
        self.sent.push((frame.id.0, frame.payload.to_vec()));
        true
    }
}

//==================================================================================RECEIVER
#[allow(dead_code)]
/// Receiver counting calls and keeping a copy of the last payload.
pub struct CountingReceiver {
    pub calls: Cell<u32>,
    pub last_payload: RefCell<Vec<u8>>,
    pub last_metadata: Cell<Option<TransferMetadata>>,
}

#[allow(dead_code)]
impl CountingReceiver {
    pub fn new() -> Self {
        Self {
            calls: Cell::new(0),
            last_payload: RefCell::new(Vec::new()),
            last_metadata: Cell::new(None),
        }
    }
}

impl TransferReceiver for CountingReceiver {
    fn on_transfer_received(&self, transfer: &ReceivedTransfer<'_>) {
        self.calls.set(self.calls.get() + 1);
        *self.last_payload.borrow_mut() = transfer.payload().to_vec();
        self.last_metadata.set(Some(*transfer.metadata()));
    }
}
