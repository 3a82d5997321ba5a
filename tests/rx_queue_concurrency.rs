//! Receive queue shared between a producer thread standing in for the CAN
//! interrupt and the node pump.
mod helpers {
    include!("helpers/mod.rs");
}

use std::cell::Cell;
use std::thread;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use helpers::{message_id, single_frame_tail, ManualClock, MockEngine, RecordingTransmitter};
use korri_cyphal::{
    core::{Mtu, NodeId, PortId},
    protocol::{
        node::{config::NodeConfig, transfer::ReceivedTransfer, Node},
        transport::rx_queue::FrameBuffer,
    },
};
use static_cell::StaticCell;

const FRAMES: u32 = 500;
const SPIN_LIMIT: u32 = 10_000_000;

#[test]
/// A producer retrying on a full queue gets every frame delivered, in order.
fn test_producer_thread() {
    static QUEUE: StaticCell<FrameBuffer<CriticalSectionRawMutex, 32>> = StaticCell::new();
    let queue: &'static FrameBuffer<CriticalSectionRawMutex, 32> =
        QUEUE.init(FrameBuffer::new(Mtu::Classic));

    let producer = thread::spawn(move || {
        for seq in 0..FRAMES {
            let bytes = seq.to_le_bytes();
            let frame = [bytes[0], bytes[1], single_frame_tail(seq as u8)];
            while queue.on_frame_received(message_id(42, 7), &frame, 0).is_err() {
                thread::yield_now();
            }
        }
    });

    let received = Cell::new(0u32);
    let last_seq = Cell::new(None::<u16>);
    let in_order = Cell::new(true);
    let receiver = |transfer: &ReceivedTransfer<'_>| {
        let payload = transfer.payload();
        let seq = u16::from_le_bytes([payload[0], payload[1]]);
        if let Some(previous) = last_seq.get() {
            if seq != previous + 1 {
                in_order.set(false);
            }
        }
        last_seq.set(Some(seq));
        received.set(received.get() + 1);
    };

    let mut arena = [0u8; 2048];
    let mut node: Node<'_, MockEngine, ManualClock, 2> = Node::new(
        MockEngine::new(),
        &mut arena,
        ManualClock::new(),
        queue,
        NodeConfig::new().with_node_id(NodeId::new(1).unwrap()),
    )
    .unwrap();
    node.subscribe_message(PortId(42), 8, &receiver).unwrap();

    let mut tx = RecordingTransmitter::new();
    for _ in 0..SPIN_LIMIT {
        if received.get() == FRAMES {
            break;
        }
        node.spin_some(&mut tx);
        thread::yield_now();
    }
    producer.join().unwrap();

    assert_eq!(received.get(), FRAMES);
    assert!(in_order.get());
    assert!(queue.is_empty());
    assert_eq!(node.heap_diagnostics().live_blocks, 0);
}

#[test]
/// Concurrent producers never tear an entry.
fn test_concurrent_enqueue() {
    static QUEUE: StaticCell<FrameBuffer<CriticalSectionRawMutex, 512>> = StaticCell::new();
    let queue: &'static FrameBuffer<CriticalSectionRawMutex, 512> =
        QUEUE.init(FrameBuffer::new(Mtu::Fd));

    let workers: Vec<_> = (0..4u8)
        .map(|worker| {
            thread::spawn(move || {
                for _ in 0..128 {
                    queue.on_frame_received(u32::from(worker), &[worker; 64], 0).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(queue.len(), 512);
    assert_eq!(queue.dropped(), 0);
    while let Ok(frame) = queue.dequeue() {
        let worker = frame.id.0 as u8;
        assert!(frame.payload.iter().all(|b| *b == worker));
    }
}
