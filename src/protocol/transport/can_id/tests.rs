//! Unit tests for the `CanId` accessors and builder.
use super::*;
use crate::core::TransferKind;

fn node(id: u8) -> NodeId {
    NodeId::new(id).unwrap()
}

//==================================================================================CAN_ID
#[test]
/// Heartbeat (subject 7509) published by node 42 at nominal priority.
fn test_heartbeat_identifier() {
    let can_id = CanId::message(PortId(7509), node(42)).build().unwrap();
    assert_eq!(can_id, CanId(0x107D_552A));
    assert!(can_id.is_extended());
}

#[test]
/// Decodes every field of a message identifier.
fn test_message_accessors() {
    let can_id = CanId(0x107D_552A);
    assert_eq!(can_id.priority(), Priority::Nominal);
    assert_eq!(can_id.kind(), TransferKind::Message);
    assert_eq!(can_id.port_id(), PortId(7509));
    assert_eq!(can_id.source(), Some(node(42)));
    assert_eq!(can_id.destination(), None);
    assert!(!can_id.is_anonymous());
}

#[test]
/// Decodes every field of a request identifier.
fn test_service_accessors() {
    let can_id = CanId::service(TransferKind::Request, PortId(430), node(10), node(99))
        .with_priority(Priority::Fast)
        .build()
        .unwrap();
    assert_eq!(can_id.priority(), Priority::Fast);
    assert_eq!(can_id.kind(), TransferKind::Request);
    assert_eq!(can_id.port_id(), PortId(430));
    assert_eq!(can_id.source(), Some(node(10)));
    assert_eq!(can_id.destination(), Some(node(99)));

    let response = CanId::service(TransferKind::Response, PortId(430), node(99), node(10))
        .build()
        .unwrap();
    assert_eq!(response.kind(), TransferKind::Response);
}

#[test]
/// Anonymous messages have no source node.
fn test_anonymous_message() {
    let can_id = CanId::anonymous_message(PortId(100), 0xFF).build().unwrap();
    assert!(can_id.is_anonymous());
    assert_eq!(can_id.source(), None);
    assert_eq!(can_id.0 & 0x7F, 0x7F);
}

//==================================================================================CAN_ID_BUILDER
#[test]
/// Validates builder misconfigurations.
fn test_builder_errors() {
    assert_eq!(
        CanId::message(PortId(8192), node(1)).build(),
        Err(CanIdBuildError::PortOutOfRange { port: 8192 })
    );
    assert_eq!(
        CanId::service(TransferKind::Request, PortId(512), node(1), node(2)).build(),
        Err(CanIdBuildError::PortOutOfRange { port: 512 })
    );

    let mut addressed_message = CanId::message(PortId(1), node(1));
    addressed_message.destination = Some(node(2));
    assert_eq!(
        addressed_message.build(),
        Err(CanIdBuildError::DestinationOnMessage)
    );

    let mut missing_destination =
        CanId::service(TransferKind::Response, PortId(1), node(1), node(2));
    missing_destination.destination = None;
    assert_eq!(
        missing_destination.build(),
        Err(CanIdBuildError::MissingDestination)
    );
}

#[test]
/// Identifiers wider than 29 bits are flagged.
fn test_extended_range() {
    assert!(CanId(CAN_EXT_ID_MASK).is_extended());
    assert!(!CanId(CAN_EXT_ID_MASK + 1).is_extended());
}
