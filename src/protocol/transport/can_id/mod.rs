//! Creation and extraction of the 29-bit CAN identifiers used by Cyphal/CAN.
//!
//! ```text
//! Message:  [28:26] priority  [25] 0  [24] anonymous  [23] 0  [22:21] 1 1
//!           [20:8] subject-ID  [7] 0  [6:0] source node-ID
//! Service:  [28:26] priority  [25] 1  [24] request-not-response  [23] 0
//!           [22:14] service-ID  [13:7] destination node-ID  [6:0] source node-ID
//! ```
use crate::core::{NodeId, PortId, Priority, TransferKind, SERVICE_ID_MAX, SUBJECT_ID_MAX};
use crate::error::CanIdBuildError;

/// Bits of a 29-bit extended identifier.
pub const CAN_EXT_ID_MASK: u32 = 0x1FFF_FFFF;

const SERVICE_NOT_MESSAGE: u32 = 1 << 25;
const ANONYMOUS: u32 = 1 << 24;
const REQUEST_NOT_RESPONSE: u32 = 1 << 24;
const MESSAGE_RESERVED_ONES: u32 = 0b11 << 21;

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates an extended CAN identifier (29 bits) and exposes accessors
/// for priority, transfer kind, port, source and destination.
pub struct CanId(pub u32);

impl CanId {
    /// Builder for a message identifier published by `source`.
    pub fn message(subject: PortId, source: NodeId) -> CanIdBuilder {
        CanIdBuilder::new(TransferKind::Message, subject, Some(source))
    }

    /// Builder for an anonymous message; `pseudo_id` fills the source field.
    pub fn anonymous_message(subject: PortId, pseudo_id: u8) -> CanIdBuilder {
        let mut builder = CanIdBuilder::new(TransferKind::Message, subject, None);
        builder.pseudo_id = pseudo_id & 0x7F;
        builder
    }

    /// Builder for a request or response identifier.
    pub fn service(
        kind: TransferKind,
        service: PortId,
        source: NodeId,
        destination: NodeId,
    ) -> CanIdBuilder {
        let mut builder = CanIdBuilder::new(kind, service, Some(source));
        builder.destination = Some(destination);
        builder
    }

    /// Whether the value fits in 29 bits.
    pub const fn is_extended(&self) -> bool {
        self.0 & !CAN_EXT_ID_MASK == 0
    }

    /// Three-bit priority field.
    pub fn priority(&self) -> Priority {
        Priority::from_u8_truncating((self.0 >> 26) as u8)
    }

    pub fn is_service(&self) -> bool {
        self.0 & SERVICE_NOT_MESSAGE != 0
    }

    /// Message, request or response.
    pub fn kind(&self) -> TransferKind {
        if !self.is_service() {
            TransferKind::Message
        } else if self.0 & REQUEST_NOT_RESPONSE != 0 {
            TransferKind::Request
        } else {
            TransferKind::Response
        }
    }

    /// Subject-ID for messages, service-ID for services.
    pub fn port_id(&self) -> PortId {
        if self.is_service() {
            PortId(((self.0 >> 14) & SERVICE_ID_MAX as u32) as u16)
        } else {
            PortId(((self.0 >> 8) & SUBJECT_ID_MAX as u32) as u16)
        }
    }

    /// Anonymous messages carry a pseudo-ID instead of a node-ID.
    pub fn is_anonymous(&self) -> bool {
        !self.is_service() && self.0 & ANONYMOUS != 0
    }

    /// Source node, `None` for anonymous messages.
    pub fn source(&self) -> Option<NodeId> {
        if self.is_anonymous() {
            None
        } else {
            NodeId::new((self.0 & 0x7F) as u8)
        }
    }

    /// Destination node of a service transfer.
    pub fn destination(&self) -> Option<NodeId> {
        if self.is_service() {
            NodeId::new(((self.0 >> 7) & 0x7F) as u8)
        } else {
            None
        }
    }
}

//==================================================================================CAN_ID_BUILDER
#[derive(Debug)]
/// Fluent builder that enforces the message/service layout rules.
pub struct CanIdBuilder {
    pub priority: Priority,
    pub kind: TransferKind,
    pub port_id: PortId,
    pub source: Option<NodeId>,
    pub destination: Option<NodeId>,
    pseudo_id: u8,
}

impl CanIdBuilder {
    fn new(kind: TransferKind, port_id: PortId, source: Option<NodeId>) -> Self {
        Self {
            priority: Priority::Nominal,
            kind,
            port_id,
            source,
            destination: None,
            pseudo_id: 0,
        }
    }

    /// Sets the priority to use during construction.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builds the identifier:
    /// - messages: subject-ID ≤ 8191, no destination, anonymous when no source
    /// - services: service-ID ≤ 511, source and destination mandatory
    pub fn build(self) -> Result<CanId, CanIdBuildError> {
        if !self.port_id.fits(self.kind) {
            return Err(CanIdBuildError::PortOutOfRange {
                port: self.port_id.0,
            });
        }
        let priority = (self.priority.into_u8() as u32) << 26;

        match self.kind {
            TransferKind::Message => {
                if self.destination.is_some() {
                    return Err(CanIdBuildError::DestinationOnMessage);
                }
                let (anonymous, source) = match self.source {
                    Some(node) => (0, node.into_u8() as u32),
                    None => (ANONYMOUS, self.pseudo_id as u32),
                };
                Ok(CanId(
                    priority
                        | anonymous
                        | MESSAGE_RESERVED_ONES
                        | ((self.port_id.0 as u32) << 8)
                        | source,
                ))
            }
            TransferKind::Request | TransferKind::Response => {
                let source = self.source.ok_or(CanIdBuildError::AnonymousService)?;
                let destination = self
                    .destination
                    .ok_or(CanIdBuildError::MissingDestination)?;
                let request = if self.kind == TransferKind::Request {
                    REQUEST_NOT_RESPONSE
                } else {
                    0
                };
                Ok(CanId(
                    priority
                        | SERVICE_NOT_MESSAGE
                        | request
                        | ((self.port_id.0 as u32) << 14)
                        | ((destination.into_u8() as u32) << 7)
                        | source.into_u8() as u32,
                ))
            }
        }
    }
}
//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
