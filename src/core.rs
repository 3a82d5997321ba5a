//! Data types shared by the frame buffer, the pump, the subscription registry
//! and the transfer engine contract.
//!
//! Nothing here knows about wire encoding: the types only carry the values a
//! Cyphal/CAN transfer is addressed and ordered by.
use crate::error::ConfigError;

/// Monotonic timestamp or duration expressed in microseconds.
pub type Microsecond = u64;

/// Largest node identifier a Cyphal/CAN node may use.
pub const NODE_ID_MAX: u8 = 127;
/// Largest subject identifier carried by a message transfer.
pub const SUBJECT_ID_MAX: u16 = 8191;
/// Largest service identifier carried by a request/response transfer.
pub const SERVICE_ID_MAX: u16 = 511;
/// Transfer identifiers are 5-bit counters on CAN.
pub const TRANSFER_ID_MASK: u8 = 0x1F;

//==================================================================================NODE_ID
/// Logical address of a node on the bus (0..=127).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(u8);

impl NodeId {
    /// Returns `None` when `raw` is outside the 7-bit range.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= NODE_ID_MAX {
            Some(Self(raw))
        } else {
            None
        }
    }

    #[inline]
    pub const fn into_u8(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NodeId {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ConfigError::InvalidNodeId { id: value })
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

//==================================================================================PORT_ID
/// Subject identifier (messages) or service identifier (requests/responses).
///
/// The valid range depends on the transfer kind, see [`PortId::fits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortId(pub u16);

impl PortId {
    /// Whether this identifier can be carried by a transfer of `kind`.
    pub const fn fits(self, kind: TransferKind) -> bool {
        match kind {
            TransferKind::Message => self.0 <= SUBJECT_ID_MAX,
            TransferKind::Request | TransferKind::Response => self.0 <= SERVICE_ID_MAX,
        }
    }
}

impl From<u16> for PortId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

//==================================================================================TRANSFER_ID
/// Cyclic transfer counter, truncated to five bits on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferId(u8);

impl TransferId {
    pub const fn new(raw: u8) -> Self {
        Self(raw & TRANSFER_ID_MASK)
    }

    #[inline]
    pub const fn into_u8(self) -> u8 {
        self.0
    }

    /// Next value of the counter, wrapping after 31.
    pub const fn next(self) -> Self {
        Self::new(self.0.wrapping_add(1))
    }
}

//==================================================================================TRANSFER_KIND
/// Kind of a transfer; together with the port identifier it forms the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferKind {
    Message,
    Request,
    Response,
}

//==================================================================================PRIORITY
/// Transfer priority. The numeric encoding matches the CAN identifier, so a
/// lower value wins arbitration: `Exceptional` (0) is sent before `Optional` (7).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Priority {
    Exceptional = 0,
    Immediate = 1,
    Fast = 2,
    High = 3,
    /// Default for regular traffic.
    #[default]
    Nominal = 4,
    Low = 5,
    Slow = 6,
    Optional = 7,
}

impl Priority {
    /// Decode the three priority bits; higher bits are ignored.
    pub const fn from_u8_truncating(code: u8) -> Priority {
        match code & 0x07 {
            0 => Priority::Exceptional,
            1 => Priority::Immediate,
            2 => Priority::Fast,
            3 => Priority::High,
            4 => Priority::Nominal,
            5 => Priority::Low,
            6 => Priority::Slow,
            _ => Priority::Optional,
        }
    }

    #[inline]
    pub const fn into_u8(self) -> u8 {
        self as u8
    }
}

//==================================================================================MTU
/// Maximum payload carried by one CAN frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mtu {
    /// Classic CAN: eight data bytes.
    #[default]
    Classic,
    /// CAN FD: 64 data bytes.
    Fd,
}

impl Mtu {
    pub const fn bytes(self) -> usize {
        match self {
            Mtu::Classic => 8,
            Mtu::Fd => 64,
        }
    }
}

impl From<Mtu> for usize {
    fn from(value: Mtu) -> Self {
        value.bytes()
    }
}

impl TryFrom<usize> for Mtu {
    type Error = ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(Mtu::Classic),
            64 => Ok(Mtu::Fd),
            _ => Err(ConfigError::InvalidMtu { mtu: value }),
        }
    }
}

//==================================================================================TRANSFER_METADATA
/// Addressing and ordering information of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferMetadata {
    pub priority: Priority,
    pub kind: TransferKind,
    pub port_id: PortId,
    /// Source of a received transfer, destination of an outgoing service
    /// transfer. `None` for anonymous or broadcast traffic.
    pub remote_node_id: Option<NodeId>,
    pub transfer_id: TransferId,
}

impl TransferMetadata {
    /// Metadata of a broadcast message on `subject`.
    pub const fn message(subject: PortId, transfer_id: TransferId) -> Self {
        Self {
            priority: Priority::Nominal,
            kind: TransferKind::Message,
            port_id: subject,
            remote_node_id: None,
            transfer_id,
        }
    }

    /// Metadata of a service transfer exchanged with `remote`.
    pub const fn service(
        kind: TransferKind,
        service: PortId,
        remote: NodeId,
        transfer_id: TransferId,
    ) -> Self {
        Self {
            priority: Priority::Nominal,
            kind,
            port_id: service,
            remote_node_id: Some(remote),
            transfer_id,
        }
    }

    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
