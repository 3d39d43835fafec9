//! Events flowing into and out of the discovery context.

use crate::att::AttErrorCode;
use crate::gatt::connection::GapRole;
use crate::gatt::types::{HandleRange, HandleUuidPair};

/// Everything the stack reports, grouped by the layer that raised it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    Gap(GapEvent),
    Gatt(GattEvent),
}

/// Link-layer events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapEvent {
    /// A link came up (`status == 0`) or failed to.
    Connected { conn: u16, role: GapRole, status: u8 },
    /// Republished even without a record: a link the table had no room
    /// for was still announced as connected.
    Disconnected { conn: u16, reason: u8 },
    /// Encryption state changed; `status == 0` means the link is now encrypted.
    EncryptionChanged { conn: u16, status: u8 },
    /// Not consumed by discovery.
    Other { id: u8 },
}

/// GATT client events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    /// The peer answered `request_opcode` with an error.
    ErrorResponse {
        conn: u16,
        request_opcode: u8,
        error: AttErrorCode,
    },
    /// Instances of the requested service; `finished` ends the procedure.
    ServiceByUuidResponse {
        conn: u16,
        handles: Vec<HandleRange>,
        finished: bool,
    },
    /// Characteristic declarations, `pair_len` bytes each.
    CharacteristicsResponse {
        conn: u16,
        pair_len: u8,
        data: Vec<u8>,
        finished: bool,
    },
    DescriptorsResponse {
        conn: u16,
        pairs: Vec<HandleUuidPair>,
        finished: bool,
    },
    /// The transport can accept requests again.
    ProtocolAvailable { conn: u16 },
    /// The transport gave up waiting for a response.
    Timeout { conn: u16 },
    /// Not consumed by discovery.
    Other { id: u8 },
}

/// Events published to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Connected { conn: u16 },
    Disconnected { conn: u16 },
    /// The peer requires encryption; pair or encrypt to let discovery continue.
    SecurityRequired { conn: u16 },
    DiscoveryComplete { conn: u16 },
    /// The transport timed out mid-discovery; handles are incomplete.
    DiscoveryTimedOut { conn: u16 },
}

/// What the context did with an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event changed discovery state or was republished.
    Handled,
    /// Stale, unmatched or irrelevant; nothing changed.
    Dropped,
    /// Not a discovery event; the caller keeps ownership of it.
    PassThrough,
}
