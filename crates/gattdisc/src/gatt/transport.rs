//! Seam to the ATT/GATT client transport.
//!
//! The transport owns PDU encoding, MTU and flow control. Discovery only asks it
//! to start a procedure; results come back later as [`GattEvent`]s.
//!
//! [`GattEvent`]: crate::gatt::events::GattEvent

use crate::gatt::types::HandleRange;
use crate::uuid::Uuid;

/// Outcome of asking the transport to start a procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// The request is on its way; responses will follow.
    Accepted,
    /// No room right now; a protocol-available event will follow.
    Busy,
}

/// GATT client procedures used by discovery
pub trait GattTransport {
    /// Discover primary service by service UUID over `range`.
    fn find_primary_service_by_uuid(
        &mut self,
        conn: u16,
        uuid: &Uuid,
        range: HandleRange,
    ) -> RequestStatus;

    /// Discover all characteristics of a service.
    fn discover_all_characteristics(&mut self, conn: u16, range: HandleRange) -> RequestStatus;

    /// Discover all characteristic descriptors in `range`.
    fn discover_all_descriptors(&mut self, conn: u16, range: HandleRange) -> RequestStatus;
}

impl<T: GattTransport + ?Sized> GattTransport for &mut T {
    fn find_primary_service_by_uuid(
        &mut self,
        conn: u16,
        uuid: &Uuid,
        range: HandleRange,
    ) -> RequestStatus {
        (**self).find_primary_service_by_uuid(conn, uuid, range)
    }

    fn discover_all_characteristics(&mut self, conn: u16, range: HandleRange) -> RequestStatus {
        (**self).discover_all_characteristics(conn, range)
    }

    fn discover_all_descriptors(&mut self, conn: u16, range: HandleRange) -> RequestStatus {
        (**self).discover_all_descriptors(conn, range)
    }
}
