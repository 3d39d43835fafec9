//! Per-link discovery bookkeeping.
//!
//! A [`ConnectionRecord`] exists for every link the context has seen connect
//! and not yet disconnect. Its [`DiscoveryCursor`] is scratch state for the
//! service currently being located, taken from a bounded pool.

use crate::att::{ATT_FIND_BY_TYPE_VALUE_REQ, ATT_FIND_INFO_REQ, ATT_READ_BY_TYPE_REQ};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::gatt::types::{CharacteristicProperty, HandleRange};
use log::{debug, warn};

/// Local GAP role on a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapRole {
    Central,
    Peripheral,
}

/// Discovery state of one link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Connected, discovery not started.
    Idle,
    DiscoveringService,
    DiscoveringCharacteristics,
    DiscoveringDescriptors,
    /// Waiting for the link to be encrypted before re-issuing a request.
    PausedForSecurity,
    /// Every template attempted; handles are final.
    Complete,
    /// Discovery suppressed for this link.
    Disabled,
    /// The transport timed out mid-discovery; handles are incomplete.
    TimedOut,
}

impl DiscoveryState {
    pub fn is_discovering(&self) -> bool {
        matches!(
            self,
            DiscoveryState::DiscoveringService
                | DiscoveryState::DiscoveringCharacteristics
                | DiscoveryState::DiscoveringDescriptors
                | DiscoveryState::PausedForSecurity
        )
    }
}

/// The three requests discovery issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOpcode {
    /// Find primary service by UUID.
    FindByTypeValue,
    /// Discover all characteristics of a service.
    ReadByType,
    /// Discover all descriptors of a service.
    FindInformation,
}

impl DiscoveryOpcode {
    pub fn att_opcode(&self) -> u8 {
        match self {
            DiscoveryOpcode::FindByTypeValue => ATT_FIND_BY_TYPE_VALUE_REQ,
            DiscoveryOpcode::ReadByType => ATT_READ_BY_TYPE_REQ,
            DiscoveryOpcode::FindInformation => ATT_FIND_INFO_REQ,
        }
    }

    pub fn from_att_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            ATT_FIND_BY_TYPE_VALUE_REQ => Some(DiscoveryOpcode::FindByTypeValue),
            ATT_READ_BY_TYPE_REQ => Some(DiscoveryOpcode::ReadByType),
            ATT_FIND_INFO_REQ => Some(DiscoveryOpcode::FindInformation),
            _ => None,
        }
    }

    /// State the link is in while this request is outstanding.
    pub fn active_state(&self) -> DiscoveryState {
        match self {
            DiscoveryOpcode::FindByTypeValue => DiscoveryState::DiscoveringService,
            DiscoveryOpcode::ReadByType => DiscoveryState::DiscoveringCharacteristics,
            DiscoveryOpcode::FindInformation => DiscoveryState::DiscoveringDescriptors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// The transport had no room; re-issued on protocol-available.
    TransportBusy,
    /// The peer demanded encryption; re-issued once the link is encrypted.
    Security,
}

/// A request that could not be sent or was refused, held for re-issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredRequest {
    pub reason: DeferReason,
    pub opcode: DiscoveryOpcode,
}

/// Scratch state for the service currently being discovered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryCursor {
    /// Handle range of the most recently reported service instance.
    pub range: HandleRange,
    pub service_found: bool,
    /// At most one request is ever deferred.
    pub deferred: Option<DeferredRequest>,
}

impl DiscoveryCursor {
    pub fn reset(&mut self) {
        *self = DiscoveryCursor::default();
    }
}

/// A resolved handle; zero until found on the peer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveredAttribute {
    pub handle: u16,
    /// Declared properties, characteristics only.
    pub properties: CharacteristicProperty,
}

impl DiscoveredAttribute {
    pub fn is_resolved(&self) -> bool {
        self.handle != 0
    }
}

/// Discovery bookkeeping for one link
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub conn: u16,
    pub role: GapRole,
    /// Index of the template being discovered.
    pub svc_index: usize,
    pub state: DiscoveryState,
    pub cursor: Option<DiscoveryCursor>,
    outputs: Vec<Vec<DiscoveredAttribute>>,
}

impl ConnectionRecord {
    fn new(conn: u16, role: GapRole) -> Self {
        Self {
            conn,
            role,
            svc_index: 0,
            state: DiscoveryState::Idle,
            cursor: None,
            outputs: Vec::new(),
        }
    }

    /// Zeroes the output slots of one service, sizing them to `len` entries.
    pub fn clear_outputs(&mut self, service: usize, len: usize) {
        if self.outputs.len() <= service {
            self.outputs.resize_with(service + 1, Vec::new);
        }
        let slots = &mut self.outputs[service];
        slots.clear();
        slots.resize(len, DiscoveredAttribute::default());
    }

    pub fn outputs(&self, service: usize) -> Option<&[DiscoveredAttribute]> {
        self.outputs.get(service).map(Vec::as_slice)
    }

    pub fn outputs_mut(&mut self, service: usize) -> Option<&mut [DiscoveredAttribute]> {
        self.outputs.get_mut(service).map(Vec::as_mut_slice)
    }

    pub fn deferred(&self) -> Option<DeferredRequest> {
        self.cursor.as_ref().and_then(|cursor| cursor.deferred)
    }
}

/// Fixed number of link slots plus a bounded cursor pool
#[derive(Debug)]
pub struct ConnectionTable {
    slots: Vec<Option<ConnectionRecord>>,
    max_cursors: usize,
    cursors_in_use: usize,
}

impl ConnectionTable {
    pub fn new(max_connections: usize, max_cursors: usize) -> Self {
        Self {
            slots: vec![None; max_connections],
            max_cursors,
            cursors_in_use: 0,
        }
    }

    /// Takes a free slot for `conn`.
    ///
    /// A record already present for the same handle is released first, so a
    /// handle never owns two slots.
    pub fn allocate(&mut self, conn: u16, role: GapRole) -> DiscoveryResult<&mut ConnectionRecord> {
        if self.release(conn).is_some() {
            warn!("connection 0x{:04x} reported twice, resetting its record", conn);
        }

        let capacity = self.slots.len();
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(DiscoveryError::ConnectionTableFull { capacity })?;
        Ok(slot.insert(ConnectionRecord::new(conn, role)))
    }

    /// Drops the record for `conn`, returning its cursor to the pool.
    pub fn release(&mut self, conn: u16) -> Option<ConnectionRecord> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(record) if record.conn == conn))?;
        let record = slot.take()?;
        if record.cursor.is_some() {
            self.cursors_in_use -= 1;
        }
        Some(record)
    }

    pub fn find(&self, conn: u16) -> Option<&ConnectionRecord> {
        self.slots.iter().flatten().find(|record| record.conn == conn)
    }

    pub fn find_mut(&mut self, conn: u16) -> Option<&mut ConnectionRecord> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|record| record.conn == conn)
    }

    /// Gives the record for `conn` a cursor if it has none.
    pub fn acquire_cursor(&mut self, conn: u16) -> DiscoveryResult<()> {
        let pool_exhausted = self.cursors_in_use >= self.max_cursors;
        let record = self
            .slots
            .iter_mut()
            .flatten()
            .find(|record| record.conn == conn)
            .ok_or(DiscoveryError::UnknownConnection(conn))?;

        if record.cursor.is_some() {
            return Ok(());
        }
        if pool_exhausted {
            warn!("cursor pool exhausted, connection 0x{:04x} cannot discover", conn);
            return Err(DiscoveryError::CursorUnavailable { conn });
        }

        record.cursor = Some(DiscoveryCursor::default());
        self.cursors_in_use += 1;
        debug!(
            "cursor acquired for 0x{:04x} ({}/{} in use)",
            conn, self.cursors_in_use, self.max_cursors
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn cursors_in_use(&self) -> usize {
        self.cursors_in_use
    }
}
