//! The per-link discovery state machine.
//!
//! For each registered template, in order: locate the service by UUID,
//! enumerate its characteristics, enumerate its descriptors when the template
//! asks for any, then move to the next template. After the last one the link
//! is `Complete` and a completion event is queued.
//!
//! Every step that talks to the transport can be deferred, either because the
//! transport is busy or because the peer requires encryption. The deferred
//! opcode is all that is kept; the cursor already holds the range and the
//! record the template index, which is enough to rebuild the request.

use crate::att::{AttErrorCode, ATT_HANDLE_MAX, ATT_HANDLE_MIN};
use crate::gatt::connection::{
    ConnectionRecord, DeferReason, DeferredRequest, DiscoveryOpcode, DiscoveryState, GapRole,
};
use crate::gatt::events::DiscoveryEvent;
use crate::gatt::registry::{DiscoveryRegistry, TemplateFlags};
use crate::gatt::transport::{GattTransport, RequestStatus};
use crate::gatt::types::{CharacteristicDeclaration, HandleRange, HandleUuidPair};
use log::{debug, info, trace, warn};

fn role_flag(role: GapRole) -> TemplateFlags {
    match role {
        GapRole::Central => TemplateFlags::CENTRAL,
        GapRole::Peripheral => TemplateFlags::PERIPHERAL,
    }
}

/// Drives discovery for one record at a time.
///
/// Borrowed per inbound event; events for the application are pushed to
/// `events` and published by the caller once the engine is done.
pub struct DiscoveryEngine<'a, T: GattTransport> {
    registry: &'a DiscoveryRegistry,
    transport: &'a mut T,
    events: &'a mut Vec<DiscoveryEvent>,
}

impl<'a, T: GattTransport> DiscoveryEngine<'a, T> {
    pub fn new(
        registry: &'a DiscoveryRegistry,
        transport: &'a mut T,
        events: &'a mut Vec<DiscoveryEvent>,
    ) -> Self {
        Self {
            registry,
            transport,
            events,
        }
    }

    /// Begins discovery from the first template. The record must hold a cursor.
    pub fn start(&mut self, record: &mut ConnectionRecord) {
        info!(
            "starting discovery on 0x{:04x} ({} services)",
            record.conn,
            self.registry.len()
        );
        record.svc_index = 0;
        if let Some(cursor) = record.cursor.as_mut() {
            cursor.reset();
        }
        self.begin_service(record);
    }

    fn begin_service(&mut self, record: &mut ConnectionRecord) {
        let Some(template) = self.registry.get(record.svc_index) else {
            self.finish(record);
            return;
        };
        let Some(cursor) = record.cursor.as_mut() else {
            warn!("connection 0x{:04x} lost its cursor mid-discovery", record.conn);
            record.state = DiscoveryState::Idle;
            return;
        };

        cursor.reset();
        record.clear_outputs(record.svc_index, template.chars.len());
        debug!(
            "0x{:04x}: locating service #{} {:?}",
            record.conn, record.svc_index, template.uuid
        );
        self.issue(record, DiscoveryOpcode::FindByTypeValue);
    }

    /// Hands `opcode` to the transport, deferring it if the transport is busy.
    fn issue(&mut self, record: &mut ConnectionRecord, opcode: DiscoveryOpcode) {
        let conn = record.conn;
        let Some(cursor) = record.cursor.as_mut() else {
            return;
        };

        let status = match opcode {
            DiscoveryOpcode::FindByTypeValue => {
                let Some(template) = self.registry.get(record.svc_index) else {
                    return;
                };
                self.transport.find_primary_service_by_uuid(
                    conn,
                    &template.uuid,
                    HandleRange::new(ATT_HANDLE_MIN, ATT_HANDLE_MAX),
                )
            }
            DiscoveryOpcode::ReadByType => {
                self.transport.discover_all_characteristics(conn, cursor.range)
            }
            DiscoveryOpcode::FindInformation => {
                self.transport.discover_all_descriptors(conn, cursor.range)
            }
        };

        record.state = opcode.active_state();
        match status {
            RequestStatus::Accepted => {
                cursor.deferred = None;
                trace!("0x{:04x}: {:?} accepted", conn, opcode);
            }
            RequestStatus::Busy => {
                cursor.deferred = Some(DeferredRequest {
                    reason: DeferReason::TransportBusy,
                    opcode,
                });
                debug!("0x{:04x}: transport busy, {:?} deferred", conn, opcode);
            }
        }
    }

    /// A response belongs to the live procedure only in `state` and only when
    /// the request was actually sent.
    fn expects_response(record: &ConnectionRecord, state: DiscoveryState) -> bool {
        record.state == state && record.cursor.is_some() && record.deferred().is_none()
    }

    pub fn on_service_response(
        &mut self,
        record: &mut ConnectionRecord,
        handles: &[HandleRange],
        finished: bool,
    ) -> bool {
        if !Self::expects_response(record, DiscoveryState::DiscoveringService) {
            return false;
        }

        if let (Some(cursor), Some(range)) = (record.cursor.as_mut(), handles.last()) {
            cursor.range = *range;
            cursor.service_found = true;
            debug!(
                "0x{:04x}: service #{} at 0x{:04x}..0x{:04x}",
                record.conn, record.svc_index, range.start, range.end
            );
        }

        if finished {
            self.service_located(record);
        }
        true
    }

    fn service_located(&mut self, record: &mut ConnectionRecord) {
        let found = record
            .cursor
            .as_ref()
            .is_some_and(|cursor| cursor.service_found);

        if found {
            self.issue(record, DiscoveryOpcode::ReadByType);
        } else {
            debug!(
                "0x{:04x}: service #{} not on peer, skipping",
                record.conn, record.svc_index
            );
            self.advance(record);
        }
    }

    pub fn on_characteristics_response(
        &mut self,
        record: &mut ConnectionRecord,
        pair_len: u8,
        data: &[u8],
        finished: bool,
    ) -> bool {
        if !Self::expects_response(record, DiscoveryState::DiscoveringCharacteristics) {
            return false;
        }
        let Some(template) = self.registry.get(record.svc_index) else {
            return false;
        };

        let declarations = CharacteristicDeclaration::parse_list(pair_len, data);
        if declarations.is_empty() && !data.is_empty() {
            warn!(
                "0x{:04x}: ignoring characteristics with pair length 0x{:02x}",
                record.conn, pair_len
            );
        }

        let role = role_flag(record.role);
        let conn = record.conn;
        if let Some(outputs) = record.outputs_mut(record.svc_index) {
            for declaration in &declarations {
                for (entry, slot) in template.chars.iter().zip(outputs.iter_mut()) {
                    if entry.is_descriptor()
                        || !entry.flags.contains(role)
                        || entry.uuid != declaration.uuid
                    {
                        continue;
                    }
                    slot.handle = declaration.value_handle;
                    slot.properties = declaration.properties;
                    trace!(
                        "0x{:04x}: characteristic {:?} -> 0x{:04x}",
                        conn,
                        entry.uuid,
                        declaration.value_handle
                    );
                }
            }
        }

        if finished {
            self.characteristics_done(record);
        }
        true
    }

    fn characteristics_done(&mut self, record: &mut ConnectionRecord) {
        let Some(template) = self.registry.get(record.svc_index) else {
            return;
        };
        let role = role_flag(record.role);
        let descriptors_pending = record.outputs(record.svc_index).is_some_and(|outputs| {
            template
                .chars
                .iter()
                .zip(outputs)
                .any(|(entry, slot)| {
                    entry.is_descriptor() && entry.flags.contains(role) && !slot.is_resolved()
                })
        });

        if descriptors_pending {
            self.issue(record, DiscoveryOpcode::FindInformation);
        } else {
            self.advance(record);
        }
    }

    pub fn on_descriptors_response(
        &mut self,
        record: &mut ConnectionRecord,
        pairs: &[HandleUuidPair],
        finished: bool,
    ) -> bool {
        if !Self::expects_response(record, DiscoveryState::DiscoveringDescriptors) {
            return false;
        }
        let Some(template) = self.registry.get(record.svc_index) else {
            return false;
        };

        let role = role_flag(record.role);
        let conn = record.conn;
        if let Some(outputs) = record.outputs_mut(record.svc_index) {
            for pair in pairs {
                let uuid = pair.uuid();
                // First unresolved entry wins; resolved entries never move.
                let slot = template
                    .chars
                    .iter()
                    .zip(outputs.iter_mut())
                    .find(|(entry, slot)| {
                        entry.is_descriptor()
                            && entry.flags.contains(role)
                            && !slot.is_resolved()
                            && entry.uuid == uuid
                    })
                    .map(|(_, slot)| slot);
                if let Some(slot) = slot {
                    slot.handle = pair.handle();
                    trace!("0x{:04x}: descriptor {:?} -> 0x{:04x}", conn, uuid, slot.handle);
                }
            }
        }

        if finished {
            self.advance(record);
        }
        true
    }

    pub fn on_error_response(
        &mut self,
        record: &mut ConnectionRecord,
        request_opcode: u8,
        error: AttErrorCode,
    ) -> bool {
        let Some(opcode) = DiscoveryOpcode::from_att_opcode(request_opcode) else {
            return false;
        };
        if !Self::expects_response(record, opcode.active_state()) {
            return false;
        }

        if error.is_security_error() {
            if let Some(cursor) = record.cursor.as_mut() {
                cursor.deferred = Some(DeferredRequest {
                    reason: DeferReason::Security,
                    opcode,
                });
            }
            record.state = DiscoveryState::PausedForSecurity;
            info!(
                "0x{:04x}: {:?} refused with {:?}, waiting for encryption",
                record.conn, opcode, error
            );
            self.events
                .push(DiscoveryEvent::SecurityRequired { conn: record.conn });
            return true;
        }

        if !error.is_not_found() {
            warn!(
                "0x{:04x}: {:?} failed with {:?}, ending procedure",
                record.conn, opcode, error
            );
        }

        match opcode {
            DiscoveryOpcode::FindByTypeValue => self.service_located(record),
            DiscoveryOpcode::ReadByType => self.characteristics_done(record),
            DiscoveryOpcode::FindInformation => self.advance(record),
        }
        true
    }

    /// Re-issues a request deferred because the transport was busy.
    pub fn on_protocol_available(&mut self, record: &mut ConnectionRecord) -> bool {
        match record.deferred() {
            Some(DeferredRequest {
                reason: DeferReason::TransportBusy,
                opcode,
            }) => {
                debug!("0x{:04x}: transport free, re-issuing {:?}", record.conn, opcode);
                self.issue(record, opcode);
                true
            }
            _ => false,
        }
    }

    /// Re-issues a request the peer refused for lack of encryption.
    pub fn resume_after_encryption(&mut self, record: &mut ConnectionRecord) -> bool {
        match record.deferred() {
            Some(DeferredRequest {
                reason: DeferReason::Security,
                opcode,
            }) => {
                info!("0x{:04x}: link encrypted, resuming {:?}", record.conn, opcode);
                self.issue(record, opcode);
                true
            }
            _ => false,
        }
    }

    /// Abandons discovery on a link whose transport gave up.
    ///
    /// The link rests in `TimedOut` until the application restarts it.
    pub fn on_timeout(&mut self, record: &mut ConnectionRecord) -> bool {
        if !record.state.is_discovering() {
            return false;
        }

        warn!(
            "0x{:04x}: procedure timed out in {:?} at service #{}",
            record.conn, record.state, record.svc_index
        );
        if let Some(cursor) = record.cursor.as_mut() {
            cursor.deferred = None;
        }
        record.state = DiscoveryState::TimedOut;
        self.events
            .push(DiscoveryEvent::DiscoveryTimedOut { conn: record.conn });
        true
    }

    fn advance(&mut self, record: &mut ConnectionRecord) {
        record.svc_index += 1;
        self.begin_service(record);
    }

    fn finish(&mut self, record: &mut ConnectionRecord) {
        if let Some(cursor) = record.cursor.as_mut() {
            cursor.deferred = None;
        }
        record.state = DiscoveryState::Complete;
        info!("discovery complete on 0x{:04x}", record.conn);
        self.events
            .push(DiscoveryEvent::DiscoveryComplete { conn: record.conn });
    }
}
