//! The discovery context: the one object the stack drives.
//!
//! A [`DiscoveryContext`] owns the template registry, the connection table and
//! the transport. The stack feeds it every event through
//! [`handle_stack_event`](DiscoveryContext::handle_stack_event); it keeps link
//! bookkeeping current, steps the discovery engine, and republishes a small set
//! of [`DiscoveryEvent`]s to the application callback.

use crate::config::{DiscoveryConfig, DiscoveryLimits};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::gatt::connection::{
    ConnectionTable, DeferredRequest, DiscoveredAttribute, DiscoveryState, GapRole,
};
use crate::gatt::engine::DiscoveryEngine;
use crate::gatt::events::{DiscoveryEvent, EventOutcome, GapEvent, GattEvent, StackEvent};
use crate::gatt::registry::{DiscoveryRegistry, ServiceId, ServiceTemplate};
use crate::gatt::transport::GattTransport;
use crate::gatt::types::HandleRange;
use log::{debug, info, trace, warn};

/// Callback receiving application-level discovery events
pub type DiscoveryCallback = Box<dyn FnMut(DiscoveryEvent) + Send + 'static>;

/// Registry, link table and transport for one GATT client
pub struct DiscoveryContext<T: GattTransport> {
    registry: DiscoveryRegistry,
    connections: ConnectionTable,
    transport: T,
    callback: Option<DiscoveryCallback>,
}

impl<T: GattTransport> std::fmt::Debug for DiscoveryContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryContext")
            .field("registry", &self.registry)
            .field("connections", &self.connections)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

fn role_enabled(config: &DiscoveryConfig, role: GapRole) -> bool {
    match role {
        GapRole::Central => config.discover_as_central,
        GapRole::Peripheral => config.discover_as_peripheral,
    }
}

impl<T: GattTransport> DiscoveryContext<T> {
    /// Creates a context with default limits
    pub fn new(transport: T) -> Self {
        Self::with_limits(transport, DiscoveryLimits::default())
    }

    pub fn with_limits(transport: T, limits: DiscoveryLimits) -> Self {
        Self {
            registry: DiscoveryRegistry::new(limits.max_services, limits.max_chars_per_service),
            connections: ConnectionTable::new(limits.max_connections, limits.max_cursors),
            transport,
            callback: None,
        }
    }

    /// Adds a service to look for on every link
    pub fn register_service(&mut self, template: ServiceTemplate) -> DiscoveryResult<ServiceId> {
        let id = self.registry.register(template)?;
        debug!("registered service template #{}", id.0);
        Ok(id)
    }

    /// Sets the callback for application events, replacing any previous one
    pub fn set_event_callback<F>(&mut self, callback: F)
    where
        F: FnMut(DiscoveryEvent) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Single entry point for every event the stack raises.
    ///
    /// `config` is read on connect and encryption; `skip_once` is cleared
    /// when it takes effect. Errors report resource exhaustion only; the link
    /// itself is never affected.
    pub fn handle_stack_event(
        &mut self,
        config: &mut DiscoveryConfig,
        event: StackEvent,
    ) -> DiscoveryResult<EventOutcome> {
        trace!("stack event {:?}", event);
        match event {
            StackEvent::Gap(event) => self.handle_gap_event(config, event),
            StackEvent::Gatt(event) => Ok(self.handle_gatt_event(event)),
        }
    }

    fn handle_gap_event(
        &mut self,
        config: &mut DiscoveryConfig,
        event: GapEvent,
    ) -> DiscoveryResult<EventOutcome> {
        match event {
            GapEvent::Connected { conn, role, status } => {
                if status != 0 {
                    debug!("connection attempt failed with status 0x{:02x}", status);
                    return Ok(EventOutcome::Dropped);
                }
                self.publish(DiscoveryEvent::Connected { conn });
                self.on_connected(config, conn, role)?;
                Ok(EventOutcome::Handled)
            }
            GapEvent::Disconnected { conn, reason } => {
                match self.connections.release(conn) {
                    Some(record) => info!(
                        "0x{:04x} disconnected (reason 0x{:02x}) in {:?}",
                        conn, reason, record.state
                    ),
                    None => debug!("0x{:04x} disconnected without a record", conn),
                }
                self.publish(DiscoveryEvent::Disconnected { conn });
                Ok(EventOutcome::Handled)
            }
            GapEvent::EncryptionChanged { conn, status } => {
                if status != 0 {
                    return Ok(EventOutcome::Dropped);
                }
                self.on_encrypted(config, conn)
            }
            GapEvent::Other { .. } => Ok(EventOutcome::PassThrough),
        }
    }

    fn on_connected(
        &mut self,
        config: &mut DiscoveryConfig,
        conn: u16,
        role: GapRole,
    ) -> DiscoveryResult<()> {
        let record = match self.connections.allocate(conn, role) {
            Ok(record) => record,
            Err(err) => {
                warn!("0x{:04x}: {}", conn, err);
                return Err(err);
            }
        };

        // Decided before any cursor is taken; a skipped link holds none.
        if config.skip_once {
            config.skip_once = false;
            record.state = DiscoveryState::Disabled;
            info!("0x{:04x}: handles already known, discovery skipped", conn);
            return Ok(());
        }
        if !role_enabled(config, role) {
            debug!("0x{:04x}: discovery disabled for {:?} role", conn, role);
            return Ok(());
        }
        if config.wait_for_security {
            debug!("0x{:04x}: discovery waits for encryption", conn);
            return Ok(());
        }

        self.connections.acquire_cursor(conn)?;
        self.start(conn);
        Ok(())
    }

    fn on_encrypted(
        &mut self,
        config: &DiscoveryConfig,
        conn: u16,
    ) -> DiscoveryResult<EventOutcome> {
        let Some(record) = self.connections.find_mut(conn) else {
            return Ok(EventOutcome::Dropped);
        };

        let mut events = Vec::new();
        let resumed = DiscoveryEngine::new(&self.registry, &mut self.transport, &mut events)
            .resume_after_encryption(record);
        if resumed {
            self.publish_all(events);
            return Ok(EventOutcome::Handled);
        }

        let deferred_start = config.wait_for_security
            && record.state == DiscoveryState::Idle
            && role_enabled(config, record.role);
        if !deferred_start {
            return Ok(EventOutcome::Dropped);
        }

        self.connections.acquire_cursor(conn)?;
        self.start(conn);
        Ok(EventOutcome::Handled)
    }

    fn handle_gatt_event(&mut self, event: GattEvent) -> EventOutcome {
        let conn = match &event {
            GattEvent::ErrorResponse { conn, .. }
            | GattEvent::ServiceByUuidResponse { conn, .. }
            | GattEvent::CharacteristicsResponse { conn, .. }
            | GattEvent::DescriptorsResponse { conn, .. }
            | GattEvent::ProtocolAvailable { conn }
            | GattEvent::Timeout { conn } => *conn,
            GattEvent::Other { .. } => return EventOutcome::PassThrough,
        };

        let Some(record) = self.connections.find_mut(conn) else {
            trace!("dropping GATT event for unknown connection 0x{:04x}", conn);
            return EventOutcome::Dropped;
        };
        if !record.state.is_discovering() {
            trace!("dropping GATT event for idle connection 0x{:04x}", conn);
            return EventOutcome::Dropped;
        }

        let mut events = Vec::new();
        let mut engine = DiscoveryEngine::new(&self.registry, &mut self.transport, &mut events);
        let handled = match event {
            GattEvent::ErrorResponse {
                request_opcode,
                error,
                ..
            } => engine.on_error_response(record, request_opcode, error),
            GattEvent::ServiceByUuidResponse {
                handles, finished, ..
            } => engine.on_service_response(record, &handles, finished),
            GattEvent::CharacteristicsResponse {
                pair_len,
                data,
                finished,
                ..
            } => engine.on_characteristics_response(record, pair_len, &data, finished),
            GattEvent::DescriptorsResponse {
                pairs, finished, ..
            } => engine.on_descriptors_response(record, &pairs, finished),
            GattEvent::ProtocolAvailable { .. } => engine.on_protocol_available(record),
            GattEvent::Timeout { .. } => engine.on_timeout(record),
            GattEvent::Other { .. } => false,
        };

        self.publish_all(events);
        if handled {
            EventOutcome::Handled
        } else {
            EventOutcome::Dropped
        }
    }

    /// Starts discovery over from the first service on `conn`.
    ///
    /// Used when the peer reports its attribute database changed. Any deferred
    /// request is dropped and every output slot is zeroed again as its service
    /// comes up.
    pub fn restart_discovery(&mut self, conn: u16) -> DiscoveryResult<()> {
        if self.connections.find(conn).is_none() {
            return Err(DiscoveryError::UnknownConnection(conn));
        }
        self.connections.acquire_cursor(conn)?;
        self.start(conn);
        Ok(())
    }

    fn start(&mut self, conn: u16) {
        let Some(record) = self.connections.find_mut(conn) else {
            return;
        };
        let mut events = Vec::new();
        DiscoveryEngine::new(&self.registry, &mut self.transport, &mut events).start(record);
        self.publish_all(events);
    }

    fn publish_all(&mut self, events: Vec<DiscoveryEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    fn publish(&mut self, event: DiscoveryEvent) {
        debug!("publishing {:?}", event);
        if let Some(callback) = self.callback.as_mut() {
            callback(event);
        }
    }

    /// Resolved handles of `service` on `conn`, in template order.
    ///
    /// `None` until discovery has reached that service on this link.
    pub fn discovered(&self, conn: u16, service: ServiceId) -> Option<&[DiscoveredAttribute]> {
        self.connections.find(conn)?.outputs(service.0)
    }

    pub fn state(&self, conn: u16) -> Option<DiscoveryState> {
        self.connections.find(conn).map(|record| record.state)
    }

    pub fn is_discovering(&self, conn: u16) -> bool {
        self.state(conn).is_some_and(|state| state.is_discovering())
    }

    /// Index of the template currently being discovered on `conn`.
    pub fn service_index(&self, conn: u16) -> Option<usize> {
        self.connections.find(conn).map(|record| record.svc_index)
    }

    /// Handle range of the service instance last located on `conn`.
    pub fn service_range(&self, conn: u16) -> Option<HandleRange> {
        let cursor = self.connections.find(conn)?.cursor.as_ref()?;
        cursor.service_found.then_some(cursor.range)
    }

    pub fn deferred_request(&self, conn: u16) -> Option<DeferredRequest> {
        self.connections.find(conn)?.deferred()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn cursors_in_use(&self) -> usize {
        self.connections.cursors_in_use()
    }

    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
