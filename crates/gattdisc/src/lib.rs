//! gattdisc - GATT client database discovery for Bluetooth LE links
//!
//! Profiles register the services they expect to find on a peer. For every link
//! the stack reports, the discovery context walks that list against the remote
//! GATT server and resolves the attribute handles the profiles need, pausing
//! when the transport is busy or the peer demands encryption.
//!
//! The crate does not encode ATT PDUs or manage links; it is driven entirely by
//! events from the stack and talks back through the [`GattTransport`] trait.

pub mod att;
pub mod config;
pub mod error;
pub mod gatt;
pub mod uuid;

// Re-export common types for convenience
pub use att::AttErrorCode;
pub use config::{DiscoveryConfig, DiscoveryLimits};
pub use error::{DiscoveryError, DiscoveryResult};
pub use gatt::{
    CharTemplate, CharacteristicProperty, DiscoveredAttribute, DiscoveryContext, DiscoveryEvent,
    DiscoveryState, EventOutcome, GapEvent, GapRole, GattEvent, GattTransport, HandleRange,
    HandleUuidPair, RequestStatus, ServiceId, ServiceTemplate, StackEvent, TemplateFlags,
};
pub use uuid::Uuid;
