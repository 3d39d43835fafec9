//! GATT client database discovery
//!
//! This module resolves, per link, the attribute handles of a fixed list of
//! expected services, characteristics and descriptors on the remote server.

pub mod connection;
pub mod context;
pub mod engine;
pub mod events;
pub mod registry;
pub mod transport;
pub mod types;


pub use connection::{
    DeferReason, DeferredRequest, DiscoveredAttribute, DiscoveryOpcode, DiscoveryState, GapRole,
};
pub use context::{DiscoveryCallback, DiscoveryContext};
pub use events::{DiscoveryEvent, EventOutcome, GapEvent, GattEvent, StackEvent};
pub use registry::{CharTemplate, ServiceId, ServiceTemplate, TemplateFlags};
pub use transport::{GattTransport, RequestStatus};
pub use types::{CharacteristicDeclaration, CharacteristicProperty, HandleRange, HandleUuidPair};
