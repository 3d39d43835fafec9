//! Error types for the gattdisc library
//!
//! Only resource exhaustion and caller mistakes are errors. Busy transports and
//! stale responses are part of normal discovery and never surface here.

use thiserror::Error;

/// Errors returned by the discovery context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("service registry is full ({capacity} templates)")]
    RegistryFull { capacity: usize },

    #[error("connection table is full ({capacity} links)")]
    ConnectionTableFull { capacity: usize },

    #[error("no discovery cursor available for connection 0x{conn:04x}")]
    CursorUnavailable { conn: u16 },

    #[error("unknown connection handle 0x{0:04x}")]
    UnknownConnection(u16),

    #[error("service template has no characteristics")]
    EmptyTemplate,

    #[error("service template has {got} characteristics, at most {max} allowed")]
    TooManyCharacteristics { max: usize, got: usize },
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
