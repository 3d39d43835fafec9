//! Discovery policy and capacity configuration.

/// Policy inputs deciding when discovery starts on a new link.
///
/// Owned by the caller and handed to every `handle_stack_event` call.
/// `skip_once` is consumed by the first connection it suppresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Hold discovery until the link reports successful encryption.
    pub wait_for_security: bool,
    /// Discover when the local device is central on the link.
    pub discover_as_central: bool,
    /// Discover when the local device is peripheral on the link.
    pub discover_as_peripheral: bool,
    /// Handles are already known for the next link; do not discover it.
    pub skip_once: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            wait_for_security: false,
            discover_as_central: true,
            discover_as_peripheral: true,
            skip_once: false,
        }
    }
}

/// Fixed capacities of the discovery context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryLimits {
    /// Maximum number of registered service templates.
    pub max_services: usize,
    /// Maximum number of concurrently tracked links.
    pub max_connections: usize,
    /// Size of the discovery cursor pool.
    pub max_cursors: usize,
    /// Maximum template entries in one service.
    pub max_chars_per_service: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_services: 8,
            max_connections: 4,
            max_cursors: 4,
            max_chars_per_service: 16,
        }
    }
}
