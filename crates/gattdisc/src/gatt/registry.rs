//! Registry of the services a client expects to find on its peers.
//!
//! Profiles register one [`ServiceTemplate`] per service at start-up. The
//! registry only grows; the order of registration is the order in which the
//! discovery engine walks the services on every link.

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::uuid::Uuid;
use bitflags::bitflags;

bitflags! {
    /// Per-entry flags of a service template
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TemplateFlags: u8 {
        /// Entry names a descriptor, resolved by descriptor enumeration.
        const DESCRIPTOR = 0x01;
        /// Resolve this entry when the local device is central.
        const CENTRAL = 0x02;
        /// Resolve this entry when the local device is peripheral.
        const PERIPHERAL = 0x04;
        const ANY_ROLE = Self::CENTRAL.bits() | Self::PERIPHERAL.bits();
    }
}

/// One characteristic or descriptor to resolve inside a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharTemplate {
    pub uuid: Uuid,
    pub flags: TemplateFlags,
}

impl CharTemplate {
    /// A characteristic resolved in either role.
    pub fn characteristic(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            flags: TemplateFlags::ANY_ROLE,
        }
    }

    /// A descriptor resolved in either role.
    pub fn descriptor(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            flags: TemplateFlags::ANY_ROLE | TemplateFlags::DESCRIPTOR,
        }
    }

    /// Restricts the entry to the given roles, keeping the descriptor flag.
    pub fn in_roles(mut self, roles: TemplateFlags) -> Self {
        let descriptor = self.flags & TemplateFlags::DESCRIPTOR;
        self.flags = descriptor | (roles & TemplateFlags::ANY_ROLE);
        self
    }

    pub fn is_descriptor(&self) -> bool {
        self.flags.contains(TemplateFlags::DESCRIPTOR)
    }
}

/// A service the client expects on the peer, and what to resolve inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTemplate {
    pub uuid: Uuid,
    pub chars: Vec<CharTemplate>,
}

impl ServiceTemplate {
    pub fn new(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            chars: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, uuid: impl Into<Uuid>) -> Self {
        self.chars.push(CharTemplate::characteristic(uuid));
        self
    }

    pub fn with_descriptor(mut self, uuid: impl Into<Uuid>) -> Self {
        self.chars.push(CharTemplate::descriptor(uuid));
        self
    }

    pub fn with_entry(mut self, entry: CharTemplate) -> Self {
        self.chars.push(entry);
        self
    }

    pub fn has_descriptors(&self) -> bool {
        self.chars.iter().any(CharTemplate::is_descriptor)
    }
}

/// Index of a registered template, also the index of its output slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub usize);

/// Fixed-capacity, grow-only list of service templates
#[derive(Debug, Clone)]
pub struct DiscoveryRegistry {
    templates: Vec<ServiceTemplate>,
    capacity: usize,
    max_chars: usize,
}

impl DiscoveryRegistry {
    pub fn new(capacity: usize, max_chars: usize) -> Self {
        Self {
            templates: Vec::with_capacity(capacity),
            capacity,
            max_chars,
        }
    }

    /// Appends a template.
    ///
    /// Fails once `capacity` templates are registered, or when the template is
    /// empty or larger than the per-service limit.
    pub fn register(&mut self, template: ServiceTemplate) -> DiscoveryResult<ServiceId> {
        if self.templates.len() >= self.capacity {
            return Err(DiscoveryError::RegistryFull {
                capacity: self.capacity,
            });
        }
        if template.chars.is_empty() {
            return Err(DiscoveryError::EmptyTemplate);
        }
        if template.chars.len() > self.max_chars {
            return Err(DiscoveryError::TooManyCharacteristics {
                max: self.max_chars,
                got: template.chars.len(),
            });
        }

        self.templates.push(template);
        Ok(ServiceId(self.templates.len() - 1))
    }

    pub fn get(&self, index: usize) -> Option<&ServiceTemplate> {
        self.templates.get(index)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceTemplate> {
        self.templates.iter()
    }
}
