//! Common types for GATT discovery
//!
//! Structured pieces of discovery responses: handle ranges from service
//! location, characteristic declarations from characteristic enumeration, and
//! handle/UUID pairs from descriptor enumeration.

use crate::att::{CHAR_DECL_PAIR_LEN_UUID128, CHAR_DECL_PAIR_LEN_UUID16};
use crate::uuid::Uuid;
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

bitflags! {
    /// Characteristic properties as declared by the server
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CharacteristicProperty: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

impl CharacteristicProperty {
    pub fn can_read(&self) -> bool {
        self.contains(Self::READ)
    }

    pub fn can_write(&self) -> bool {
        self.contains(Self::WRITE)
    }

    pub fn can_notify(&self) -> bool {
        self.contains(Self::NOTIFY)
    }

    pub fn can_indicate(&self) -> bool {
        self.contains(Self::INDICATE)
    }
}

/// Attribute handle range of one service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleRange {
    /// Service declaration handle
    pub start: u16,
    /// Last handle of the service group
    pub end: u16,
}

impl HandleRange {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }
}

/// One characteristic declaration out of a read-by-type response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDeclaration {
    /// Declaration attribute handle
    pub handle: u16,
    /// Declared properties
    pub properties: CharacteristicProperty,
    /// Handle of the characteristic value
    pub value_handle: u16,
    /// Characteristic type
    pub uuid: Uuid,
}

impl CharacteristicDeclaration {
    /// Splits read-by-type attribute data into declarations.
    ///
    /// `pair_len` selects the UUID form: 0x07 carries a 16-bit UUID, 0x15 a
    /// 128-bit one. Any other length yields no declarations, as does a trailing
    /// fragment shorter than `pair_len`.
    pub fn parse_list(pair_len: u8, data: &[u8]) -> Vec<Self> {
        let uuid_len = match pair_len {
            CHAR_DECL_PAIR_LEN_UUID16 => 2,
            CHAR_DECL_PAIR_LEN_UUID128 => 16,
            _ => return Vec::new(),
        };

        data.chunks_exact(pair_len as usize)
            .filter_map(|chunk| Self::parse_one(chunk, uuid_len))
            .collect()
    }

    fn parse_one(chunk: &[u8], uuid_len: usize) -> Option<Self> {
        let mut cursor = Cursor::new(chunk);
        let handle = cursor.read_u16::<LittleEndian>().ok()?;
        let properties = CharacteristicProperty::from_bits_truncate(cursor.read_u8().ok()?);
        let value_handle = cursor.read_u16::<LittleEndian>().ok()?;

        let mut uuid_bytes = [0u8; 16];
        cursor.read_exact(&mut uuid_bytes[..uuid_len]).ok()?;
        let uuid = Uuid::try_from_slice_le(&uuid_bytes[..uuid_len])?;

        Some(Self {
            handle,
            properties,
            value_handle,
            uuid,
        })
    }
}

/// Handle-UUID pair in a find-information response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleUuidPair {
    /// 16-bit UUID
    Uuid16(u16, u16),
    /// 128-bit UUID
    Uuid128(u16, Uuid),
}

impl HandleUuidPair {
    pub fn handle(&self) -> u16 {
        match self {
            HandleUuidPair::Uuid16(handle, _) | HandleUuidPair::Uuid128(handle, _) => *handle,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            HandleUuidPair::Uuid16(_, uuid16) => Uuid::from_u16(*uuid16),
            HandleUuidPair::Uuid128(_, uuid) => *uuid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid16_declarations() {
        let data = [
            0x02, 0x00, 0x02, 0x03, 0x00, 0x00, 0x2A, // device name
            0x04, 0x00, 0x12, 0x05, 0x00, 0x19, 0x2A, // battery level
            0x06, 0x00, // trailing fragment
        ];
        let decls = CharacteristicDeclaration::parse_list(CHAR_DECL_PAIR_LEN_UUID16, &data);

        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].value_handle, 0x0003);
        assert_eq!(decls[0].uuid, 0x2A00u16);
        assert_eq!(decls[1].handle, 0x0004);
        assert!(decls[1].properties.can_read());
        assert!(decls[1].properties.can_notify());
        assert_eq!(decls[1].uuid, 0x2A19u16);
    }

    #[test]
    fn test_parse_uuid128_declaration() {
        let uuid = Uuid::from_bytes_le([
            0x9E, 0xCA, 0xDC, 0x24, 0x0E, 0xE5, 0xA9, 0xE0, 0x93, 0xF3, 0xA3, 0xB5, 0x03, 0x00,
            0x40, 0x6E,
        ]);
        let mut data = vec![0x10, 0x00, 0x10, 0x11, 0x00];
        data.extend_from_slice(uuid.as_bytes_le());

        let decls = CharacteristicDeclaration::parse_list(CHAR_DECL_PAIR_LEN_UUID128, &data);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].value_handle, 0x0011);
        assert_eq!(decls[0].uuid, uuid);
    }

    #[test]
    fn test_unknown_pair_length() {
        assert!(CharacteristicDeclaration::parse_list(0x09, &[0u8; 9]).is_empty());
    }

    #[test]
    fn test_handle_uuid_pair_normalizes() {
        let pair = HandleUuidPair::Uuid16(0x0013, 0x2902);
        assert_eq!(pair.handle(), 0x0013);
        assert_eq!(pair.uuid(), Uuid::from_u16(0x2902));
    }
}
