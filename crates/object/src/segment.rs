//! A named, attributed region of bytes inside a container.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::{wire, ObjectError, Result};

/// Attribute key for the segment's type tag.
pub const ATTR_TYPE: &str = "type";
/// Attribute key for a segment's base load address (4 bytes, big-endian).
pub const ATTR_ADDRESS: &str = "address";

/// Type-tag value for a segment to be placed directly in memory.
pub const TYPE_MEMORY: &[u8] = b"MEMORY";
/// Type-tag value for the segment carrying the initial program counter.
pub const TYPE_ENTRYPOINT: &[u8] = b"ENTRYPOINT";
/// Type-tag value for the debug information segment.
pub const TYPE_DEBUGINFO: &[u8] = b"DEBUGINFO";

/// One segment: an attribute map plus a raw byte payload.
///
/// Attributes are kept in a sorted map so encoding the same segment twice
/// produces identical bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub attributes: BTreeMap<String, Vec<u8>>,
    pub payload: Vec<u8>,
}

impl Segment {
    pub fn new(attributes: BTreeMap<String, Vec<u8>>, payload: Vec<u8>) -> Self {
        Self { attributes, payload }
    }

    /// A `MEMORY` segment holding `payload` to be loaded at `address`.
    pub fn memory(address: u32, payload: Vec<u8>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_TYPE.to_string(), TYPE_MEMORY.to_vec());
        attributes.insert(ATTR_ADDRESS.to_string(), address.to_be_bytes().to_vec());
        Self::new(attributes, payload)
    }

    /// An `ENTRYPOINT` segment whose `address` attribute is the initial
    /// program counter. Carries no payload.
    pub fn entrypoint(address: u32) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_TYPE.to_string(), TYPE_ENTRYPOINT.to_vec());
        attributes.insert(ATTR_ADDRESS.to_string(), address.to_be_bytes().to_vec());
        Self::new(attributes, Vec::new())
    }

    /// The raw value of the `type` attribute, if present.
    pub fn segment_type(&self) -> Option<&[u8]> {
        self.attributes.get(ATTR_TYPE).map(Vec::as_slice)
    }

    /// The decoded `address` attribute.
    pub fn address(&self) -> Result<u32> {
        let bytes = self
            .attributes
            .get(ATTR_ADDRESS)
            .ok_or(ObjectError::MissingAttribute(ATTR_ADDRESS))?;
        let bytes: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ObjectError::MalformedAttribute(ATTR_ADDRESS))?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn encode(&self, out: &mut impl Write) -> Result<()> {
        wire::write_u32(out, self.attributes.len() as u32)?;
        for (key, value) in &self.attributes {
            wire::write_str(out, key)?;
            wire::write_bytes(out, value)?;
        }
        wire::write_bytes(out, &self.payload)?;
        Ok(())
    }

    pub fn decode(input: &mut impl Read) -> Result<Self> {
        let attribute_count = wire::read_u32(input)?;
        let mut attributes = BTreeMap::new();
        for _ in 0..attribute_count {
            let key = wire::read_str(input)?;
            let value = wire::read_bytes(input)?;
            attributes.insert(key, value);
        }
        let payload = wire::read_bytes(input)?;
        Ok(Self::new(attributes, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_segment_round_trip() {
        let segment = Segment::memory(0x1001_0000, vec![1, 2, 3, 4, 5, 6, 7, 8]);

        let mut buf = Vec::new();
        segment.encode(&mut buf).unwrap();
        let decoded = Segment::decode(&mut buf.as_slice()).unwrap();

        assert_eq!(decoded, segment);
        assert_eq!(decoded.segment_type(), Some(TYPE_MEMORY));
        assert_eq!(decoded.address().unwrap(), 0x1001_0000);
        assert_eq!(decoded.payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_entrypoint_segment() {
        let segment = Segment::entrypoint(0x0040_0000);
        assert_eq!(segment.segment_type(), Some(TYPE_ENTRYPOINT));
        assert_eq!(segment.address().unwrap(), 0x0040_0000);
        assert!(segment.payload.is_empty());
    }

    #[test]
    fn test_missing_address() {
        let segment = Segment::new(BTreeMap::new(), Vec::new());
        assert!(matches!(
            segment.address(),
            Err(ObjectError::MissingAttribute(ATTR_ADDRESS))
        ));
    }

    #[test]
    fn test_malformed_address() {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_ADDRESS.to_string(), vec![0, 1]);
        let segment = Segment::new(attributes, Vec::new());
        assert!(matches!(
            segment.address(),
            Err(ObjectError::MalformedAttribute(ATTR_ADDRESS))
        ));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let segment = Segment::memory(0x0040_0000, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let mut first = Vec::new();
        let mut second = Vec::new();
        segment.encode(&mut first).unwrap();
        segment.encode(&mut second).unwrap();
        assert_eq!(first, second);
    }
}
