//! Source-level debug information carried in a `DEBUGINFO` segment.
//!
//! Maps addresses to 1-based source lines and back, and keeps the label
//! table and input path so a debugger can show symbols without the
//! original source layout in memory.

use std::collections::BTreeMap;

use crate::segment::{Segment, ATTR_TYPE, TYPE_DEBUGINFO};
use crate::{wire, ObjectError, Result};

const ATTR_INPUT_PATH: &str = "inputPath";
const ATTR_LABELS: &str = "labels";
const ATTR_LINE_TO_ADDRESS: &str = "lineToAddress";
const ATTR_ADDRESS_TO_LINE: &str = "addressToLine";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub input_path: String,
    pub labels: BTreeMap<String, u32>,
    line_to_address: BTreeMap<u32, u32>,
    address_to_line: BTreeMap<u32, u32>,
}

impl DebugInfo {
    pub fn new(input_path: String, labels: BTreeMap<String, u32>) -> Self {
        Self {
            input_path,
            labels,
            line_to_address: BTreeMap::new(),
            address_to_line: BTreeMap::new(),
        }
    }

    /// Record that the instruction at `address` came from source `line`.
    pub fn record(&mut self, line: u32, address: u32) {
        self.line_to_address.insert(line, address);
        self.address_to_line.insert(address, line);
    }

    /// The address of the first instruction at or after `line`.
    pub fn line_to_address(&self, line: u32) -> Option<u32> {
        self.line_to_address.range(line..).next().map(|(_, &a)| a)
    }

    /// The source line of the instruction at or before `address`.
    pub fn address_to_line(&self, address: u32) -> Option<u32> {
        self.address_to_line
            .range(..=address)
            .next_back()
            .map(|(_, &l)| l)
    }

    pub fn to_segment(&self) -> Segment {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_TYPE.to_string(), TYPE_DEBUGINFO.to_vec());
        attributes.insert(
            ATTR_INPUT_PATH.to_string(),
            self.input_path.as_bytes().to_vec(),
        );
        attributes.insert(ATTR_LABELS.to_string(), encode_label_map(&self.labels));
        attributes.insert(
            ATTR_LINE_TO_ADDRESS.to_string(),
            encode_u32_map(&self.line_to_address),
        );
        attributes.insert(
            ATTR_ADDRESS_TO_LINE.to_string(),
            encode_u32_map(&self.address_to_line),
        );
        Segment::new(attributes, Vec::new())
    }

    pub fn from_segment(segment: &Segment) -> Result<Self> {
        let input_path = segment
            .attributes
            .get(ATTR_INPUT_PATH)
            .ok_or(ObjectError::MissingAttribute(ATTR_INPUT_PATH))?;
        let input_path = String::from_utf8(input_path.clone())?;

        let labels = decode_label_map(attribute(segment, ATTR_LABELS)?)?;
        let line_to_address = decode_u32_map(attribute(segment, ATTR_LINE_TO_ADDRESS)?)?;
        let address_to_line = decode_u32_map(attribute(segment, ATTR_ADDRESS_TO_LINE)?)?;

        Ok(Self {
            input_path,
            labels,
            line_to_address,
            address_to_line,
        })
    }
}

fn attribute<'a>(segment: &'a Segment, key: &'static str) -> Result<&'a [u8]> {
    segment
        .attributes
        .get(key)
        .map(Vec::as_slice)
        .ok_or(ObjectError::MissingAttribute(key))
}

fn encode_label_map(map: &BTreeMap<String, u32>) -> Vec<u8> {
    let mut bytes = Vec::new();
    wire::write_u32(&mut bytes, map.len() as u32).expect("writing to a Vec cannot fail");
    for (name, &address) in map {
        wire::write_str(&mut bytes, name).expect("writing to a Vec cannot fail");
        wire::write_u32(&mut bytes, address).expect("writing to a Vec cannot fail");
    }
    bytes
}

fn decode_label_map(mut bytes: &[u8]) -> Result<BTreeMap<String, u32>> {
    let count = wire::read_u32(&mut bytes)?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let name = wire::read_str(&mut bytes)?;
        let address = wire::read_u32(&mut bytes)?;
        map.insert(name, address);
    }
    Ok(map)
}

fn encode_u32_map(map: &BTreeMap<u32, u32>) -> Vec<u8> {
    let mut bytes = Vec::new();
    wire::write_u32(&mut bytes, map.len() as u32).expect("writing to a Vec cannot fail");
    for (&key, &value) in map {
        wire::write_u32(&mut bytes, key).expect("writing to a Vec cannot fail");
        wire::write_u32(&mut bytes, value).expect("writing to a Vec cannot fail");
    }
    bytes
}

fn decode_u32_map(mut bytes: &[u8]) -> Result<BTreeMap<u32, u32>> {
    let count = wire::read_u32(&mut bytes)?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let key = wire::read_u32(&mut bytes)?;
        let value = wire::read_u32(&mut bytes)?;
        map.insert(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DebugInfo {
        let mut labels = BTreeMap::new();
        labels.insert("main".to_string(), 0x0040_0000);
        labels.insert("loop".to_string(), 0x0040_0008);

        let mut info = DebugInfo::new("fib.asm".to_string(), labels);
        info.record(3, 0x0040_0000);
        info.record(4, 0x0040_0004);
        info.record(6, 0x0040_0008);
        info
    }

    #[test]
    fn test_segment_round_trip() {
        let info = sample();
        let segment = info.to_segment();
        assert_eq!(segment.segment_type(), Some(TYPE_DEBUGINFO));

        let decoded = DebugInfo::from_segment(&segment).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_line_to_address_ceiling() {
        let info = sample();
        // exact hit
        assert_eq!(info.line_to_address(4), Some(0x0040_0004));
        // line 5 has no instruction, rounds up to line 6
        assert_eq!(info.line_to_address(5), Some(0x0040_0008));
        // past the last instruction
        assert_eq!(info.line_to_address(7), None);
    }

    #[test]
    fn test_address_to_line_floor() {
        let info = sample();
        assert_eq!(info.address_to_line(0x0040_0004), Some(4));
        // mid-element address rounds down
        assert_eq!(info.address_to_line(0x0040_0006), Some(4));
        assert_eq!(info.address_to_line(0x003F_FFFF), None);
    }

    #[test]
    fn test_missing_attribute() {
        let segment = Segment::new(BTreeMap::new(), Vec::new());
        assert!(matches!(
            DebugInfo::from_segment(&segment),
            Err(ObjectError::MissingAttribute(_))
        ));
    }
}
