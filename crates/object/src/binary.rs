//! The top-level container: a magic number and an ordered segment list.

use std::io::{Read, Write};

use crate::segment::{Segment, TYPE_DEBUGINFO, TYPE_ENTRYPOINT, TYPE_MEMORY};
use crate::{wire, ObjectError, Result};

/// Identifies a byte stream as an executable container.
pub const MAGIC: u32 = 0x981D_C595;

/// An executable program as an ordered sequence of segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableBinary {
    pub segments: Vec<Segment>,
}

impl ExecutableBinary {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn encode(&self, out: &mut impl Write) -> Result<()> {
        wire::write_u32(out, MAGIC)?;
        wire::write_u32(out, self.segments.len() as u32)?;
        for segment in &self.segments {
            segment.encode(out)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.encode(&mut bytes)
            .expect("writing to a Vec cannot fail");
        bytes
    }

    pub fn decode(input: &mut impl Read) -> Result<Self> {
        let magic = wire::read_u32(input)?;
        if magic != MAGIC {
            return Err(ObjectError::BadMagic(magic));
        }
        let count = wire::read_u32(input)?;
        let mut segments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            segments.push(Segment::decode(input)?);
        }
        Ok(Self::new(segments))
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        Self::decode(&mut bytes)
    }

    /// Segments the loader should place directly in memory.
    pub fn memory_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments
            .iter()
            .filter(|s| s.segment_type() == Some(TYPE_MEMORY))
    }

    /// The initial program counter, from the `ENTRYPOINT` segment.
    pub fn entry_point(&self) -> Result<u32> {
        self.segments
            .iter()
            .find(|s| s.segment_type() == Some(TYPE_ENTRYPOINT))
            .ok_or(ObjectError::MissingAttribute("entrypoint"))?
            .address()
    }

    /// The debug information segment, if the assembler attached one.
    pub fn debug_info_segment(&self) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.segment_type() == Some(TYPE_DEBUGINFO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_round_trip() {
        let binary = ExecutableBinary::new(vec![
            Segment::memory(0x1001_0000, vec![1, 2, 3, 4, 5, 6, 7, 8]),
            Segment::memory(0x0040_0000, vec![0x24, 0x02, 0x00, 0x0A]),
            Segment::entrypoint(0x0040_0000),
        ]);

        let bytes = binary.to_bytes();
        let decoded = ExecutableBinary::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, binary);
        assert_eq!(decoded.memory_segments().count(), 2);
        assert_eq!(decoded.entry_point().unwrap(), 0x0040_0000);
        assert!(decoded.debug_info_segment().is_none());
    }

    #[test]
    fn test_magic_mismatch_is_fatal() {
        let binary = ExecutableBinary::new(vec![Segment::entrypoint(0)]);
        let mut bytes = binary.to_bytes();
        bytes[0] ^= 0xFF;

        let result = ExecutableBinary::from_bytes(&bytes);
        assert!(matches!(result, Err(ObjectError::BadMagic(_))));
    }

    #[test]
    fn test_truncated_container() {
        let binary = ExecutableBinary::new(vec![Segment::memory(0, vec![1, 2, 3, 4])]);
        let bytes = binary.to_bytes();

        let result = ExecutableBinary::from_bytes(&bytes[..bytes.len() - 2]);
        assert!(matches!(result, Err(ObjectError::Io(_))));
    }
}
