//! Big-endian wire helpers used by the container format.
//!
//! Everything on the wire is a big-endian `u32` or a length-prefixed run
//! of raw bytes; strings are length-prefixed UTF-8.

use std::io::{Read, Write};

use crate::Result;

pub fn write_u32(out: &mut impl Write, value: u32) -> Result<()> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn read_u32(input: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Write a length-prefixed byte run.
pub fn write_bytes(out: &mut impl Write, bytes: &[u8]) -> Result<()> {
    write_u32(out, bytes.len() as u32)?;
    out.write_all(bytes)?;
    Ok(())
}

pub fn read_bytes(input: &mut impl Read) -> Result<Vec<u8>> {
    let len = read_u32(input)? as usize;
    let mut bytes = vec![0u8; len];
    input.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Write a length-prefixed UTF-8 string.
pub fn write_str(out: &mut impl Write, text: &str) -> Result<()> {
    write_bytes(out, text.as_bytes())
}

pub fn read_str(input: &mut impl Read) -> Result<String> {
    let bytes = read_bytes(input)?;
    Ok(String::from_utf8(bytes)?)
}
