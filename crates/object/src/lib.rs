//! Executable container format for assembled MIPS32 programs.
//!
//! A container is an ordered list of [`Segment`]s, each a small attribute
//! map (string key to raw bytes) plus a byte payload. The loader places
//! `MEMORY` segments at their `address` attribute, takes the initial
//! program counter from the `ENTRYPOINT` segment, and the debugger reads
//! the optional `DEBUGINFO` segment without touching execution at all.
//! Keeping the header open-ended like this lets new attributes travel
//! alongside a program without changing the loader's contract.

pub mod wire;

mod binary;
mod debug_info;
mod segment;

pub use binary::{ExecutableBinary, MAGIC};
pub use debug_info::DebugInfo;
pub use segment::Segment;

use thiserror::Error;

/// Errors from encoding or decoding a container.
#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("bad magic number {0:#010x}, expected {MAGIC:#010x}")]
    BadMagic(u32),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("attribute key is not valid utf-8")]
    InvalidKey(#[from] std::string::FromUtf8Error),

    #[error("missing segment attribute '{0}'")]
    MissingAttribute(&'static str),

    #[error("malformed segment attribute '{0}'")]
    MalformedAttribute(&'static str),
}

pub type Result<T> = std::result::Result<T, ObjectError>;
