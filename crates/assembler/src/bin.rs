//! The binary-element model produced by parsing.
//!
//! Every element knows its emitted length as soon as it is constructed,
//! because length depends only on syntax. Byte values may depend on label
//! addresses, so materialization is deferred until the label table is
//! complete and takes the element's own base address as input.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::lexer::{DataType, Mnemonic};

/// Register reserved as scratch space for pseudo-instruction expansion
/// (`$at` by convention).
pub const SCRATCH_REGISTER: u8 = 1;

/// A jump instruction can only reach targets inside its own 256 MB
/// segment; these are the target bits it actually encodes.
pub const JUMP_TARGET_MASK: u32 = 0x0FFF_FFFC;

/// Errors from materializing element bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("jump at {pc:#010x} cannot reach {target:#010x} in another 256 MB segment")]
    JumpOutOfSegment { pc: u32, target: u32 },

    #[error("label '{0}' was not resolved")]
    UnresolvedLabel(String),
}

/// Immutable name-to-address snapshot taken once parsing finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable(BTreeMap<String, u32>);

impl LabelTable {
    pub(crate) fn from_map(map: BTreeMap<String, u32>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, &address)| (name.as_str(), address))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_map(&self) -> BTreeMap<String, u32> {
        self.0.clone()
    }

    fn require(&self, name: &str) -> Result<u32, EncodeError> {
        self.get(name)
            .ok_or_else(|| EncodeError::UnresolvedLabel(name.to_string()))
    }
}

/// How an I-format instruction gets its 16 immediate bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    /// Fixed at parse time.
    Value(u16),
    /// Word displacement from the delay slot to a label:
    /// `(target - (pc + 4)) >> 2`.
    BranchOffset(String),
    /// Low 16 bits of a label's address.
    LowHalf(String),
    /// High 16 bits of a label's address.
    HighHalf(String),
}

/// One machine instruction in one of the three MIPS32 formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    R {
        op: Mnemonic,
        rs: u8,
        rt: u8,
        rd: u8,
        shamt: u8,
    },
    I {
        op: Mnemonic,
        rs: u8,
        rt: u8,
        imm: Imm,
    },
    J {
        op: Mnemonic,
        target: String,
    },
}

impl Instr {
    /// The encoded 32-bit word, given the instruction's own address.
    pub fn word(&self, labels: &LabelTable, pc: u32) -> Result<u32, EncodeError> {
        match self {
            Instr::R { op, rs, rt, rd, shamt } => Ok((opcode(*op) as u32) << 26
                | (*rs as u32) << 21
                | (*rt as u32) << 16
                | (*rd as u32) << 11
                | (*shamt as u32) << 6
                | funct(*op) as u32),
            Instr::I { op, rs, rt, imm } => {
                let imm = match imm {
                    Imm::Value(value) => *value,
                    Imm::BranchOffset(label) => {
                        let target = labels.require(label)?;
                        let displacement = (target as i64 - (pc as i64 + 4)) >> 2;
                        displacement as u16
                    }
                    Imm::LowHalf(label) => (labels.require(label)? & 0xFFFF) as u16,
                    Imm::HighHalf(label) => (labels.require(label)? >> 16) as u16,
                };
                Ok((opcode(*op) as u32) << 26
                    | (*rs as u32) << 21
                    | (*rt as u32) << 16
                    | imm as u32)
            }
            Instr::J { op, target } => {
                let address = labels.require(target)?;
                if (address ^ pc) & !JUMP_TARGET_MASK & !3 != 0 {
                    return Err(EncodeError::JumpOutOfSegment {
                        pc,
                        target: address,
                    });
                }
                Ok((opcode(*op) as u32) << 26 | (address & JUMP_TARGET_MASK) >> 2)
            }
        }
    }

    fn collect_label_deps(&self, out: &mut BTreeSet<String>) {
        match self {
            Instr::R { .. } => {}
            Instr::I { imm, .. } => match imm {
                Imm::Value(_) => {}
                Imm::BranchOffset(label) | Imm::LowHalf(label) | Imm::HighHalf(label) => {
                    out.insert(label.clone());
                }
            },
            Instr::J { target, .. } => {
                out.insert(target.clone());
            }
        }
    }
}

fn opcode(op: Mnemonic) -> u8 {
    use Mnemonic::*;
    match op {
        Nop | Sll | Srl | Sra | Sllv | Srlv | Srav | Jr | Jalr | Syscall | Break | Mfhi
        | Mthi | Mflo | Mtlo | Mult | Div | Add | Sub | And | Or | Xor | Nor | Slt => 0x00,
        J => 0x02,
        Jal => 0x03,
        Beq => 0x04,
        Bne => 0x05,
        Addi => 0x08,
        Slti => 0x0A,
        Andi => 0x0C,
        Ori => 0x0D,
        Xori => 0x0E,
        Lui => 0x0F,
        Mfc0 | Mtc0 => 0x10,
        Lb => 0x20,
        Lh => 0x21,
        Lw => 0x23,
        Sb => 0x28,
        Sh => 0x29,
        Sw => 0x2B,
        // pseudo mnemonics are expanded before encoding
        Bge | Bgez | Bgt | Bgtz | Ble | Blez | Blt | Bltz | La | Li | Move | Mul => 0x00,
    }
}

fn funct(op: Mnemonic) -> u8 {
    use Mnemonic::*;
    match op {
        Nop | Sll => 0x00,
        Srl => 0x02,
        Sra => 0x03,
        Sllv => 0x04,
        Srlv => 0x06,
        Srav => 0x07,
        Jr => 0x08,
        Jalr => 0x09,
        Syscall => 0x0C,
        Break => 0x0D,
        Mfhi => 0x10,
        Mthi => 0x11,
        Mflo => 0x12,
        Mtlo => 0x13,
        Mult => 0x18,
        Div => 0x1A,
        Add => 0x20,
        Sub => 0x22,
        And => 0x24,
        Or => 0x25,
        Xor => 0x26,
        Nor => 0x27,
        Slt => 0x2A,
        _ => 0x00,
    }
}

/// What a parsed element is.
#[derive(Debug, Clone, PartialEq)]
pub enum BinKind {
    /// Zero-length marker binding a name to the running address.
    Label(String),
    /// Raw bytes, already padded to a word boundary.
    Data(Vec<u8>),
    Instr(Instr),
    /// The expansion of one pseudo-instruction; all words share the
    /// source span of the pseudo mnemonic.
    Pseudo(Vec<Instr>),
    /// `.globl` export marker.
    Globl(String),
    /// `.extern` binding of a name to an externally fixed address.
    Extern { name: String, address: u32 },
}

/// One parsed construct plus the token range it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BinElement {
    /// Index of the first token contributing to this element.
    pub token_start: usize,
    /// One past the last contributing token.
    pub token_end: usize,
    pub kind: BinKind,
}

impl BinElement {
    pub fn new(token_start: usize, token_end: usize, kind: BinKind) -> Self {
        Self {
            token_start,
            token_end,
            kind,
        }
    }

    /// A data element, zero-padded up to the next word boundary.
    pub fn data(token_start: usize, token_end: usize, mut bytes: Vec<u8>) -> Self {
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        Self::new(token_start, token_end, BinKind::Data(bytes))
    }

    /// Emitted length in bytes. Known without any label resolution.
    pub fn len(&self) -> u32 {
        match &self.kind {
            BinKind::Label(_) | BinKind::Globl(_) | BinKind::Extern { .. } => 0,
            BinKind::Data(bytes) => bytes.len() as u32,
            BinKind::Instr(_) => 4,
            BinKind::Pseudo(instrs) => 4 * instrs.len() as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for elements that emit instruction words.
    pub fn is_code(&self) -> bool {
        matches!(self.kind, BinKind::Instr(_) | BinKind::Pseudo(_))
    }

    /// Append this element's bytes, big-endian, given its base address.
    pub fn encode(
        &self,
        labels: &LabelTable,
        address: u32,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        match &self.kind {
            BinKind::Label(_) | BinKind::Globl(_) | BinKind::Extern { .. } => Ok(()),
            BinKind::Data(bytes) => {
                out.extend_from_slice(bytes);
                Ok(())
            }
            BinKind::Instr(instr) => {
                out.extend_from_slice(&instr.word(labels, address)?.to_be_bytes());
                Ok(())
            }
            BinKind::Pseudo(instrs) => {
                for (index, instr) in instrs.iter().enumerate() {
                    let pc = address + 4 * index as u32;
                    out.extend_from_slice(&instr.word(labels, pc)?.to_be_bytes());
                }
                Ok(())
            }
        }
    }

    /// Add every label name this element needs resolved to `out`.
    /// Exported names count: a `.globl` promise must be kept.
    pub fn collect_label_deps(&self, out: &mut BTreeSet<String>) {
        match &self.kind {
            BinKind::Label(_) | BinKind::Data(_) | BinKind::Extern { .. } => {}
            BinKind::Globl(name) => {
                out.insert(name.clone());
            }
            BinKind::Instr(instr) => instr.collect_label_deps(out),
            BinKind::Pseudo(instrs) => {
                for instr in instrs {
                    instr.collect_label_deps(out);
                }
            }
        }
    }
}

/// A type-checked numeric literal destined for a data directive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

/// Pack literals big-endian at the width of `ty`. No padding; the data
/// element pads the whole run once.
pub fn pack_literals(ty: DataType, literals: &[Literal]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(literals.len() * ty.width());
    for &literal in literals {
        match (ty, literal) {
            (DataType::Byte, Literal::Int(value)) => bytes.push(value as u8),
            (DataType::Half, Literal::Int(value)) => {
                bytes.extend_from_slice(&(value as i16).to_be_bytes())
            }
            (DataType::Word, Literal::Int(value)) => {
                bytes.extend_from_slice(&(value as i32).to_be_bytes())
            }
            (DataType::Dword, Literal::Int(value)) => {
                bytes.extend_from_slice(&value.to_be_bytes())
            }
            (DataType::Float, Literal::Float(value)) => {
                bytes.extend_from_slice(&(value as f32).to_be_bytes())
            }
            (DataType::Double, Literal::Float(value)) => {
                bytes.extend_from_slice(&value.to_be_bytes())
            }
            _ => debug_assert!(false, "literal {literal:?} does not fit {ty:?}"),
        }
    }
    bytes
}

/// Pack string bytes, optionally NUL-terminated. A terminated string
/// always gets its NUL even when padding would supply one anyway.
pub fn pack_string(text: &str, zero_terminated: bool) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    if zero_terminated {
        bytes.push(0);
    }
    bytes
}
