//! Token stream to binary elements.
//!
//! A single pass walks the token stream, keeps a running address per
//! section, defines labels as it meets them and expands pseudo
//! mnemonics into their real instruction sequences. Forward references
//! are fine because element lengths never depend on label values.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::bin::{
    self, BinElement, BinKind, Imm, Instr, LabelTable, Literal, SCRATCH_REGISTER,
};
use crate::lexer::{DataType, Mnemonic, Section, SpannedToken, Token};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("expected ')'")]
    ExpectedCloseParen,

    #[error("expected ':' after label")]
    ExpectedColonAfterLabel,

    #[error("expected ','")]
    ExpectedComma,

    #[error("expected a label")]
    ExpectedLabel,

    #[error("expected a number")]
    ExpectedNumber,

    #[error("expected '('")]
    ExpectedOpenParen,

    #[error("expected a register")]
    ExpectedRegister,

    #[error("expected a string")]
    ExpectedString,

    #[error("illegal start of statement")]
    IllegalStartOfStatement,

    #[error("invalid punctuation after literal")]
    InvalidPunctuation,

    #[error("number out of range")]
    NumberOutOfRange,

    #[error("repeat count must be integral")]
    RepeatCountMustBeIntegral,

    #[error("repeat count out of range")]
    RepeatCountOutOfRange,

    #[error("literal does not match the directive type")]
    TypeMismatch,

    #[error("unexpected end of file")]
    UnexpectedEndOfFile,

    #[error("unsupported syntax format")]
    UnsupportedSyntaxFormat,

    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),
}

/// A parse failure and the token it points at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (token {token_index})")]
pub struct ParsingError {
    pub token_index: usize,
    pub kind: ParseErrorKind,
}

/// Everything parsing produces: one element list per section, the
/// completed label table and the `.globl` exports.
#[derive(Debug, Clone, PartialEq)]
pub struct Binarization {
    pub data_elements: Vec<BinElement>,
    pub text_elements: Vec<BinElement>,
    pub labels: LabelTable,
    pub globals: Vec<String>,
    pub data_address: u32,
    pub text_address: u32,
}

impl Binarization {
    pub fn data_len(&self) -> u32 {
        self.data_elements.iter().map(BinElement::len).sum()
    }

    pub fn text_len(&self) -> u32 {
        self.text_elements.iter().map(BinElement::len).sum()
    }
}

/// Parse a token stream. Section base addresses are truncated to word
/// boundaries; the stream starts in the text section.
pub fn parse(
    tokens: &[SpannedToken],
    data_address: u32,
    text_address: u32,
) -> Result<Binarization, ParsingError> {
    Parser { tokens }.run(data_address & !3, text_address & !3)
}

struct Parser<'t> {
    tokens: &'t [SpannedToken],
}

impl<'t> Parser<'t> {
    fn run(&self, data_address: u32, text_address: u32) -> Result<Binarization, ParsingError> {
        let mut data_elements = Vec::new();
        let mut text_elements = Vec::new();
        let mut labels = BTreeMap::new();
        let mut globals = Vec::new();
        let mut data_counter = data_address;
        let mut text_counter = text_address;
        let mut section = Section::Text;

        let mut i = 0;
        while i < self.tokens.len() {
            if let Token::Section(next_section) = &self.tokens[i].token {
                section = *next_section;
                i += 1;
                continue;
            }

            let (element, next) = self.parse_statement(i, section)?;

            let counter = match section {
                Section::Data => &mut data_counter,
                Section::Text => &mut text_counter,
            };
            match &element.kind {
                BinKind::Label(name) => {
                    define_label(&mut labels, name, *counter, element.token_start)?
                }
                BinKind::Extern { name, address } => {
                    define_label(&mut labels, name, *address, element.token_start + 1)?
                }
                BinKind::Globl(name) => globals.push(name.clone()),
                _ => {}
            }
            *counter += element.len();

            match section {
                Section::Data => data_elements.push(element),
                Section::Text => text_elements.push(element),
            }
            i = next;
        }

        Ok(Binarization {
            data_elements,
            text_elements,
            labels: LabelTable::from_map(labels),
            globals,
            data_address,
            text_address,
        })
    }

    fn parse_statement(
        &self,
        i: usize,
        section: Section,
    ) -> Result<(BinElement, usize), ParsingError> {
        match &self.tokens[i].token {
            Token::Label(_) => self.parse_label_definition(i),
            Token::Globl => self.parse_globl(i),
            Token::Extern => self.parse_extern(i),
            Token::Instr(mnemonic) if section == Section::Text => {
                self.parse_instr(i, *mnemonic)
            }
            Token::DataTag(data_type) if section == Section::Data => {
                self.parse_data(i, *data_type)
            }
            _ => Err(self.error(i, ParseErrorKind::IllegalStartOfStatement)),
        }
    }

    fn parse_label_definition(&self, i: usize) -> Result<(BinElement, usize), ParsingError> {
        let name = self.expect_label(i)?;
        match self.get(i + 1)? {
            Token::Colon => {}
            _ => return Err(self.error(i + 1, ParseErrorKind::ExpectedColonAfterLabel)),
        }
        Ok((BinElement::new(i, i + 2, BinKind::Label(name)), i + 2))
    }

    fn parse_globl(&self, i: usize) -> Result<(BinElement, usize), ParsingError> {
        let name = self.expect_label(i + 1)?;
        Ok((BinElement::new(i, i + 2, BinKind::Globl(name)), i + 2))
    }

    fn parse_extern(&self, i: usize) -> Result<(BinElement, usize), ParsingError> {
        let name = self.expect_label(i + 1)?;
        let value = self.expect_int(i + 2)?;
        if !(0..=u32::MAX as i64).contains(&value) {
            return Err(self.error(i + 2, ParseErrorKind::NumberOutOfRange));
        }
        let kind = BinKind::Extern {
            name,
            address: value as u32,
        };
        Ok((BinElement::new(i, i + 3, kind), i + 3))
    }

    fn parse_instr(
        &self,
        i: usize,
        mnemonic: Mnemonic,
    ) -> Result<(BinElement, usize), ParsingError> {
        use Mnemonic::*;
        match mnemonic {
            // op
            Nop | Syscall | Break => {
                let instr = Instr::R {
                    op: mnemonic,
                    rs: 0,
                    rt: 0,
                    rd: 0,
                    shamt: 0,
                };
                Ok((BinElement::new(i, i + 1, BinKind::Instr(instr)), i + 1))
            }

            // op label
            J | Jal => {
                let target = self.expect_label(i + 1)?;
                let instr = Instr::J {
                    op: mnemonic,
                    target,
                };
                Ok((BinElement::new(i, i + 2, BinKind::Instr(instr)), i + 2))
            }

            // op $reg
            Jr | Mthi | Mtlo | Mfhi | Mflo => {
                let reg = self.expect_register(i + 1)?;
                let (rs, rd) = match mnemonic {
                    Mfhi | Mflo => (0, reg),
                    _ => (reg, 0),
                };
                let instr = Instr::R {
                    op: mnemonic,
                    rs,
                    rt: 0,
                    rd,
                    shamt: 0,
                };
                Ok((BinElement::new(i, i + 2, BinKind::Instr(instr)), i + 2))
            }

            // op $reg, imm16
            Lui => {
                let reg = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let imm = self.expect_imm16(i + 3)?;
                let instr = Instr::I {
                    op: mnemonic,
                    rs: 0,
                    rt: reg,
                    imm: Imm::Value(imm),
                };
                Ok((BinElement::new(i, i + 4, BinKind::Instr(instr)), i + 4))
            }

            // op $reg, imm16($base)
            Lb | Lh | Lw | Sb | Sh | Sw => {
                let reg = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let imm = self.expect_imm16(i + 3)?;
                match self.get(i + 4)? {
                    Token::OpenParen => {}
                    _ => return Err(self.error(i + 4, ParseErrorKind::ExpectedOpenParen)),
                }
                let base = self.expect_register(i + 5)?;
                match self.get(i + 6)? {
                    Token::CloseParen => {}
                    _ => return Err(self.error(i + 6, ParseErrorKind::ExpectedCloseParen)),
                }
                let instr = Instr::I {
                    op: mnemonic,
                    rs: base,
                    rt: reg,
                    imm: Imm::Value(imm),
                };
                Ok((BinElement::new(i, i + 7, BinKind::Instr(instr)), i + 7))
            }

            // li $reg, imm32
            Li => {
                let reg = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let value = self.expect_int(i + 3)?;
                if !(i32::MIN as i64..=i32::MAX as i64).contains(&value) {
                    return Err(self.error(i + 3, ParseErrorKind::NumberOutOfRange));
                }
                let bits = value as u32;
                let kind = BinKind::Pseudo(vec![
                    Instr::I {
                        op: Lui,
                        rs: 0,
                        rt: SCRATCH_REGISTER,
                        imm: Imm::Value((bits >> 16) as u16),
                    },
                    Instr::I {
                        op: Xori,
                        rs: SCRATCH_REGISTER,
                        rt: reg,
                        imm: Imm::Value((bits & 0xFFFF) as u16),
                    },
                ]);
                Ok((BinElement::new(i, i + 4, kind), i + 4))
            }

            // la $reg, label
            La => {
                let reg = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let label = self.expect_label(i + 3)?;
                let kind = BinKind::Pseudo(vec![
                    Instr::I {
                        op: Lui,
                        rs: 0,
                        rt: SCRATCH_REGISTER,
                        imm: Imm::HighHalf(label.clone()),
                    },
                    Instr::I {
                        op: Xori,
                        rs: SCRATCH_REGISTER,
                        rt: reg,
                        imm: Imm::LowHalf(label),
                    },
                ]);
                Ok((BinElement::new(i, i + 4, kind), i + 4))
            }

            // op $reg, label
            Bgez | Bgtz | Blez | Bltz => {
                let reg = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let label = self.expect_label(i + 3)?;
                let (slt_rs, slt_rt, branch) = match mnemonic {
                    Bgez => (reg, 0, Beq),
                    Bgtz => (0, reg, Bne),
                    Blez => (0, reg, Beq),
                    _ => (reg, 0, Bne), // bltz
                };
                let kind = BinKind::Pseudo(compare_and_branch(slt_rs, slt_rt, branch, label));
                Ok((BinElement::new(i, i + 4, kind), i + 4))
            }

            // op $reg, $reg
            Jalr | Mult | Div | Move => {
                let reg1 = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let reg2 = self.expect_register(i + 3)?;
                let instr = match mnemonic {
                    Jalr => Instr::R {
                        op: mnemonic,
                        rs: reg2,
                        rt: 0,
                        rd: reg1,
                        shamt: 0,
                    },
                    Mult | Div => Instr::R {
                        op: mnemonic,
                        rs: reg1,
                        rt: reg2,
                        rd: 0,
                        shamt: 0,
                    },
                    // move is addi with a zero immediate
                    _ => Instr::I {
                        op: Addi,
                        rs: reg2,
                        rt: reg1,
                        imm: Imm::Value(0),
                    },
                };
                Ok((BinElement::new(i, i + 4, BinKind::Instr(instr)), i + 4))
            }

            // op $reg, $reg, imm16
            Addi | Slti | Andi | Ori | Xori => {
                let reg1 = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let reg2 = self.expect_register(i + 3)?;
                self.expect_comma(i + 4)?;
                let imm = self.expect_imm16(i + 5)?;
                let instr = Instr::I {
                    op: mnemonic,
                    rs: reg2,
                    rt: reg1,
                    imm: Imm::Value(imm),
                };
                Ok((BinElement::new(i, i + 6, BinKind::Instr(instr)), i + 6))
            }

            // op $reg, $reg, shamt
            Sll | Srl | Sra => {
                let reg1 = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let reg2 = self.expect_register(i + 3)?;
                self.expect_comma(i + 4)?;
                let shamt = self.expect_int(i + 5)?;
                if !(0..=0x1F).contains(&shamt) {
                    return Err(self.error(i + 5, ParseErrorKind::NumberOutOfRange));
                }
                let instr = Instr::R {
                    op: mnemonic,
                    rs: 0,
                    rt: reg2,
                    rd: reg1,
                    shamt: shamt as u8,
                };
                Ok((BinElement::new(i, i + 6, BinKind::Instr(instr)), i + 6))
            }

            // op $reg, $reg, label
            Beq | Bne => {
                let reg1 = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let reg2 = self.expect_register(i + 3)?;
                self.expect_comma(i + 4)?;
                let label = self.expect_label(i + 5)?;
                let instr = Instr::I {
                    op: mnemonic,
                    rs: reg1,
                    rt: reg2,
                    imm: Imm::BranchOffset(label),
                };
                Ok((BinElement::new(i, i + 6, BinKind::Instr(instr)), i + 6))
            }

            Bge | Bgt | Ble | Blt => {
                let reg1 = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let reg2 = self.expect_register(i + 3)?;
                self.expect_comma(i + 4)?;
                let label = self.expect_label(i + 5)?;
                let (slt_rs, slt_rt, branch) = match mnemonic {
                    Bge => (reg1, reg2, Beq),
                    Bgt => (reg2, reg1, Bne),
                    Ble => (reg2, reg1, Beq),
                    _ => (reg1, reg2, Bne), // blt
                };
                let kind = BinKind::Pseudo(compare_and_branch(slt_rs, slt_rt, branch, label));
                Ok((BinElement::new(i, i + 6, kind), i + 6))
            }

            // op $reg, $reg, $reg
            Add | Sub | And | Or | Xor | Nor | Slt | Sllv | Srlv | Srav | Mul => {
                let reg1 = self.expect_register(i + 1)?;
                self.expect_comma(i + 2)?;
                let reg2 = self.expect_register(i + 3)?;
                self.expect_comma(i + 4)?;
                let reg3 = self.expect_register(i + 5)?;
                let kind = match mnemonic {
                    // variable shifts take the amount from rs
                    Sllv | Srlv | Srav => BinKind::Instr(Instr::R {
                        op: mnemonic,
                        rs: reg3,
                        rt: reg2,
                        rd: reg1,
                        shamt: 0,
                    }),
                    Mul => BinKind::Pseudo(vec![
                        Instr::R {
                            op: Mult,
                            rs: reg2,
                            rt: reg3,
                            rd: 0,
                            shamt: 0,
                        },
                        Instr::R {
                            op: Mflo,
                            rs: 0,
                            rt: 0,
                            rd: reg1,
                            shamt: 0,
                        },
                    ]),
                    _ => BinKind::Instr(Instr::R {
                        op: mnemonic,
                        rs: reg2,
                        rt: reg3,
                        rd: reg1,
                        shamt: 0,
                    }),
                };
                Ok((BinElement::new(i, i + 6, kind), i + 6))
            }

            // coprocessor moves are recognized but not supported
            Mfc0 | Mtc0 => Err(self.error(i, ParseErrorKind::UnsupportedSyntaxFormat)),
        }
    }

    fn parse_data(
        &self,
        i: usize,
        data_type: DataType,
    ) -> Result<(BinElement, usize), ParsingError> {
        if matches!(data_type, DataType::Ascii | DataType::Asciiz) {
            let text = match self.get(i + 1)? {
                Token::Str(text) => text.clone(),
                _ => return Err(self.error(i + 1, ParseErrorKind::ExpectedString)),
            };
            let bytes = bin::pack_string(&text, data_type == DataType::Asciiz);
            return Ok((BinElement::data(i, i + 2, bytes), i + 2));
        }

        let first = self.expect_literal(i + 1, data_type)?;
        match self.peek(i + 2) {
            // repeat form: value:count
            Some(&Token::Colon) => {
                let count = match self.get(i + 3)? {
                    Token::Int(count) => *count,
                    _ => {
                        return Err(self.error(i + 3, ParseErrorKind::RepeatCountMustBeIntegral))
                    }
                };
                if !(0..=0x7FFF).contains(&count) {
                    return Err(self.error(i + 3, ParseErrorKind::RepeatCountOutOfRange));
                }
                let unit = bin::pack_literals(data_type, &[first]);
                let bytes = unit.repeat(count as usize);
                Ok((BinElement::data(i, i + 4, bytes), i + 4))
            }
            // comma-separated list
            Some(&Token::Comma) => {
                let mut literals = vec![first];
                let mut next = i + 2;
                while let Some(&Token::Comma) = self.peek(next) {
                    literals.push(self.expect_literal(next + 1, data_type)?);
                    next += 2;
                }
                let bytes = bin::pack_literals(data_type, &literals);
                Ok((BinElement::data(i, next, bytes), next))
            }
            Some(&Token::OpenParen | &Token::CloseParen) => {
                Err(self.error(i + 2, ParseErrorKind::InvalidPunctuation))
            }
            _ => {
                let bytes = bin::pack_literals(data_type, &[first]);
                Ok((BinElement::data(i, i + 2, bytes), i + 2))
            }
        }
    }

    fn expect_literal(&self, i: usize, data_type: DataType) -> Result<Literal, ParsingError> {
        match self.get(i)? {
            Token::Int(value) => {
                if data_type.is_floating() {
                    return Err(self.error(i, ParseErrorKind::TypeMismatch));
                }
                let in_range = match data_type {
                    DataType::Byte => (-0x80..=0x7F).contains(value),
                    DataType::Half => (-0x8000..=0x7FFF).contains(value),
                    DataType::Word => (i32::MIN as i64..=i32::MAX as i64).contains(value),
                    _ => true, // dword spans all of i64
                };
                if !in_range {
                    return Err(self.error(i, ParseErrorKind::NumberOutOfRange));
                }
                Ok(Literal::Int(*value))
            }
            Token::Float(value) => {
                if !data_type.is_floating() {
                    return Err(self.error(i, ParseErrorKind::TypeMismatch));
                }
                if data_type == DataType::Float && value.abs() > f32::MAX as f64 {
                    return Err(self.error(i, ParseErrorKind::NumberOutOfRange));
                }
                Ok(Literal::Float(*value))
            }
            _ => Err(self.error(i, ParseErrorKind::ExpectedNumber)),
        }
    }

    fn peek(&self, i: usize) -> Option<&Token> {
        self.tokens.get(i).map(|spanned| &spanned.token)
    }

    fn get(&self, i: usize) -> Result<&Token, ParsingError> {
        self.tokens
            .get(i)
            .map(|spanned| &spanned.token)
            .ok_or(ParsingError {
                token_index: self.tokens.len().saturating_sub(1),
                kind: ParseErrorKind::UnexpectedEndOfFile,
            })
    }

    fn error(&self, token_index: usize, kind: ParseErrorKind) -> ParsingError {
        ParsingError { token_index, kind }
    }

    fn expect_register(&self, i: usize) -> Result<u8, ParsingError> {
        match self.get(i)? {
            Token::Register(reg) => Ok(*reg),
            _ => Err(self.error(i, ParseErrorKind::ExpectedRegister)),
        }
    }

    fn expect_comma(&self, i: usize) -> Result<(), ParsingError> {
        match self.get(i)? {
            Token::Comma => Ok(()),
            _ => Err(self.error(i, ParseErrorKind::ExpectedComma)),
        }
    }

    fn expect_label(&self, i: usize) -> Result<String, ParsingError> {
        match self.get(i)? {
            Token::Label(name) => Ok(name.clone()),
            _ => Err(self.error(i, ParseErrorKind::ExpectedLabel)),
        }
    }

    fn expect_int(&self, i: usize) -> Result<i64, ParsingError> {
        match self.get(i)? {
            Token::Int(value) => Ok(*value),
            _ => Err(self.error(i, ParseErrorKind::ExpectedNumber)),
        }
    }

    fn expect_imm16(&self, i: usize) -> Result<u16, ParsingError> {
        let value = self.expect_int(i)?;
        if !(-0x8000..=0x7FFF).contains(&value) {
            return Err(self.error(i, ParseErrorKind::NumberOutOfRange));
        }
        Ok(value as u16)
    }
}

fn compare_and_branch(slt_rs: u8, slt_rt: u8, branch: Mnemonic, label: String) -> Vec<Instr> {
    vec![
        Instr::R {
            op: Mnemonic::Slt,
            rs: slt_rs,
            rt: slt_rt,
            rd: SCRATCH_REGISTER,
            shamt: 0,
        },
        Instr::I {
            op: branch,
            rs: SCRATCH_REGISTER,
            rt: 0,
            imm: Imm::BranchOffset(label),
        },
    ]
}

fn define_label(
    labels: &mut BTreeMap<String, u32>,
    name: &str,
    address: u32,
    token_index: usize,
) -> Result<(), ParsingError> {
    if labels.insert(name.to_string(), address).is_some() {
        return Err(ParsingError {
            token_index,
            kind: ParseErrorKind::DuplicateLabel(name.to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    const DATA_BASE: u32 = 0x1000_0000;
    const TEXT_BASE: u32 = 0x0040_0000;

    fn parse_source(source: &str) -> Result<Binarization, ParsingError> {
        parse(&tokenize(source).unwrap(), DATA_BASE, TEXT_BASE)
    }

    #[test]
    fn test_starts_in_text_section() {
        let parsed = parse_source("nop").unwrap();
        assert_eq!(parsed.text_elements.len(), 1);
        assert!(parsed.data_elements.is_empty());
    }

    #[test]
    fn test_label_addresses_per_section() {
        let parsed =
            parse_source(".data\nvalue: .word 7\n.text\nmain: nop\nsecond: nop").unwrap();
        assert_eq!(parsed.labels.get("value"), Some(DATA_BASE));
        assert_eq!(parsed.labels.get("main"), Some(TEXT_BASE));
        assert_eq!(parsed.labels.get("second"), Some(TEXT_BASE + 4));
    }

    #[test]
    fn test_pseudo_length_counted_before_resolution() {
        // li expands to two words even though the label table is not
        // consulted until encoding
        let parsed = parse_source("main: li $t0, 70000\nafter: nop").unwrap();
        assert_eq!(parsed.labels.get("after"), Some(TEXT_BASE + 8));
        assert_eq!(parsed.text_len(), 12);
    }

    #[test]
    fn test_duplicate_label() {
        let error = parse_source("main: nop\nmain: nop").unwrap_err();
        assert_eq!(
            error.kind,
            ParseErrorKind::DuplicateLabel("main".to_string())
        );
    }

    #[test]
    fn test_load_store_operands() {
        let parsed = parse_source("main: lw $t0, 8($sp)").unwrap();
        assert_eq!(
            parsed.text_elements[1].kind,
            BinKind::Instr(Instr::I {
                op: Mnemonic::Lw,
                rs: 29,
                rt: 8,
                imm: Imm::Value(8),
            })
        );
    }

    #[test]
    fn test_missing_close_paren() {
        let error = parse_source("main: lw $t0, 8($sp").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::UnexpectedEndOfFile);
    }

    #[test]
    fn test_three_register_ordering() {
        let parsed = parse_source("main: add $t0, $t1, $t2").unwrap();
        assert_eq!(
            parsed.text_elements[1].kind,
            BinKind::Instr(Instr::R {
                op: Mnemonic::Add,
                rs: 9,
                rt: 10,
                rd: 8,
                shamt: 0,
            })
        );
    }

    #[test]
    fn test_variable_shift_ordering() {
        let parsed = parse_source("main: sllv $t0, $t1, $t2").unwrap();
        assert_eq!(
            parsed.text_elements[1].kind,
            BinKind::Instr(Instr::R {
                op: Mnemonic::Sllv,
                rs: 10,
                rt: 9,
                rd: 8,
                shamt: 0,
            })
        );
    }

    #[test]
    fn test_move_is_addi_zero() {
        let parsed = parse_source("main: move $t0, $t1").unwrap();
        assert_eq!(
            parsed.text_elements[1].kind,
            BinKind::Instr(Instr::I {
                op: Mnemonic::Addi,
                rs: 9,
                rt: 8,
                imm: Imm::Value(0),
            })
        );
    }

    #[test]
    fn test_branch_pseudo_expansion() {
        let parsed = parse_source("main: blt $t0, $t1, main").unwrap();
        let BinKind::Pseudo(instrs) = &parsed.text_elements[1].kind else {
            panic!("expected a pseudo expansion");
        };
        assert_eq!(
            instrs[0],
            Instr::R {
                op: Mnemonic::Slt,
                rs: 8,
                rt: 9,
                rd: SCRATCH_REGISTER,
                shamt: 0,
            }
        );
        assert_eq!(
            instrs[1],
            Instr::I {
                op: Mnemonic::Bne,
                rs: SCRATCH_REGISTER,
                rt: 0,
                imm: Imm::BranchOffset("main".to_string()),
            }
        );
    }

    #[test]
    fn test_immediate_out_of_range() {
        let error = parse_source("main: addi $t0, $t1, 0x8000").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::NumberOutOfRange);
        assert_eq!(error.token_index, 7);
    }

    #[test]
    fn test_shift_amount_out_of_range() {
        let error = parse_source("main: sll $t0, $t1, 32").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::NumberOutOfRange);
    }

    #[test]
    fn test_coprocessor_moves_are_unsupported() {
        let error = parse_source("main: mfc0 $t0, $13").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::UnsupportedSyntaxFormat);
    }

    #[test]
    fn test_data_list_and_padding() {
        let parsed = parse_source(".data\nbytes: .byte 1, 2, 3").unwrap();
        assert_eq!(parsed.data_elements[1].kind, BinKind::Data(vec![1, 2, 3, 0]));
    }

    #[test]
    fn test_data_repeat() {
        let parsed = parse_source(".data\nfill: .half -2:3").unwrap();
        assert_eq!(
            parsed.data_elements[1].kind,
            BinKind::Data(vec![0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0, 0])
        );
    }

    #[test]
    fn test_data_repeat_count_checks() {
        let error = parse_source(".data\nx: .byte 1:2.5").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::RepeatCountMustBeIntegral);

        let error = parse_source(".data\nx: .byte 1:40000").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::RepeatCountOutOfRange);
    }

    #[test]
    fn test_byte_range_is_checked() {
        let error = parse_source(".data\nx: .byte 300").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::NumberOutOfRange);

        let error = parse_source(".data\nx: .half -40000").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::NumberOutOfRange);
    }

    #[test]
    fn test_float_type_checking() {
        let error = parse_source(".data\nx: .float 3").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::TypeMismatch);

        let error = parse_source(".data\nx: .word 3.5").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::TypeMismatch);

        assert!(parse_source(".data\nx: .double 3.5").is_ok());
    }

    #[test]
    fn test_asciiz_padding() {
        let parsed = parse_source(".data\ngreeting: .asciiz \"hi\"").unwrap();
        assert_eq!(parsed.data_elements[1].kind, BinKind::Data(b"hi\0\0".to_vec()));
    }

    #[test]
    fn test_directive_in_wrong_section() {
        let error = parse_source(".word 3").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::IllegalStartOfStatement);
    }

    #[test]
    fn test_globl_and_extern() {
        let parsed =
            parse_source(".globl main\n.extern uart 0xFFFF0000\nmain: sw $t0, 0($at)").unwrap();
        assert_eq!(parsed.globals, vec!["main".to_string()]);
        assert_eq!(parsed.labels.get("uart"), Some(0xFFFF_0000));
    }

    #[test]
    fn test_extern_address_range() {
        let error = parse_source(".extern uart -1").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::NumberOutOfRange);
    }

    #[test]
    fn test_base_addresses_are_word_truncated() {
        let tokens = tokenize("main: nop").unwrap();
        let parsed = parse(&tokens, DATA_BASE + 3, TEXT_BASE + 2).unwrap();
        assert_eq!(parsed.text_address, TEXT_BASE);
        assert_eq!(parsed.labels.get("main"), Some(TEXT_BASE));
    }
}
