//! Tokenization for MIPS32 assembly.
//!
//! Uses the logos crate for fast lexical analysis. Mnemonics, section
//! tags and register names are case-insensitive; label names are not.
//! Comments run from `#` to the end of the line.

use logos::Logos;
use std::ops::Range;
use thiserror::Error;

/// Instruction mnemonics, real and pseudo alike. Pseudo mnemonics are
/// expanded during parsing and never reach encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Add,
    Addi,
    And,
    Andi,
    Beq,
    Bne,
    Break,
    Div,
    J,
    Jal,
    Jalr,
    Jr,
    Lb,
    Lh,
    Lui,
    Lw,
    Mfc0,
    Mfhi,
    Mflo,
    Mtc0,
    Mthi,
    Mtlo,
    Mult,
    Nop,
    Nor,
    Or,
    Ori,
    Sb,
    Sh,
    Sll,
    Sllv,
    Slt,
    Slti,
    Sra,
    Srav,
    Srl,
    Srlv,
    Sub,
    Sw,
    Syscall,
    Xor,
    Xori,
    // pseudo
    Bge,
    Bgez,
    Bgt,
    Bgtz,
    Ble,
    Blez,
    Blt,
    Bltz,
    La,
    Li,
    Move,
    Mul,
}

/// The two output sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Data,
    Text,
}

/// Width and encoding tags for data directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Byte,
    Half,
    Word,
    Dword,
    Float,
    Double,
    Ascii,
    Asciiz,
}

impl DataType {
    /// Emitted size of one value of this type, in bytes.
    pub fn width(self) -> usize {
        match self {
            DataType::Byte => 1,
            DataType::Half => 2,
            DataType::Word | DataType::Float => 4,
            DataType::Dword | DataType::Double => 8,
            // strings have no fixed element width
            DataType::Ascii | DataType::Asciiz => 1,
        }
    }

    pub fn is_floating(self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }
}

/// What went wrong at a particular byte offset.
#[derive(Error, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenizeErrorKind {
    #[default]
    #[error("unknown token")]
    UnknownToken,

    #[error("expected hex digits after '0x'")]
    ExpectedHexDigit,

    #[error("register number out of range")]
    RegisterOutOfRange,

    #[error("unrecognized register name")]
    UnrecognizedRegisterName,

    #[error("unrecognized escape sequence")]
    UnrecognizedEscapeSequence,

    #[error("unexpected end of file")]
    UnexpectedEndOfFile,

    #[error("unsupported tag")]
    UnsupportedTag,
}

/// A tokenization failure and where it happened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct TokenizingError {
    pub offset: usize,
    pub kind: TokenizeErrorKind,
}

/// Token types for MIPS32 assembly
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = TokenizeErrorKind)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // ========== Instructions ==========
    #[token("add", |_| Mnemonic::Add, ignore(ascii_case))]
    #[token("addi", |_| Mnemonic::Addi, ignore(ascii_case))]
    #[token("and", |_| Mnemonic::And, ignore(ascii_case))]
    #[token("andi", |_| Mnemonic::Andi, ignore(ascii_case))]
    #[token("beq", |_| Mnemonic::Beq, ignore(ascii_case))]
    #[token("bne", |_| Mnemonic::Bne, ignore(ascii_case))]
    #[token("break", |_| Mnemonic::Break, ignore(ascii_case))]
    #[token("div", |_| Mnemonic::Div, ignore(ascii_case))]
    #[token("j", |_| Mnemonic::J, ignore(ascii_case))]
    #[token("jal", |_| Mnemonic::Jal, ignore(ascii_case))]
    #[token("jalr", |_| Mnemonic::Jalr, ignore(ascii_case))]
    #[token("jr", |_| Mnemonic::Jr, ignore(ascii_case))]
    #[token("lb", |_| Mnemonic::Lb, ignore(ascii_case))]
    #[token("lh", |_| Mnemonic::Lh, ignore(ascii_case))]
    #[token("lui", |_| Mnemonic::Lui, ignore(ascii_case))]
    #[token("lw", |_| Mnemonic::Lw, ignore(ascii_case))]
    #[token("mfc0", |_| Mnemonic::Mfc0, ignore(ascii_case))]
    #[token("mfhi", |_| Mnemonic::Mfhi, ignore(ascii_case))]
    #[token("mflo", |_| Mnemonic::Mflo, ignore(ascii_case))]
    #[token("mtc0", |_| Mnemonic::Mtc0, ignore(ascii_case))]
    #[token("mthi", |_| Mnemonic::Mthi, ignore(ascii_case))]
    #[token("mtlo", |_| Mnemonic::Mtlo, ignore(ascii_case))]
    #[token("mult", |_| Mnemonic::Mult, ignore(ascii_case))]
    #[token("nop", |_| Mnemonic::Nop, ignore(ascii_case))]
    #[token("nor", |_| Mnemonic::Nor, ignore(ascii_case))]
    #[token("or", |_| Mnemonic::Or, ignore(ascii_case))]
    #[token("ori", |_| Mnemonic::Ori, ignore(ascii_case))]
    #[token("sb", |_| Mnemonic::Sb, ignore(ascii_case))]
    #[token("sh", |_| Mnemonic::Sh, ignore(ascii_case))]
    #[token("sll", |_| Mnemonic::Sll, ignore(ascii_case))]
    #[token("sllv", |_| Mnemonic::Sllv, ignore(ascii_case))]
    #[token("slt", |_| Mnemonic::Slt, ignore(ascii_case))]
    #[token("slti", |_| Mnemonic::Slti, ignore(ascii_case))]
    #[token("sra", |_| Mnemonic::Sra, ignore(ascii_case))]
    #[token("srav", |_| Mnemonic::Srav, ignore(ascii_case))]
    #[token("srl", |_| Mnemonic::Srl, ignore(ascii_case))]
    #[token("srlv", |_| Mnemonic::Srlv, ignore(ascii_case))]
    #[token("sub", |_| Mnemonic::Sub, ignore(ascii_case))]
    #[token("sw", |_| Mnemonic::Sw, ignore(ascii_case))]
    #[token("syscall", |_| Mnemonic::Syscall, ignore(ascii_case))]
    #[token("xor", |_| Mnemonic::Xor, ignore(ascii_case))]
    #[token("xori", |_| Mnemonic::Xori, ignore(ascii_case))]
    // pseudo-instructions
    #[token("bge", |_| Mnemonic::Bge, ignore(ascii_case))]
    #[token("bgez", |_| Mnemonic::Bgez, ignore(ascii_case))]
    #[token("bgt", |_| Mnemonic::Bgt, ignore(ascii_case))]
    #[token("bgtz", |_| Mnemonic::Bgtz, ignore(ascii_case))]
    #[token("ble", |_| Mnemonic::Ble, ignore(ascii_case))]
    #[token("blez", |_| Mnemonic::Blez, ignore(ascii_case))]
    #[token("blt", |_| Mnemonic::Blt, ignore(ascii_case))]
    #[token("bltz", |_| Mnemonic::Bltz, ignore(ascii_case))]
    #[token("la", |_| Mnemonic::La, ignore(ascii_case))]
    #[token("li", |_| Mnemonic::Li, ignore(ascii_case))]
    #[token("move", |_| Mnemonic::Move, ignore(ascii_case))]
    #[token("mul", |_| Mnemonic::Mul, ignore(ascii_case))]
    Instr(Mnemonic),

    // ========== Tags ==========
    #[token(".data", |_| Section::Data, ignore(ascii_case))]
    #[token(".text", |_| Section::Text, ignore(ascii_case))]
    // any other tag is recognized but rejected
    #[regex(r"\.[a-zA-Z0-9_]+", unsupported_tag)]
    Section(Section),

    #[token(".byte", |_| DataType::Byte, ignore(ascii_case))]
    #[token(".half", |_| DataType::Half, ignore(ascii_case))]
    #[token(".word", |_| DataType::Word, ignore(ascii_case))]
    #[token(".dword", |_| DataType::Dword, ignore(ascii_case))]
    #[token(".float", |_| DataType::Float, ignore(ascii_case))]
    #[token(".double", |_| DataType::Double, ignore(ascii_case))]
    #[token(".ascii", |_| DataType::Ascii, ignore(ascii_case))]
    #[token(".asciiz", |_| DataType::Asciiz, ignore(ascii_case))]
    DataTag(DataType),

    #[token(".globl", ignore(ascii_case))]
    Globl,

    #[token(".extern", ignore(ascii_case))]
    Extern,

    // ========== Operands ==========
    #[regex(r"\$[0-9]+", register_number)]
    #[regex(r"\$[a-zA-Z][a-zA-Z0-9]*", register_name)]
    Register(u8),

    #[regex(r"-?[0-9]+", dec_literal, priority = 3)]
    #[regex(r"-?0x[0-9a-fA-F]+", hex_literal)]
    // a bare "0x" with no digits is always a mistake
    #[regex(r"-?0x", missing_hex_digits)]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]*", float_literal)]
    Float(f64),

    #[regex(r#""([^"\\]|\\[\s\S])*""#, string_literal)]
    #[regex(r#""([^"\\]|\\[\s\S])*"#, unterminated_string)]
    Str(String),

    #[regex(r"[a-zA-Z0-9][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Label(String),

    // ========== Punctuation ==========
    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,
}

fn unsupported_tag(_lex: &mut logos::Lexer<Token>) -> Result<Section, TokenizeErrorKind> {
    Err(TokenizeErrorKind::UnsupportedTag)
}

fn register_number(lex: &mut logos::Lexer<Token>) -> Result<u8, TokenizeErrorKind> {
    lex.slice()[1..]
        .parse::<u8>()
        .ok()
        .filter(|&number| number <= 31)
        .ok_or(TokenizeErrorKind::RegisterOutOfRange)
}

fn register_name(lex: &mut logos::Lexer<Token>) -> Result<u8, TokenizeErrorKind> {
    let name = lex.slice()[1..].to_ascii_lowercase();
    let number = match name.as_str() {
        "zero" => 0,
        "at" => 1,
        "v0" => 2,
        "v1" => 3,
        "a0" => 4,
        "a1" => 5,
        "a2" => 6,
        "a3" => 7,
        "t0" => 8,
        "t1" => 9,
        "t2" => 10,
        "t3" => 11,
        "t4" => 12,
        "t5" => 13,
        "t6" => 14,
        "t7" => 15,
        "s0" => 16,
        "s1" => 17,
        "s2" => 18,
        "s3" => 19,
        "s4" => 20,
        "s5" => 21,
        "s6" => 22,
        "s7" => 23,
        "t8" => 24,
        "t9" => 25,
        "k0" => 26,
        "k1" => 27,
        "gp" => 28,
        "sp" => 29,
        "fp" => 30,
        "ra" => 31,
        _ => return Err(TokenizeErrorKind::UnrecognizedRegisterName),
    };
    Ok(number)
}

fn dec_literal(lex: &mut logos::Lexer<Token>) -> Result<i64, TokenizeErrorKind> {
    lex.slice()
        .parse::<i64>()
        .map_err(|_| TokenizeErrorKind::UnknownToken)
}

fn hex_literal(lex: &mut logos::Lexer<Token>) -> Result<i64, TokenizeErrorKind> {
    let slice = lex.slice();
    let (negative, rest) = match slice.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, slice),
    };
    let value = i64::from_str_radix(&rest[2..], 16).map_err(|_| TokenizeErrorKind::UnknownToken)?;
    Ok(if negative { -value } else { value })
}

fn missing_hex_digits(_lex: &mut logos::Lexer<Token>) -> Result<i64, TokenizeErrorKind> {
    Err(TokenizeErrorKind::ExpectedHexDigit)
}

fn float_literal(lex: &mut logos::Lexer<Token>) -> Result<f64, TokenizeErrorKind> {
    lex.slice()
        .parse::<f64>()
        .map_err(|_| TokenizeErrorKind::UnknownToken)
}

fn string_literal(lex: &mut logos::Lexer<Token>) -> Result<String, TokenizeErrorKind> {
    let slice = lex.slice();
    unescape(&slice[1..slice.len() - 1])
}

fn unterminated_string(_lex: &mut logos::Lexer<Token>) -> Result<String, TokenizeErrorKind> {
    Err(TokenizeErrorKind::UnexpectedEndOfFile)
}

fn unescape(text: &str) -> Result<String, TokenizeErrorKind> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        // the quoted-string regex guarantees a character follows
        let escape = chars
            .next()
            .ok_or(TokenizeErrorKind::UnexpectedEndOfFile)?;
        out.push(match escape {
            '\'' => '\'',
            '"' => '"',
            '\\' => '\\',
            '0' => '\0',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            _ => return Err(TokenizeErrorKind::UnrecognizedEscapeSequence),
        });
    }
    Ok(out)
}

/// A token and the byte range of source text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Range<usize>,
}

/// Tokenize an entire source file, stopping at the first bad token.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, TokenizingError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(SpannedToken {
                token,
                span: lexer.span(),
            }),
            Err(kind) => {
                return Err(TokenizingError {
                    offset: lexer.span().start,
                    kind,
                })
            }
        }
    }
    Ok(tokens)
}
