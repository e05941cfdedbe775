//! MIPS32 assembler.
//!
//! Compiles assembly source into an executable container holding the
//! data section, the text section, the entry point and optionally a
//! debug information segment.
//!
//! # Pipeline
//!
//! 1. **Lexer** - tokenizes the source with byte spans
//! 2. **Parser** - one pass producing binary elements and the label table
//! 3. **Compiler** - checks labels, resolves addresses and emits bytes
//!
//! Element lengths depend only on syntax, so a single parse pass
//! suffices even with forward references; values are materialized once
//! the label table is complete.
//!
//! # Example
//!
//! ```
//! use mips32_assembler::{assemble, Options};
//!
//! let source = r#"
//!     main:
//!         li $t0, 42
//!         jr $ra
//! "#;
//!
//! let binary = assemble(source, &Options::default()).unwrap();
//! assert_eq!(binary.entry_point().unwrap(), 0x0040_0000);
//! ```

pub mod bin;
pub mod compiler;
pub mod lexer;
pub mod lines;
pub mod parser;

use thiserror::Error;
use tracing::debug;

use mips32_object::ExecutableBinary;

use crate::lexer::{SpannedToken, TokenizingError};
use crate::lines::LineIndex;
use crate::parser::{Binarization, ParsingError};

pub use crate::bin::{BinElement, BinKind, EncodeError, Imm, Instr, LabelTable};
pub use crate::compiler::{UndefinedLabelsError, ENTRY_LABEL};
pub use crate::lexer::{tokenize, Mnemonic, Token};

/// Default base address of the data section.
pub const DEFAULT_DATA_ADDRESS: u32 = 0x1000_0000;
/// Default base address of the text section.
pub const DEFAULT_TEXT_ADDRESS: u32 = 0x0040_0000;

/// Knobs for one assembly run.
#[derive(Debug, Clone)]
pub struct Options {
    pub data_address: u32,
    pub text_address: u32,
    /// Attach a debug information segment to the container.
    pub debug_info: bool,
    /// Recorded in the debug information segment.
    pub input_path: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            data_address: DEFAULT_DATA_ADDRESS,
            text_address: DEFAULT_TEXT_ADDRESS,
            debug_info: false,
            input_path: String::new(),
        }
    }
}

/// A front-end failure pinned to a source location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column}")]
pub struct CompilingError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub length: usize,
    pub message: String,
}

impl CompilingError {
    fn from_tokenizing(error: &TokenizingError, lines: &LineIndex) -> Self {
        let (line, column) = lines.line_col(error.offset);
        Self {
            offset: error.offset,
            line,
            column,
            length: 1,
            message: error.kind.to_string(),
        }
    }

    fn from_parsing(
        error: &ParsingError,
        tokens: &[SpannedToken],
        lines: &LineIndex,
    ) -> Self {
        match tokens.get(error.token_index) {
            Some(spanned) => {
                let (line, column) = lines.line_col(spanned.span.start);
                Self {
                    offset: spanned.span.start,
                    line,
                    column,
                    length: spanned.span.len(),
                    message: error.kind.to_string(),
                }
            }
            None => Self {
                offset: 0,
                line: 1,
                column: 1,
                length: 0,
                message: error.kind.to_string(),
            },
        }
    }
}

/// Assembler errors
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error(transparent)]
    Compile(#[from] CompilingError),

    #[error(transparent)]
    UndefinedLabels(#[from] UndefinedLabelsError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

pub type Result<T> = std::result::Result<T, AssembleError>;

fn front_end(source: &str, options: &Options) -> Result<(Vec<SpannedToken>, Binarization)> {
    let lines = LineIndex::new(source);
    let tokens = lexer::tokenize(source)
        .map_err(|error| CompilingError::from_tokenizing(&error, &lines))?;
    debug!(tokens = tokens.len(), "tokenized");

    let binarization = parser::parse(&tokens, options.data_address, options.text_address)
        .map_err(|error| CompilingError::from_parsing(&error, &tokens, &lines))?;
    debug!(
        data_elements = binarization.data_elements.len(),
        text_elements = binarization.text_elements.len(),
        "parsed"
    );

    compiler::check_labels(&binarization)?;
    Ok((tokens, binarization))
}

/// Assemble source into an executable container.
pub fn assemble(source: &str, options: &Options) -> Result<ExecutableBinary> {
    let (tokens, binarization) = front_end(source, options)?;
    let debug_info = options.debug_info.then(|| {
        let lines = LineIndex::new(source);
        compiler::build_debug_info(&binarization, &tokens, &lines, &options.input_path)
    });
    Ok(compiler::to_binary(&binarization, debug_info.as_ref())?)
}

/// Assemble source and render the human-readable listing instead of a
/// container.
pub fn assemble_listing(source: &str, options: &Options) -> Result<String> {
    let (tokens, binarization) = front_end(source, options)?;
    Ok(compiler::listing(&binarization, &tokens, source)?)
}
