//! Byte materialization after parsing.
//!
//! Checks that every referenced label is defined, emits each section's
//! bytes, renders the human-readable listing and packages everything
//! into an executable container.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use thiserror::Error;
use tracing::debug;

use mips32_object::{DebugInfo, ExecutableBinary, Segment};

use crate::bin::{BinElement, EncodeError, LabelTable};
use crate::lexer::SpannedToken;
use crate::lines::LineIndex;
use crate::parser::Binarization;

/// Execution starts at this label; it must exist even without an
/// explicit `.globl`.
pub const ENTRY_LABEL: &str = "main";

/// All labels that were referenced or exported but never defined,
/// reported in one batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct UndefinedLabelsError {
    pub missing: Vec<String>,
}

impl std::fmt::Display for UndefinedLabelsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "undefined labels: {}", self.missing.join(", "))
    }
}

/// Verify that the label table covers every dependency, including the
/// mandatory entry label.
pub fn check_labels(binarization: &Binarization) -> Result<(), UndefinedLabelsError> {
    let mut required = BTreeSet::new();
    required.insert(ENTRY_LABEL.to_string());
    for element in binarization
        .data_elements
        .iter()
        .chain(&binarization.text_elements)
    {
        element.collect_label_deps(&mut required);
    }

    let defined: BTreeSet<String> = binarization
        .labels
        .names()
        .map(str::to_string)
        .collect();
    let missing: Vec<String> = required.difference(&defined).cloned().collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(UndefinedLabelsError { missing })
    }
}

/// Emit one section's bytes, advancing the element base address as the
/// elements declared their lengths.
pub fn emit_section(
    elements: &[BinElement],
    base_address: u32,
    labels: &LabelTable,
) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    let mut address = base_address;
    for element in elements {
        element.encode(labels, address, &mut bytes)?;
        address += element.len();
    }
    Ok(bytes)
}

/// Package both sections, the entry point and optional debug info into
/// a container.
pub fn to_binary(
    binarization: &Binarization,
    debug_info: Option<&DebugInfo>,
) -> Result<ExecutableBinary, EncodeError> {
    let data = emit_section(
        &binarization.data_elements,
        binarization.data_address,
        &binarization.labels,
    )?;
    let text = emit_section(
        &binarization.text_elements,
        binarization.text_address,
        &binarization.labels,
    )?;
    let entry = binarization
        .labels
        .get(ENTRY_LABEL)
        .ok_or_else(|| EncodeError::UnresolvedLabel(ENTRY_LABEL.to_string()))?;
    debug!(
        data_bytes = data.len(),
        text_bytes = text.len(),
        entry,
        "emitted sections"
    );

    let mut segments = vec![
        Segment::memory(binarization.data_address, data),
        Segment::memory(binarization.text_address, text),
        Segment::entrypoint(entry),
    ];
    if let Some(info) = debug_info {
        segments.push(info.to_segment());
    }
    Ok(ExecutableBinary::new(segments))
}

/// Build source-level debug information for the text section.
pub fn build_debug_info(
    binarization: &Binarization,
    tokens: &[SpannedToken],
    lines: &LineIndex,
    input_path: &str,
) -> DebugInfo {
    let mut info = DebugInfo::new(input_path.to_string(), binarization.labels.to_map());
    let mut address = binarization.text_address;
    for element in &binarization.text_elements {
        if element.is_code() {
            let offset = tokens[element.token_start].span.start;
            let (line, _) = lines.line_col(offset);
            info.record(line as u32, address);
        }
        address += element.len();
    }
    info
}

/// Render both sections as `address: word` lines with the source text
/// alongside, the way a disassembly listing reads.
pub fn listing(
    binarization: &Binarization,
    tokens: &[SpannedToken],
    source: &str,
) -> Result<String, EncodeError> {
    let mut out = String::new();
    render_section(
        &mut out,
        ".data",
        &binarization.data_elements,
        binarization.data_address,
        binarization,
        tokens,
        source,
    )?;
    render_section(
        &mut out,
        ".text",
        &binarization.text_elements,
        binarization.text_address,
        binarization,
        tokens,
        source,
    )?;
    Ok(out)
}

fn render_section(
    out: &mut String,
    title: &str,
    elements: &[BinElement],
    base_address: u32,
    binarization: &Binarization,
    tokens: &[SpannedToken],
    source: &str,
) -> Result<(), EncodeError> {
    if elements.is_empty() {
        return Ok(());
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(title);
    out.push('\n');

    let mut address = base_address;
    for element in elements {
        let mut bytes = Vec::new();
        element.encode(&binarization.labels, address, &mut bytes)?;

        let mut rows: Vec<String> = bytes
            .chunks(4)
            .enumerate()
            .map(|(index, word)| {
                let value = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
                format!("{:08X}: {value:08X}", address + 4 * index as u32)
            })
            .collect();

        let text = source_text(element, tokens, source);
        for (index, line) in text.lines().enumerate() {
            if index < rows.len() {
                let _ = write!(rows[index], " # {line}");
            } else {
                // width of "AAAAAAAA: WWWWWWWW"
                rows.push(format!("{:18} # {line}", ""));
            }
        }

        for row in rows {
            out.push_str(&row);
            out.push('\n');
        }
        address += element.len();
    }
    Ok(())
}

fn source_text<'s>(element: &BinElement, tokens: &[SpannedToken], source: &'s str) -> &'s str {
    let start = tokens[element.token_start].span.start;
    let end = tokens[element.token_end - 1].span.end;
    &source[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser;

    const DATA_BASE: u32 = 0x1000_0000;
    const TEXT_BASE: u32 = 0x0040_0000;

    fn binarize(source: &str) -> Binarization {
        let tokens = tokenize(source).unwrap();
        parser::parse(&tokens, DATA_BASE, TEXT_BASE).unwrap()
    }

    #[test]
    fn test_missing_labels_reported_in_one_batch() {
        let binarization = binarize("j foo\nbeq $0, $0, bar");
        let error = check_labels(&binarization).unwrap_err();
        // sorted, and the implicit entry label is required too
        assert_eq!(error.missing, vec!["bar", "foo", "main"]);
    }

    #[test]
    fn test_exported_label_must_be_defined() {
        let binarization = binarize(".globl helper\nmain: nop");
        let error = check_labels(&binarization).unwrap_err();
        assert_eq!(error.missing, vec!["helper"]);
    }

    #[test]
    fn test_extern_satisfies_references() {
        let binarization = binarize(".extern uart 0xFFFF0000\nmain: la $t0, uart");
        assert!(check_labels(&binarization).is_ok());
    }

    #[test]
    fn test_emit_text_section() {
        let binarization = binarize("main: li $t0, 0x12345678");
        check_labels(&binarization).unwrap();
        let bytes =
            emit_section(&binarization.text_elements, TEXT_BASE, &binarization.labels).unwrap();
        assert_eq!(
            bytes,
            vec![0x3C, 0x01, 0x12, 0x34, 0x38, 0x28, 0x56, 0x78]
        );
    }

    #[test]
    fn test_container_layout() {
        let binarization = binarize(".data\nvalue: .word 7\n.text\nmain: lw $t0, 0($at)");
        let binary = to_binary(&binarization, None).unwrap();

        assert_eq!(binary.segments.len(), 3);
        let memory: Vec<_> = binary.memory_segments().collect();
        assert_eq!(memory[0].address().unwrap(), DATA_BASE);
        assert_eq!(memory[0].payload, vec![0, 0, 0, 7]);
        assert_eq!(memory[1].address().unwrap(), TEXT_BASE);
        assert_eq!(binary.entry_point().unwrap(), TEXT_BASE);
    }

    #[test]
    fn test_debug_info_lines() {
        let source = "main: nop\nloop: nop\nj loop";
        let tokens = tokenize(source).unwrap();
        let binarization = parser::parse(&tokens, DATA_BASE, TEXT_BASE).unwrap();
        let lines = LineIndex::new(source);
        let info = build_debug_info(&binarization, &tokens, &lines, "demo.asm");

        assert_eq!(info.line_to_address(1), Some(TEXT_BASE));
        assert_eq!(info.line_to_address(2), Some(TEXT_BASE + 4));
        assert_eq!(info.address_to_line(TEXT_BASE + 8), Some(3));
        assert_eq!(info.labels.get("loop"), Some(&(TEXT_BASE + 4)));
    }

    #[test]
    fn test_listing_format() {
        let source = "main: beq $0, $0, main";
        let tokens = tokenize(source).unwrap();
        let binarization = parser::parse(&tokens, DATA_BASE, TEXT_BASE).unwrap();
        let text = listing(&binarization, &tokens, source).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], ".text");
        // the label emits no bytes, so its row is all padding
        assert_eq!(lines[1], format!("{:18} # main:", ""));
        assert_eq!(lines[2], "00400000: 1000FFFF # beq $0, $0, main");
    }

    #[test]
    fn test_listing_data_section_comes_first() {
        let source = ".data\nx: .byte 1, 2, 3\n.text\nmain: nop";
        let tokens = tokenize(source).unwrap();
        let binarization = parser::parse(&tokens, DATA_BASE, TEXT_BASE).unwrap();
        let text = listing(&binarization, &tokens, source).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], ".data");
        assert_eq!(lines[2], "10000000: 01020300 # .byte 1, 2, 3");
        assert!(lines.contains(&".text"));
    }
}
