//! mips32-as CLI entry point.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mips32_assembler::{assemble, assemble_listing, AssembleError, CompilingError, Options};

#[derive(Parser)]
#[command(name = "mips32-as")]
#[command(about = "Assemble MIPS32 source into an executable container", long_about = None)]
struct Cli {
    /// Assembly source file
    input: PathBuf,

    /// Where to write the container (defaults to the input with a .bin
    /// extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base address of the text section (decimal or 0x hex)
    #[arg(short, long, value_parser = parse_address, default_value = "0x00400000")]
    text_address: u32,

    /// Base address of the data section (decimal or 0x hex)
    #[arg(short, long, value_parser = parse_address, default_value = "0x10000000")]
    data_address: u32,

    /// Print a human-readable listing instead of writing a container
    #[arg(short, long)]
    listing: bool,

    /// Attach a debug information segment
    #[arg(short = 'g', long)]
    debug_info: bool,
}

/// Addresses are taken in decimal or `0x` hex and truncated to a word
/// boundary.
fn parse_address(text: &str) -> Result<u32, String> {
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => text.parse(),
    };
    value
        .map(|address| address & !3)
        .map_err(|_| format!("invalid address '{text}'"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let options = Options {
        data_address: cli.data_address,
        text_address: cli.text_address,
        debug_info: cli.debug_info,
        input_path: cli.input.display().to_string(),
    };

    if cli.listing {
        let listing = assemble_listing(&source, &options)
            .map_err(|error| report(&cli, &source, error))?;
        print!("{listing}");
        return Ok(());
    }

    let binary =
        assemble(&source, &options).map_err(|error| report(&cli, &source, error))?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("bin"));
    let bytes = binary.to_bytes();
    fs::write(&output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(bytes = bytes.len(), output = %output.display(), "wrote container");

    println!(
        "{} {} -> {} ({} bytes)",
        "✓".green().bold(),
        cli.input.display().to_string().bright_black(),
        output.display(),
        bytes.len()
    );
    Ok(())
}

/// Print the offending source line with the error span highlighted,
/// then turn the failure into a plain error for the exit path.
fn report(cli: &Cli, source: &str, error: AssembleError) -> anyhow::Error {
    if let AssembleError::Compile(compile) = &error {
        print_source_context(cli, source, compile);
    }
    anyhow::anyhow!("{error}")
}

fn print_source_context(cli: &Cli, source: &str, error: &CompilingError) {
    let Some(line_text) = source.lines().nth(error.line - 1) else {
        return;
    };
    eprintln!(
        "{}:{}:{}",
        cli.input.display().to_string().bold(),
        error.line,
        error.column
    );
    eprintln!("    {line_text}");
    let caret = format!(
        "{}{}",
        " ".repeat(error.column - 1),
        "^".repeat(error.length.max(1))
    );
    eprintln!("    {}", caret.red().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x00400000").unwrap(), 0x0040_0000);
        assert_eq!(parse_address("0X10").unwrap(), 0x10);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        // truncated to a word boundary
        assert_eq!(parse_address("0x00400003").unwrap(), 0x0040_0000);
        assert!(parse_address("axe").is_err());
        assert!(parse_address("0x").is_err());
    }
}
