//! ovfedit CLI - Convert OVF descriptors between hypervisors.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ovfedit_core::{convert_file, parse_document};

/// Convert OVF virtual-machine descriptors to VMware-friendly form while
/// preserving the document's formatting.
#[derive(Parser)]
#[command(name = "ovfedit")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an .ovf file to a VMware-friendly variant.
    Convert {
        /// Path to the .ovf file to convert.
        input: PathBuf,

        /// Output file path. Defaults to "<name>-vmware.ovf" beside the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display the system settings and hardware items of an .ovf file.
    Info {
        /// Path to the .ovf file to inspect.
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert { input, output } => {
            run_convert(&input, output.as_deref())?;
        }
        Commands::Info { input } => {
            show_info(&input)?;
        }
    }

    Ok(())
}

fn run_convert(input: &Path, output: Option<&Path>) -> Result<()> {
    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_path(input),
    };

    convert_file(input, &output_path)
        .with_context(|| format!("failed to convert '{}'", input.display()))?;

    println!("Saved converted file to '{}'", output_path.display());

    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed to read '{}'", input.display()))?;
    let summary = parse_document(&raw)
        .with_context(|| format!("failed to parse '{}'", input.display()))?;

    println!("OVF Information");
    println!("===============");
    println!();

    match summary.system {
        Some(system) => {
            println!("System:    {}", system.element_name);
            println!("Identity:  {}", system.virtual_system_identifier);
            println!("Type:      {}", system.virtual_system_type);
        }
        None => println!("System:    None"),
    }
    println!();

    if summary.items.is_empty() {
        println!("Hardware:  None");
    } else {
        println!("Hardware:");
        for (i, item) in summary.items.iter().enumerate() {
            println!(
                "  {}. {} (resource type {})",
                i + 1,
                display_name(item),
                item.resource_type
            );
        }
    }

    Ok(())
}

fn display_name(item: &ovfedit_core::HardwareItem) -> &str {
    if item.element_name.is_empty() {
        if item.caption.is_empty() {
            "(unnamed)"
        } else {
            &item.caption
        }
    } else {
        &item.element_name
    }
}

/// Default output path: the input's file name with a "-vmware" suffix
/// before the extension, in the same directory.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted");
    let extension = input
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("ovf");

    input.with_file_name(format!("{}-vmware.{}", stem, extension))
}
