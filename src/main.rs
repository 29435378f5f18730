//! PDF Squeeze CLI
//!
//! Command-line interface for shrinking PDFs.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_squeeze::{
    extract_pdf_images_info, file_ops::compress_pdf_file, validate_input, CompressOptions,
    CompressionLevel, ImageOutcome, MAX_INPUT_BYTES,
};
use std::fs;
use std::path::PathBuf;

/// Shrink a PDF by recompressing its images and repacking its structure
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PDF file path
    #[arg(short, long)]
    input: PathBuf,

    /// Output PDF file path
    #[arg(short, long, required_unless_present = "inspect")]
    output: Option<PathBuf>,

    /// Compression level: lossless, balanced or strong
    #[arg(short, long, default_value = "balanced")]
    level: CompressionLevel,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// List the images on each page and exit without writing anything
    #[arg(long)]
    inspect: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if args.inspect {
        let input = fs::read(&args.input)
            .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;
        validate_input(&input, MAX_INPUT_BYTES)
            .with_context(|| format!("Rejected input file: {}", args.input.display()))?;
        return inspect(&input);
    }

    let output_path = args
        .output
        .as_ref()
        .context("An output path is required unless --inspect is given")?;

    let options = CompressOptions {
        level: args.level,
        verbose: args.verbose > 0,
    };

    println!("PDF Squeeze");
    println!("===========");

    let result = compress_pdf_file(&args.input, output_path, &options)
        .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    if options.verbose {
        for (id, outcome) in &result.outcomes {
            match outcome {
                ImageOutcome::Swapped {
                    old_size,
                    new_size,
                    width,
                    height,
                } => println!(
                    "  {} {}: {} -> {} bytes ({}x{})",
                    id.0, id.1, old_size, new_size, width, height
                ),
                ImageOutcome::Skipped(reason) => println!("  {} {}: skipped, {}", id.0, id.1, reason),
            }
        }
    }

    println!(
        "\nDone! Processed {} images: {} recompressed, {} skipped",
        result.total_images, result.recompressed_images, result.skipped_images
    );
    if result.is_reduced() {
        println!(
            "Size: {} -> {} bytes ({:.1}% smaller)",
            result.original_size,
            result.output_size,
            result.reduction_percent()
        );
    } else {
        println!(
            "No reduction achieved; the original document was kept ({} bytes)",
            result.original_size
        );
    }
    println!("Output saved to: {:?}", output_path);

    Ok(())
}

fn inspect(input: &[u8]) -> Result<()> {
    let pages = extract_pdf_images_info(input).context("Failed to inspect PDF")?;
    if pages.is_empty() {
        println!("No images found");
        return Ok(());
    }

    for page in pages {
        println!("Page {}:", page.page_number);
        for img in page.images {
            println!(
                "  {} {} {:<5} {}x{} {} {}bpc {} {} bytes: {}",
                img.object_id.0,
                img.object_id.1,
                img.role,
                img.width,
                img.height,
                img.color_space,
                img.bits_per_component,
                img.filter,
                img.size_bytes,
                img.verdict
            );
        }
    }
    Ok(())
}
