use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use hangulpdf::{extract, ExtractOptions, PipelineConfig, PostprocessConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hangulpdf")]
#[command(about = "Extract text from Korean PDF documents, with OCR for scanned pages", long_about = None)]
struct Cli {
    /// Input PDF path
    input: PathBuf,

    /// OCR pages that have little or no native text
    #[arg(long)]
    ocr: bool,

    /// Rasterization resolution for OCR
    #[arg(long)]
    dpi: Option<u32>,

    /// Normalize native text too
    #[arg(long)]
    clean_text: bool,

    /// Apply the Korean OCR look-alike substitution table
    #[arg(long)]
    korean_corrections: bool,

    /// Render detected tables as markdown
    #[arg(long)]
    markdown_tables: bool,

    /// Pipeline configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    /// Full result with per-page diagnostics
    Json,
    /// Document text only
    Text,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hangulpdf=warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut pipeline: PipelineConfig = match &cli.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    if let Some(dpi) = cli.dpi {
        pipeline.dpi = dpi;
    }
    if cli.korean_corrections {
        pipeline.postprocess.substitutions = PostprocessConfig::with_korean_corrections().substitutions;
    }
    if cli.markdown_tables {
        pipeline.postprocess.markdown_tables = true;
    }

    let options = ExtractOptions {
        use_enhanced_ocr: cli.ocr,
        clean_text: cli.clean_text,
        pipeline,
    };

    let bytes = std::fs::read(&cli.input)?;
    let output = extract(&bytes, &options);

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if let Some(err) = &output.error {
                eprintln!("{err}");
            }
            if !output.text.is_empty() {
                println!("{}", output.text);
            }
        }
    }

    if output.error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}
