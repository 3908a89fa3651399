use anyhow::Result;
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use incidencia::{config::PipelineConfig, process, store};
use std::{path::PathBuf, time::Instant};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the long-form municipal incidence table from a SESNSP snapshot.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML pipeline config. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raw municipal file (.csv, or a .zip holding one).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Parquet file to write.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Text encoding of the raw file (latin1 or utf-8).
    #[arg(long)]
    encoding: Option<process::Encoding>,

    /// Rows of the result to print when done.
    #[arg(long, default_value_t = 10)]
    preview: usize,

    /// Debug-level logging.
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let default_filter = if args.verbose { "debug" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) resolve config ───────────────────────────────────────────
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(input) = args.input {
        cfg.input = input;
    }
    if let Some(output) = args.output {
        cfg.output = output;
    }
    if let Some(encoding) = args.encoding {
        cfg.encoding = encoding;
    }
    info!(input = %cfg.input.display(), output = %cfg.output.display(), encoding = %cfg.encoding, "startup");

    // ─── 3) run pipeline and persist ─────────────────────────────────
    let start = Instant::now();
    let table = process::run_file(&cfg.input, &cfg.load_options()?)?;
    store::write_parquet(&table, &cfg.output)?;
    info!(rows = table.num_rows(), elapsed = ?start.elapsed(), "done");

    if args.preview > 0 {
        let head = table.slice(0, args.preview.min(table.num_rows()));
        println!("{}", pretty_format_batches(&[head])?);
    }
    Ok(())
}
