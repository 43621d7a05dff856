use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use pipeline::Pipeline;
use ragchunk_chunker::{Chunker, ChunkerConfig, DocumentKind};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod pipeline;
mod scanner;

#[derive(Parser)]
#[command(name = "ragchunk")]
#[command(about = "Token-bounded semantic chunking for retrieval pipelines", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSONL)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a ragchunk.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the nominal token budget per chunk
    #[arg(long, global = true)]
    target_limit: Option<usize>,

    /// Override the fraction of the budget held in reserve
    #[arg(long, global = true)]
    safety_margin: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk every configured input directory into one JSONL file
    Run(RunArgs),

    /// Chunk a single file and print JSONL to stdout
    Chunk(ChunkArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Python source directories
    #[arg(long)]
    python: Vec<PathBuf>,

    /// Web documentation directories (JSON records)
    #[arg(long)]
    web: Vec<PathBuf>,

    /// API reference directories (JSON records)
    #[arg(long)]
    api: Vec<PathBuf>,

    /// Notebook export directories (JSON)
    #[arg(long)]
    notebook: Vec<PathBuf>,

    /// PDF-derived markdown directories
    #[arg(long)]
    pdf: Vec<PathBuf>,

    /// Output JSONL path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ChunkArgs {
    /// File to chunk
    path: PathBuf,

    /// Document kind (source, web, notebook, pdf); guessed from the path when omitted
    #[arg(short, long)]
    kind: Option<DocumentKind>,

    /// Log chunk statistics when done
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut app_config = AppConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut app_config.chunker, &cli);
    let chunker = Chunker::new(app_config.chunker.clone()).context("Invalid chunker settings")?;
    log::debug!(
        "Safe limit {} tokens ({})",
        chunker.counter().safe_limit(),
        chunker.counter().encoding()
    );

    match cli.command {
        Commands::Run(args) => {
            let mut inputs = app_config.inputs;
            inputs.python.extend(args.python);
            inputs.web.extend(args.web);
            inputs.api.extend(args.api);
            inputs.notebook.extend(args.notebook);
            inputs.pdf.extend(args.pdf);
            if let Some(output) = args.output {
                inputs.output = output;
            }
            if inputs.is_empty() {
                bail!("No input directories configured; pass --python/--web/--api/--notebook/--pdf or --config");
            }

            let stats = Pipeline::new(chunker, cli.quiet).run(&inputs)?;
            if stats.files == 0 && stats.failures > 0 {
                bail!("Every input file failed ({} failures)", stats.failures);
            }
        }
        Commands::Chunk(args) => {
            let kind = match args.kind.or_else(|| DocumentKind::from_path(&args.path)) {
                Some(kind) => kind,
                None => bail!(
                    "Cannot tell the document kind of {}; pass --kind",
                    args.path.display()
                ),
            };

            let chunks = pipeline::segment_path(&chunker, kind, &args.path)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for chunk in &chunks {
                writeln!(out, "{}", chunk.to_json_line()?)?;
            }
            out.flush()?;

            if args.stats {
                log::info!("{}", Chunker::get_stats(&chunks));
            }
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut ChunkerConfig, cli: &Cli) {
    if let Some(target_limit) = cli.target_limit {
        config.target_limit = target_limit;
    }
    if let Some(safety_margin) = cli.safety_margin {
        config.safety_margin = safety_margin;
    }
}
