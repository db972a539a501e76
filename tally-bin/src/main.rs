use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tally_core::config::{InputFormat, JobConfig, SinkConfig, SinkKind};
use tally_core::{Executor, RunSummary};
use tally_io::{FileSink, FileSource};
use tally_ops::MovingAverage;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Trailing-window moving average of event durations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute moving averages for a single input file
    Run {
        /// Path to the input file
        #[arg(long = "input_file")]
        input_file: PathBuf,
        /// Window size in minutes
        #[arg(long = "window_size", allow_negative_numbers = true)]
        window_size: i64,
        /// Output file (default: output_<window_size>.json)
        #[arg(short, long, conflicts_with = "stdout")]
        output: Option<PathBuf>,
        /// Write results to stdout instead of a file
        #[arg(long)]
        stdout: bool,
        #[arg(long, value_enum, default_value_t = Format::Jsonl)]
        format: Format,
        /// Dump Prometheus metrics to stderr when done
        #[arg(long)]
        print_metrics: bool,
    },
    /// Run a job described by a TOML file
    Job {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        print_metrics: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Jsonl,
    Csv,
}

impl From<Format> for InputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Jsonl => InputFormat::Jsonl,
            Format::Csv => InputFormat::Csv,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (cfg, print_metrics) = match cli.command {
        Commands::Run { input_file, window_size, output, stdout, format, print_metrics } => {
            let mut cfg = JobConfig::new(input_file, window_size);
            cfg.source.format = format.into();
            cfg.sink = SinkConfig {
                kind: if stdout { SinkKind::Stdout } else { SinkKind::File },
                path: output,
            };
            (cfg, print_metrics)
        }
        Commands::Job { config, print_metrics } => (load_config(&config).await?, print_metrics),
    };

    let summary = run_job(&cfg).await?;
    tracing::info!(records = summary.records, "done");
    if print_metrics {
        eprint!("{}", tally_core::metrics::render_prometheus());
    }
    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading job config {}", path.display()))?;
    let cfg: JobConfig =
        toml::from_str(&text).with_context(|| format!("parsing job config {}", path.display()))?;
    Ok(cfg)
}

async fn run_job(cfg: &JobConfig) -> anyhow::Result<RunSummary> {
    cfg.validate()?;

    // Build the operator first so a bad window fails before any file is touched.
    let op = MovingAverage::minutes(cfg.window.size_minutes)?;
    let src = FileSource::open(&cfg.source.path, cfg.source.format).await?;
    let sink = match cfg.output_path() {
        Some(path) => FileSink::create(&path).await?,
        None => FileSink::stdout(),
    };

    tracing::info!(
        input = %cfg.source.path.display(),
        window_minutes = cfg.window.size_minutes,
        output = sink.target(),
        "starting run"
    );

    let mut exec = Executor::new();
    exec.source(src).operator(op).sink(sink);
    let summary = exec
        .run()
        .await
        .with_context(|| format!("processing {}", cfg.source.path.display()))?;
    Ok(summary)
}
