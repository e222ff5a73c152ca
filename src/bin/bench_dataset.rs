use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lookahead::bench::{BenchConfig, run_dataset};
use lookahead::lookahead::LookaheadConfig;
use lookahead::solver::Backend;

#[derive(Debug, Parser)]
#[command(name = "bench_dataset")]
struct Cli {
    #[arg(long)]
    dir: String,
    #[arg(long, default_value = "lookahead")]
    backend: String,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long = "timeout_ms", default_value_t = 30000)]
    timeout_ms: u64,
    #[arg(long)]
    csv: String,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long = "no-double", default_value_t = false)]
    no_double: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    run_from_args(&cli)
}

fn run_from_args(cli: &Cli) -> Result<()> {
    let cfg = BenchConfig {
        backend: Backend::parse(&cli.backend)?,
        lookahead: LookaheadConfig {
            seed: cli.seed,
            double_lookahead: !cli.no_double,
            ..LookaheadConfig::default()
        },
    };
    let rows = run_dataset(
        &PathBuf::from(&cli.dir),
        cfg,
        Duration::from_millis(cli.timeout_ms),
        &PathBuf::from(&cli.csv),
        cli.progress,
    )?;
    println!("rows={}", rows.len());
    Ok(())
}
