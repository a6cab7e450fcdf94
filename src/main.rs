use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use log::{info, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;

use nfft_flags::config::{Overrides, SweepConfig};
use nfft_flags::report::{write_header, ReportWriter};
use nfft_flags::sweep::Sweep;

const USAGE: &str = "flags type first last trials d m";

/// Benchmark NFFT window precomputation strategies.
#[derive(Parser, Debug)]
#[command(name = "flags", version, allow_negative_numbers = true)]
struct Cli {
    /// 0 sweeps the size exponent l, 1 sweeps the cutoff m
    mode: i64,
    /// First exponent or cutoff
    first: i64,
    /// Last exponent or cutoff, inclusive
    last: i64,
    /// Measurement passes per configuration
    trials: i64,
    /// Dimension d
    dims: i64,
    /// Cutoff m in mode 0, problem size N in mode 1
    param: i64,
    /// Seed for the node and coefficient generator
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Largest size exponent that still runs the reference and pre_full_psi
    #[arg(long)]
    size_cap: Option<usize>,
    /// Refuse precomputed tables above this many bytes
    #[arg(long)]
    max_table_bytes: Option<usize>,
    /// Seconds a timing must accumulate before it is trusted
    #[arg(long)]
    noise_floor: Option<f64>,
    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            size_cap: self.size_cap,
            max_table_bytes: self.max_table_bytes,
            noise_floor: self.noise_floor,
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let overrides = Overrides::from_env()
        .context("reading environment overrides")?
        .merge(cli.overrides());
    let config = SweepConfig::from_raw(
        cli.mode, cli.first, cli.last, cli.trials, cli.dims, cli.param,
    )
    .and_then(|c| c.with_overrides(overrides))
    .map(|c| c.with_seed(cli.seed))
    .context("invalid configuration")?;
    let sweep = Sweep::new(config).context("invalid configuration")?;

    write_header(&mut io::stderr()).context("writing header")?;
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let stdout = io::stdout();
    let mut report = ReportWriter::new(stdout.lock());
    let summary = sweep.run(&mut rng, &mut report).context("sweep failed")?;
    info!(
        "{} rows written, {} passes aborted, {} strategy failures",
        summary.rows, summary.aborted, summary.strategy_failures
    );
    Ok(())
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = writeln!(io::stderr(), "{}\nusage: {}", err, USAGE);
            process::exit(-1);
        }
    };

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(&cli) {
        Ok(()) => process::exit(1),
        Err(err) => {
            let _ = writeln!(io::stderr(), "error: {:#}", err);
            process::exit(-1);
        }
    }
}
