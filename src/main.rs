//! CLI driver: five verbs (`R`/`P`/`S`/`T`/`X`), each mapping almost
//! one-for-one onto a `run_*` free function.

use clap::{Parser, Subcommand};
use rectilinear_bricks::bitstream::BitReader;
use rectilinear_bricks::builder;
use rectilinear_bricks::combination::{height_of_token, layer_sizes_from_token, size_of_token, Combination};
use rectilinear_bricks::error::{BitStreamError, CheckError, RefinementError};
use rectilinear_bricks::geometry::{MAX_HEIGHT, MAX_LAYER_SIZE};
use rectilinear_bricks::known_counts::{self, CheckOutcome};
use rectilinear_bricks::lemma3::{self, BaseReportEntry};
use rectilinear_bricks::report::Report;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rectilinear-bricks", about = "Enumerate and count rectilinear brick assemblies")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute one refinement's total/180/90-symmetric counts.
    R {
        refinement: u64,
        threads: Option<usize>,
    },
    /// Run Lemma-3 base precomputation up to `max_dist`.
    P {
        refinement: u64,
        max_dist: i32,
        threads: Option<usize>,
        #[arg(long, default_value = "")]
        suffix: String,
        #[arg(long)]
        overwrite: bool,
    },
    /// Sum two precomputed half-refinements sharing a base.
    S {
        left_token: u64,
        base: u8,
        right_token: u64,
        max_dist: i32,
    },
    /// Regression-compare two precomputation runs of the same refinement.
    T {
        base: u8,
        refinement: u64,
        min_dist: i32,
        max_dist: i32,
        folder_suffix: String,
    },
    /// Run the closed regression suite against the known-counts registry.
    X,
}

/// Errors surfaced at the CLI boundary, each mapped to a distinct process
/// exit code per the external-interface contract.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Refinement(#[from] RefinementError),
    #[error(transparent)]
    BitStream(#[from] BitStreamError),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error("cross-check mismatch for token {token}: computed {computed:?}, expected {expected:?}")]
    KnownCountsMismatch { token: u64, computed: rectilinear_bricks::Counts, expected: rectilinear_bricks::Counts },
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Refinement(_) => 2,
            CliError::KnownCountsMismatch { .. } => 3,
            CliError::BitStream(_) => 4,
            CliError::Check(CheckError::BaseMismatch) => 5,
            CliError::Check(CheckError::ReportSizeMismatch) => 6,
            CliError::Check(CheckError::CountsMismatch { .. }) => 3,
        }
    }
}

fn validate_refinement(token: u64) -> Result<(), RefinementError> {
    let height = height_of_token(token);
    if height == 0 {
        return Err(RefinementError::EmptyToken(token));
    }
    if height as usize > MAX_HEIGHT {
        return Err(RefinementError::HeightTooLarge(token, height, MAX_HEIGHT as u8));
    }
    for &size in layer_sizes_from_token(token).iter().take(height as usize) {
        if size as usize > MAX_LAYER_SIZE {
            return Err(RefinementError::LayerTooLarge(token, size, MAX_LAYER_SIZE as u8));
        }
    }
    Ok(())
}

fn run_refinement(refinement: u64, threads: usize) -> Result<(), CliError> {
    validate_refinement(refinement)?;
    let max_combination = Combination::from_token(refinement);
    tracing::info!(refinement, size = max_combination.size, "starting refinement count");
    let raw = builder::build_parallel(&max_combination, threads, false);
    let counts = builder::finalize_total(&raw, max_combination.layer_sizes[0]);

    match known_counts::check_counts(refinement, counts) {
        CheckOutcome::Match => tracing::info!(refinement, "matches known-counts registry"),
        CheckOutcome::Unseen => tracing::info!(refinement, "no registry entry, newly seen"),
        CheckOutcome::Mismatch { expected } => {
            tracing::error!(refinement, ?counts, ?expected, "cross-check mismatch");
            return Err(CliError::KnownCountsMismatch { token: refinement, computed: counts, expected });
        }
    }

    println!(
        "{refinement}: all={} symmetric180={} symmetric90={}",
        counts.all, counts.symmetric180, counts.symmetric90
    );
    Ok(())
}

fn run_precompute(refinement: u64, max_dist: i32, threads: usize, suffix: &str, overwrite: bool) -> Result<(), CliError> {
    validate_refinement(refinement)?;
    tracing::info!(refinement, max_dist, threads, "starting lemma-3 precomputation");
    lemma3::precompute(refinement, max_dist, threads, suffix, overwrite)?;
    Ok(())
}

fn report_dir(base: u8, token: u64, suffix: &str) -> String {
    format!("base_{}_size_{}_refinement_{}{}", base, size_of_token(token), token, suffix)
}

fn read_report_at(base: u8, token: u64, suffix: &str, d: i32) -> Result<(Vec<BaseReportEntry>, [u64; 5]), CliError> {
    let path = format!("{}/d{}.bin", report_dir(base, token, suffix), d);
    let file = std::fs::File::open(&path).map_err(BitStreamError::Io)?;
    let mut reader = BitReader::new(std::io::BufReader::new(file));
    let height = height_of_token(token);
    let n = size_of_token(token);
    Ok(lemma3::read_report_file(&mut reader, base as usize, n, height)?)
}

fn run_sum(left_token: u64, base: u8, right_token: u64, max_dist: i32) -> Result<(), CliError> {
    let mut total = rectilinear_bricks::Counts::ZERO;

    for d in 2..=max_dist {
        let (left_entries, _) = read_report_at(base, left_token, "", d)?;
        let (right_entries, _) = read_report_at(base, right_token, "", d)?;
        if left_entries.len() != right_entries.len() {
            return Err(CheckError::BaseMismatch.into());
        }
        for (l, r) in left_entries.iter().zip(right_entries.iter()) {
            if l.is_180 != r.is_180 || l.is_90 != r.is_90 {
                return Err(CheckError::BaseMismatch.into());
            }
            for (l_colors, l_counts) in &l.reports {
                let a = Report::new(l_colors.clone(), *l_counts);
                for (r_colors, r_counts) in &r.reports {
                    let b = Report::new(r_colors.clone(), *r_counts);
                    total += Report::count_up(&a, &b, l.is_180, l.is_90);
                }
            }
        }
    }

    println!(
        "sum({left_token}, {right_token}): all={} symmetric180={} symmetric90={}",
        total.all, total.symmetric180, total.symmetric90
    );
    Ok(())
}

fn run_compare(base: u8, refinement: u64, min_dist: i32, max_dist: i32, folder_suffix: &str) -> Result<(), CliError> {
    for d in min_dist..=max_dist {
        let (a_entries, a_totals) = read_report_at(base, refinement, "", d)?;
        let (b_entries, b_totals) = read_report_at(base, refinement, folder_suffix, d)?;

        if a_entries.len() != b_entries.len() {
            tracing::error!(d, a = a_entries.len(), b = b_entries.len(), "base count mismatch");
            return Err(CheckError::BaseMismatch.into());
        }
        if a_totals != b_totals {
            tracing::error!(d, ?a_totals, ?b_totals, "trailing cross-check totals mismatch");
            return Err(CheckError::ReportSizeMismatch.into());
        }
        tracing::info!(d, bases = a_entries.len(), "precomputation runs agree");
    }
    println!("{refinement}: precomputations from d={min_dist} to d={max_dist} agree");
    Ok(())
}

fn run_regression_suite(threads: usize) -> Result<(), CliError> {
    let mut failures = 0u32;
    for token in known_counts::known_tokens() {
        validate_refinement(token)?;
        let max_combination = Combination::from_token(token);
        tracing::info!(token, "regression: computing refinement");
        let raw = builder::build_parallel(&max_combination, threads, false);
        let counts = builder::finalize_total(&raw, max_combination.layer_sizes[0]);
        match known_counts::check_counts(token, counts) {
            CheckOutcome::Match => tracing::info!(token, "OK"),
            CheckOutcome::Unseen => tracing::warn!(token, "registry entry vanished mid-run"),
            CheckOutcome::Mismatch { expected } => {
                tracing::error!(token, ?counts, ?expected, "regression FAILED");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(CliError::KnownCountsMismatch {
            token: 0,
            computed: rectilinear_bricks::Counts::ZERO,
            expected: rectilinear_bricks::Counts::ZERO,
        });
    }
    println!("regression suite: all known refinements match");
    Ok(())
}

fn default_threads() -> usize {
    rectilinear_bricks::config::settings().default_threads
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::R { refinement, threads } => run_refinement(refinement, threads.unwrap_or_else(default_threads)),
        Command::P { refinement, max_dist, threads, suffix, overwrite } => {
            run_precompute(refinement, max_dist, threads.unwrap_or_else(default_threads), &suffix, overwrite)
        }
        Command::S { left_token, base, right_token, max_dist } => run_sum(left_token, base, right_token, max_dist),
        Command::T { base, refinement, min_dist, max_dist, folder_suffix } => {
            run_compare(base, refinement, min_dist, max_dist, &folder_suffix)
        }
        Command::X => run_regression_suite(default_threads()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "command failed");
            ExitCode::from(err.exit_code())
        }
    }
}
