//! spindrift - approximate the ground state of a Heisenberg spin system
//! by repeated application of the diffusion operator (Λ - H).
//!
//! The final state is written to the output stream in the same text format
//! the input uses; progress and energy estimates go to standard error.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spindrift_sim::{diffusion_loop, energy, read_hamiltonian, read_state, write_state};
use spindrift_state::{StateConfig, TruncationPolicy};

/// Evaluate (Λ - H)ⁿ|ψ₀〉 for a Heisenberg Hamiltonian H
#[derive(Parser)]
#[command(name = "spindrift", version, about)]
struct Cli {
    /// File containing the initial quantum state ('-' reads standard input)
    input: String,

    /// File where the final quantum state is saved (default: standard output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File containing the Hamiltonian specification
    #[arg(short = 'H', long)]
    hamiltonian: PathBuf,

    /// Value of Λ in the diffusion operator (Λ - H)
    #[arg(short = 'L', long, default_value_t = 1.0)]
    lambda: f64,

    /// Number of applications of (Λ - H) to perform
    #[arg(short = 'n', long, default_value_t = 1)]
    iterations: usize,

    /// Maximum number of basis entries kept after each application
    #[arg(long = "max", default_value_t = 1000)]
    soft_max: usize,

    /// Size at which an immediate truncation is forced (default: twice --max)
    #[arg(long = "hard-max")]
    hard_max: Option<usize>,

    /// Truncate by weighted resampling instead of dropping the smallest entries
    #[arg(long)]
    random: bool,

    /// Number of amplitude-table shards (a power of two, at most 256)
    #[arg(long, default_value_t = 1)]
    shards: usize,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    if cli.iterations == 0 {
        bail!("number of iterations must be positive");
    }
    if let Some(output) = &cli.output {
        if cli.input != "-" && resolves_to_same_file(output, Path::new(&cli.input)) {
            bail!(
                "input file '{}' and output file '{}' are the same",
                cli.input,
                output.display()
            );
        }
    }

    let config = StateConfig::new(cli.soft_max)
        .with_hard_cap(cli.hard_max.unwrap_or(2 * cli.soft_max))
        .with_shards(cli.shards)
        .with_policy(if cli.random {
            TruncationPolicy::Stochastic
        } else {
            TruncationPolicy::Deterministic
        });
    config.validate().context("invalid configuration")?;

    let state = if cli.input == "-" {
        read_state(io::stdin().lock(), config)
            .context("failed to read the initial state from standard input")?
    } else {
        let file = File::open(&cli.input)
            .with_context(|| format!("failed to open '{}'", cli.input))?;
        read_state(BufReader::new(file), config)
            .with_context(|| format!("failed to read the initial state from '{}'", cli.input))?
    };

    let hamiltonian = {
        let path = &cli.hamiltonian;
        let file = File::open(path)
            .with_context(|| format!("failed to open '{}'", path.display()))?;
        read_hamiltonian(BufReader::new(file))
            .with_context(|| format!("failed to read the Hamiltonian from '{}'", path.display()))?
    };

    let initial_energy = energy(&hamiltonian, &state)?;
    tracing::info!(
        re = initial_energy.re,
        im = initial_energy.im,
        entries = state.len(),
        "initial energy 〈ψ₀|H|ψ₀〉"
    );

    let state = diffusion_loop(cli.lambda, &hamiltonian, state, cli.iterations)?;

    let final_energy = energy(&hamiltonian, &state)?;
    tracing::info!(
        re = final_energy.re,
        im = final_energy.im,
        entries = state.len(),
        "final energy 〈ψ|H|ψ〉"
    );

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create '{}'", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_state(&mut writer, &state)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            write_state(&mut writer, &state)?;
            writer.flush()?;
        }
    }
    Ok(())
}

/// True when both paths exist and name the same underlying file.
fn resolves_to_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
