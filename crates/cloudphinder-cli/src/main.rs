//! `cloudphinder`: find gravitationally bound clouds in particle snapshots.
//!
//! ```text
//! cloudphinder snapshot_600.json snapshot_601.json --nmin 10 --np 4
//! ```

mod input;
mod output;

#[cfg(test)]
mod cli_test;

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use log::info;

use cloudphinder::particles::RankMode;
use cloudphinder::{CloudConfig, CloudFinder, ParticleSource};

use crate::input::JsonSnapshot;
use crate::output::FileSink;

#[derive(Parser)]
#[command(name = "cloudphinder")]
#[command(about = "Finds gravitationally bound clouds in particle snapshots", long_about = None)]
struct Cli {
    /// Snapshot files (JSON arrays of particle records)
    #[arg(required = true)]
    snapshots: Vec<PathBuf>,

    /// Folder to save the outputs to (defaults to each snapshot's folder)
    #[arg(long, alias = "outputfolder", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// JSON configuration file; command-line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gravitational constant, consistent with the simulation's units
    #[arg(long = "G", value_name = "G")]
    gravitational_constant: Option<f64>,

    /// Length of each particle's neighbour list
    #[arg(long = "cluster-ngb", alias = "cluster_ngb", value_name = "N")]
    neighbor_count: Option<usize>,

    /// Minimum H number density to cut at, in cm^-3
    #[arg(long, value_name = "n")]
    nmin: Option<f64>,

    /// Smoothing length for particles without one
    #[arg(long, value_name = "L")]
    softening: Option<f64>,

    /// Randomly scale each coordinate by a factor in [1 - fuzz, 1 + fuzz]
    #[arg(long, value_name = "f")]
    fuzz: Option<f64>,

    /// Critical virial parameter to be considered bound
    #[arg(long = "alpha-crit", alias = "alpha_crit", value_name = "f")]
    alpha_crit: Option<f64>,

    /// Number of snapshots to run in parallel
    #[arg(long = "np", value_name = "N")]
    threads: Option<usize>,

    /// Group size above which potential energy comes from the tree
    #[arg(long, value_name = "N")]
    ntree: Option<usize>,

    /// Maximum radius for the neighbour search
    #[arg(long = "max-linking-length", alias = "max_linking_length", value_name = "L")]
    max_linking_length: Option<f64>,

    /// Order particles by gravitational potential instead of density
    #[arg(long = "potential-mode", action = ArgAction::SetTrue)]
    potential_mode: bool,

    /// Overwrite existing cloud files
    #[arg(long, action = ArgAction::SetTrue)]
    overwrite: bool,

    /// Log at debug level
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut CloudConfig) {
        if let Some(g) = self.gravitational_constant {
            config.gravitational_constant = g;
        }
        if let Some(k) = self.neighbor_count {
            config.neighbor_count = k;
        }
        if let Some(nmin) = self.nmin {
            config.min_number_density = nmin;
        }
        if let Some(softening) = self.softening {
            config.softening = softening;
        }
        if let Some(fuzz) = self.fuzz {
            config.fuzz = fuzz;
        }
        if let Some(alpha) = self.alpha_crit {
            config.alpha_crit = alpha;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(ntree) = self.ntree {
            config.ntree = ntree;
        }
        if let Some(radius) = self.max_linking_length {
            config.max_linking_length = radius;
        }
        if self.potential_mode {
            config.rank_mode = RankMode::Potential;
        }
    }
}

fn init_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => CloudConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => CloudConfig::default(),
    };
    cli.apply_overrides(&mut config);

    let finder = CloudFinder::new(config)?;
    let config = finder.config();
    let mut sink = FileSink::new(cli.output_dir.clone(), config.min_number_density, config.alpha_crit);

    let mut sources: Vec<JsonSnapshot> = Vec::with_capacity(cli.snapshots.len());
    for path in &cli.snapshots {
        if sources.iter().any(|s| s.path() == path.as_path()) {
            continue;
        }
        let source = JsonSnapshot::new(path, config.softening);
        let paths = sink.register_source(&source.label(), source.path())?;
        if !cli.overwrite && paths.exist() {
            info!("{}: outputs exist, skipping (use --overwrite to redo)", path.display());
            continue;
        }
        sources.push(source);
    }

    if sources.is_empty() {
        info!("nothing to do");
        return Ok(());
    }

    let outcome = finder.run_batch(&sources, &mut sink)?;
    info!(
        "processed {} snapshots, {} skipped",
        outcome.completed,
        outcome.skipped.len()
    );
    if outcome.completed == 0 {
        anyhow::bail!("no snapshot could be processed");
    }
    Ok(())
}
