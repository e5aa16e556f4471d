//! The end-to-end pipeline for one dataset, and a batch driver for many.
//!
//! ```text
//! validate -> density cut -> rank order -> perturb -> neighbour index
//!          -> assemble -> extract bound groups -> summarise -> sink
//! ```
//!
//! Datasets are independent, so a batch runs them in parallel on the rayon
//! pool. A dataset that fails (too few particles, degenerate positions,
//! unreadable input) is logged and skipped; the others still reach the sink.

use std::time::Instant;

use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::assembler::GroupAssembler;
use crate::config::CloudConfig;
use crate::error::{CloudError, Result};
use crate::extractor;
use crate::neighbors::NeighborIndex;
use crate::particles::ParticleSet;
use crate::sink::{CloudReport, ResultSink};
use crate::summary;

/// A dataset that can be loaded on demand.
pub trait ParticleSource: Send + Sync {
    /// Name used in logs and reports
    fn label(&self) -> String;

    fn load(&self) -> Result<ParticleSet>;
}

/// A dataset already held in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    pub label: String,
    pub particles: ParticleSet,
}

impl InMemorySource {
    pub fn new(label: impl Into<String>, particles: ParticleSet) -> Self {
        Self {
            label: label.into(),
            particles,
        }
    }
}

impl ParticleSource for InMemorySource {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn load(&self) -> Result<ParticleSet> {
        Ok(self.particles.clone())
    }
}

/// What happened to a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Reports handed to the sink
    pub completed: usize,
    /// Labels of the datasets that failed
    pub skipped: Vec<String>,
}

/// Runs the full cloud-finding pipeline with a fixed configuration.
#[derive(Debug, Clone)]
pub struct CloudFinder {
    config: CloudConfig,
}

impl CloudFinder {
    /// Creates a finder, rejecting unusable configurations.
    pub fn new(config: CloudConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Finds bound clouds in one dataset.
    pub fn find(&self, particles: &ParticleSet) -> Result<CloudReport> {
        self.find_labeled("particles", particles)
    }

    /// Selects, orders and cleans the particles the scan will run over.
    ///
    /// The returned set holds the dense particles in processing order;
    /// its `origin` gives each one's index in `particles`.
    pub fn prepare(&self, particles: &ParticleSet) -> Result<ParticleSet> {
        let config = &self.config;
        particles.validate()?;

        let k = config.neighbor_count;
        if particles.len() < k {
            return Err(CloudError::InsufficientData {
                stage: "total",
                available: particles.len(),
                required: k,
            });
        }

        let mut dense = particles.dense_indices(config.number_density_factor, config.min_number_density);
        if dense.len() <= k {
            return Err(CloudError::InsufficientData {
                stage: "dense",
                available: dense.len(),
                required: k + 1,
            });
        }

        let rank = particles.rank_values(config.rank_mode);
        dense.sort_by(|&a, &b| rank[b].total_cmp(&rank[a]));

        let mut working = particles.subset(&dense);
        working.origin = dense;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        if config.fuzz > 0.0 {
            working.perturb(&mut rng, config.fuzz);
        }
        let moved = working.separate_duplicates(&mut rng);
        if moved > 0 {
            debug!("separated {} particles sharing a position", moved);
        }
        Ok(working)
    }

    /// Finds bound clouds in one dataset, tagging the report with `label`.
    pub fn find_labeled(&self, label: &str, particles: &ParticleSet) -> Result<CloudReport> {
        let config = &self.config;
        let start = Instant::now();

        let working = self.prepare(particles)?;
        info!(
            "{}: {} of {} particles above the density cut",
            label,
            working.len(),
            particles.len()
        );

        // No particle links beyond the widest smoothing kernel
        let radius = config.max_linking_length.min(working.max_smoothing_length());
        debug!("{}: neighbour search radius {:.3e}", label, radius);
        let table = NeighborIndex::build(&working.positions).query_all(config.neighbor_count, radius)?;
        let rank = working.rank_values(config.rank_mode);
        let assembly = GroupAssembler::new(&working, &table, rank, config.assembly_params())?.run();

        let bound = assembly.bound_groups();
        let mut clouds = summary::catalog(&working, &bound, config);
        for cloud in &mut clouds {
            cloud.id = working.origin[cloud.id];
        }
        let groups = extractor::remap(&bound, &working.origin);

        info!(
            "{}: {} bound groups, {} clouds with at least {} members ({:.3?})",
            label,
            groups.len(),
            clouds.len(),
            config.min_cloud_members,
            start.elapsed()
        );

        Ok(CloudReport {
            label: label.to_string(),
            groups,
            clouds,
            ids: particles.ids.clone(),
            dense_count: working.len(),
            stats: assembly.stats,
        })
    }

    /// Processes every source in parallel and hands the successful reports
    /// to `sink` in input order.
    ///
    /// Per-dataset failures are logged and skipped. Sink errors abort the
    /// batch.
    pub fn run_batch<S, K>(&self, sources: &[S], sink: &mut K) -> Result<BatchOutcome>
    where
        S: ParticleSource,
        K: ResultSink,
    {
        let run = || -> Vec<(String, Result<CloudReport>)> {
            sources
                .par_iter()
                .map(|source| {
                    let label = source.label();
                    let report = source.load().and_then(|p| self.find_labeled(&label, &p));
                    (label, report)
                })
                .collect()
        };

        let results = if self.config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| CloudError::config(format!("failed to build thread pool: {e}")))?;
            pool.install(run)
        } else {
            run()
        };

        let mut outcome = BatchOutcome::default();
        for (label, result) in results {
            match result {
                Ok(report) => {
                    sink.accept(report)?;
                    outcome.completed += 1;
                }
                Err(e) => {
                    warn!("skipping {}: {}", label, e);
                    outcome.skipped.push(label);
                }
            }
        }
        Ok(outcome)
    }
}
