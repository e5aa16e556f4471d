//! Run configuration.
//!
//! `CloudConfig` is a thin, `serde`-deserializable set of knobs. Every field
//! has a default matching the conventional values for galaxy-scale GIZMO
//! snapshots, so a JSON file only needs to name what it overrides:
//!
//! ```json
//! {
//!   "neighbor_count": 16,
//!   "alpha_crit": 1.0,
//!   "rank_mode": "potential"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assembler::AssemblyParams;
use crate::error::{CloudError, Result};
use crate::particles::RankMode;

/// Configuration for one cloud-finding run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Gravitational constant in code units
    pub gravitational_constant: f64,
    /// Length of each particle's neighbour list, the particle itself included
    pub neighbor_count: usize,
    /// Number density below which particles are discarded
    pub min_number_density: f64,
    /// Factor converting code density to number density
    pub number_density_factor: f64,
    /// Smoothing length for particles that do not carry one
    pub softening: f64,
    /// Relative amplitude of the optional random position perturbation
    pub fuzz: f64,
    /// Critical virial parameter below which a group counts as bound
    pub alpha_crit: f64,
    /// Pending-list length that triggers a tree rebuild
    pub ntree: usize,
    /// Absorbed-group size above which a merge rebuilds the tree immediately
    pub small_group_threshold: usize,
    /// Barnes-Hut opening angle
    pub opening_angle: f64,
    /// Maximum neighbour search radius
    pub max_linking_length: f64,
    /// Field that defines processing order
    pub rank_mode: RankMode,
    /// Smallest bound group that gets a summary row
    pub min_cloud_members: usize,
    /// Seed for the perturbation RNG
    pub seed: u64,
    /// Worker threads for batch runs (0 = rayon default)
    pub threads: usize,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: 4.301e4,
            neighbor_count: 32,
            min_number_density: 1.0,
            number_density_factor: 404.0,
            softening: 1e-5,
            fuzz: 0.0,
            alpha_crit: 2.0,
            ntree: 10_000,
            small_group_threshold: 512,
            opening_angle: 0.7,
            max_linking_length: 1e100,
            rank_mode: RankMode::Density,
            min_cloud_members: 4,
            seed: 42,
            threads: 0,
        }
    }
}

impl CloudConfig {
    /// Parses a configuration from JSON, filling unspecified fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CloudConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks that all parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.neighbor_count < 2 {
            return Err(CloudError::config(format!(
                "neighbor_count must be at least 2, got {}",
                self.neighbor_count
            )));
        }
        if !(self.gravitational_constant > 0.0) {
            return Err(CloudError::config("gravitational_constant must be positive"));
        }
        if !(self.alpha_crit > 0.0) {
            return Err(CloudError::config("alpha_crit must be positive"));
        }
        if self.ntree == 0 {
            return Err(CloudError::config("ntree must be at least 1"));
        }
        if !(self.opening_angle >= 0.0) {
            return Err(CloudError::config("opening_angle must be non-negative"));
        }
        if !(self.max_linking_length > 0.0) {
            return Err(CloudError::config("max_linking_length must be positive"));
        }
        if !(self.fuzz >= 0.0) {
            return Err(CloudError::config("fuzz must be non-negative"));
        }
        if !(self.softening > 0.0) {
            return Err(CloudError::config("softening must be positive"));
        }
        Ok(())
    }

    /// The subset of parameters the group assembler needs.
    pub fn assembly_params(&self) -> AssemblyParams {
        AssemblyParams {
            gravitational_constant: self.gravitational_constant,
            alpha_crit: self.alpha_crit,
            ntree: self.ntree,
            small_group_threshold: self.small_group_threshold,
            opening_angle: self.opening_angle,
        }
    }
}
