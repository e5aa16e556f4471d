//! Finds self-gravitating, energetically bound clouds in particle snapshots.
//!
//! Particles are visited from densest to sparsest and grown into groups by
//! nearest-neighbour linking. Each group keeps an exact running tally of its
//! kinetic, thermal and gravitational energy, so boundedness can be tested
//! after every change without recomputing the whole group. For each particle
//! the largest bound group it ever belonged to is its cloud.
//!
//! ```no_run
//! use cloudphinder::config::CloudConfig;
//! use cloudphinder::finder::CloudFinder;
//! use cloudphinder::particles::ParticleSet;
//!
//! # fn load() -> ParticleSet { ParticleSet::new() }
//! let finder = CloudFinder::new(CloudConfig::default())?;
//! let report = finder.find(&load())?;
//! for cloud in &report.clouds {
//!     println!("{} particles, alpha = {:.2}", cloud.num_particles, cloud.virial_parameter);
//! }
//! # Ok::<(), cloudphinder::error::CloudError>(())
//! ```

pub mod assembler;
pub mod config;
pub mod error;
pub mod extractor;
pub mod finder;
pub mod group;
pub mod ledger;
pub mod neighbors;
pub mod octree;
pub mod particles;
pub mod potential;
pub mod sink;
pub mod summary;

pub use config::CloudConfig;
pub use error::{CloudError, Result};
pub use finder::{CloudFinder, ParticleSource};
pub use particles::{Particle, ParticleSet};

#[cfg(test)]
mod extractor_test;
#[cfg(test)]
mod ledger_test;
