//! Gravitational potential evaluation.
//!
//! This module provides the `PotentialSource` trait and its implementations:
//! exact pairwise summation over a member list and a Barnes-Hut octree built
//! over a snapshot of members. A group's field combines both, the tree for
//! the members it was built over and direct summation for everything added
//! since.
//!
//! All sources return potentials with G = 1; callers scale by the configured
//! gravitational constant.

use nalgebra::Point3;
use rayon::prelude::*;

use crate::particles::ParticleSet;

pub mod direct;
pub mod tree;

#[cfg(test)]
mod potential_test;

pub use direct::DirectSum;
pub use tree::TreePotential;

/// Target count above which evaluations fan out over the rayon pool
const PARALLEL_TARGETS: usize = 256;

/// Softened potential of a unit point mass at separation `r`, with G = 1.
///
/// Within the softening length `h` the cubic-spline kernel is used (finite,
/// tending to `-2.8 / h` at the center); beyond it the potential is Newtonian
/// `-1 / r`. Zero separation returns zero: positions are unique, so that only
/// happens when a point meets itself.
///
/// # Examples
///
/// ```
/// use cloudphinder::potential::kernel_potential;
///
/// assert_eq!(kernel_potential(2.0, 1.0), -0.5);
/// assert!((kernel_potential(1e-9, 1.0) + 2.8).abs() < 1e-9);
/// assert_eq!(kernel_potential(0.0, 1.0), 0.0);
/// ```
pub fn kernel_potential(r: f64, h: f64) -> f64 {
    if r == 0.0 {
        return 0.0;
    }
    if r >= h {
        return -1.0 / r;
    }
    let hinv = 1.0 / h;
    let q = r * hinv;
    if q <= 0.5 {
        (-2.8 + q * q * (16.0 / 3.0 + q * q * (6.4 * q - 9.6))) * hinv
    } else {
        (-3.2 + 1.0 / (15.0 * q) + q * q * (32.0 / 3.0 + q * (-16.0 + q * (9.6 - 32.0 / 15.0 * q))))
            * hinv
    }
}

/// A source of gravitational potential.
///
/// Implementations are read-only during evaluation so that many targets can
/// be evaluated concurrently.
pub trait PotentialSource: Sync {
    /// Potential at `target`, with G = 1
    fn potential_at(&self, target: Point3<f64>) -> f64;

    /// Potentials at many targets, in order.
    fn potentials(&self, targets: &[Point3<f64>]) -> Vec<f64> {
        if targets.len() > PARALLEL_TARGETS {
            targets.par_iter().map(|&t| self.potential_at(t)).collect()
        } else {
            targets.iter().map(|&t| self.potential_at(t)).collect()
        }
    }

    /// `sum(m_i * phi(x_i))` over the given particles, with G = 1.
    ///
    /// This is the interaction energy between the source and the targets when
    /// none of the targets are part of the source.
    fn interaction_energy(&self, particles: &ParticleSet, targets: &[usize]) -> f64 {
        let positions: Vec<Point3<f64>> = targets.iter().map(|&i| particles.positions[i]).collect();
        self.potentials(&positions)
            .iter()
            .zip(targets)
            .map(|(phi, &i)| particles.masses[i] * phi)
            .sum()
    }
}

/// The combined field of a tree snapshot plus members not yet folded into it.
pub struct GroupField<'a> {
    pub tree: Option<&'a TreePotential>,
    pub pending: DirectSum<'a>,
}

impl PotentialSource for GroupField<'_> {
    fn potential_at(&self, target: Point3<f64>) -> f64 {
        let from_tree = self.tree.map_or(0.0, |t| t.potential_at(target));
        from_tree + self.pending.potential_at(target)
    }
}

/// Self-gravitational energy `0.5 * sum(m_i * phi_i)` of a member set, with G = 1.
///
/// Uses a tree with opening angle `theta` once the set is larger than
/// `tree_threshold`, direct summation otherwise.
pub fn self_energy(particles: &ParticleSet, members: &[usize], theta: f64, tree_threshold: usize) -> f64 {
    if members.len() > tree_threshold {
        let tree = TreePotential::build(particles, members, theta);
        0.5 * tree.interaction_energy(particles, members)
    } else {
        0.5 * DirectSum::new(particles, members).interaction_energy(particles, members)
    }
}
