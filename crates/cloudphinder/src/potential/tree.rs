//! Tree-based potential using the Barnes-Hut octree (O(N log N))

use nalgebra::Point3;

use crate::octree::{Octree, SourcePoint};
use crate::particles::ParticleSet;
use crate::potential::PotentialSource;

/// Barnes-Hut approximation over a snapshot of members
///
/// The snapshot is taken at build time; members added to the group later are
/// not seen by the tree and have to be summed directly.
///
/// # Opening Angle (θ)
///
/// - θ = 0.0: exact (every leaf visited)
/// - θ = 0.7: the conventional choice for binding-energy estimates
/// - θ > 1.0: fast but coarse
#[derive(Clone, Debug)]
pub struct TreePotential {
    tree: Octree,
    theta: f64,
}

impl TreePotential {
    /// Builds a tree over the given members of `particles`.
    pub fn build(particles: &ParticleSet, members: &[usize], theta: f64) -> Self {
        let points = members
            .iter()
            .map(|&i| {
                SourcePoint::new(
                    particles.positions[i],
                    particles.masses[i],
                    particles.smoothing_lengths[i],
                )
            })
            .collect();
        Self {
            tree: Octree::build(points),
            theta,
        }
    }

    /// Number of members in the snapshot
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }
}

impl PotentialSource for TreePotential {
    fn potential_at(&self, target: Point3<f64>) -> f64 {
        self.tree.potential(target, self.theta)
    }
}
