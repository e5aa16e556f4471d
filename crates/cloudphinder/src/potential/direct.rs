//! Direct pairwise potential (O(N·M) implementation)

use nalgebra::Point3;

use crate::particles::ParticleSet;
use crate::potential::{PotentialSource, kernel_potential};

/// Direct summation over a list of member particles
///
/// Always exact. Used for groups that have no tree yet and for the members a
/// group gained since its tree was last rebuilt.
#[derive(Clone, Copy)]
pub struct DirectSum<'a> {
    particles: &'a ParticleSet,
    members: &'a [usize],
}

impl<'a> DirectSum<'a> {
    pub fn new(particles: &'a ParticleSet, members: &'a [usize]) -> Self {
        Self { particles, members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl PotentialSource for DirectSum<'_> {
    fn potential_at(&self, target: Point3<f64>) -> f64 {
        self.members
            .iter()
            .map(|&j| {
                let r = (self.particles.positions[j] - target).magnitude();
                self.particles.masses[j] * kernel_potential(r, self.particles.smoothing_lengths[j])
            })
            .sum()
    }
}
