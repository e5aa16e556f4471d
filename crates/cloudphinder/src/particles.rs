//! Particle records and the structure-of-arrays set the finder works on.
//!
//! Besides storage, the set knows how to cut itself by density, rank its
//! particles for processing, and nudge apart particles that share a position.
//!
//! ```
//! use cloudphinder::particles::{Particle, ParticleSet};
//!
//! let set = ParticleSet::from_particles(
//!     &[
//!         Particle::new(1, [0.0, 0.0, 0.0], 1.0, 50.0),
//!         Particle::new(2, [1.0, 0.0, 0.0], 1.0, 0.5).with_smoothing_length(0.4),
//!     ],
//!     0.1,
//! );
//! assert_eq!(set.dense_indices(1.0, 1.0), vec![0]);
//! assert_eq!(set.max_smoothing_length(), 0.4);
//! ```

use nalgebra::{Point3, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CloudError, Result};

/// Relative displacement applied to particles that share a position
const DUPLICATE_OFFSET: f64 = 1e-8;

/// Rounds of duplicate separation before giving up
const MAX_SEPARATION_ROUNDS: usize = 16;

/// Which per-particle field defines the processing order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMode {
    /// Densest particles first
    #[default]
    Density,
    /// Deepest gravitational potential first
    Potential,
}

/// A single particle record, as supplied by a data source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: u64,
    pub position: Point3<f64>,
    pub velocity: Vector3<f64>,
    pub mass: f64,
    /// Smoothing (softening) length; non-positive means "use the configured softening"
    #[serde(default)]
    pub smoothing_length: f64,
    /// Specific internal energy, magnetic contribution included
    #[serde(default)]
    pub internal_energy: f64,
    #[serde(default)]
    pub density: f64,
    #[serde(default)]
    pub potential: f64,
}

impl Particle {
    /// Creates a particle at rest with zero internal energy
    pub fn new(id: u64, position: [f64; 3], mass: f64, density: f64) -> Self {
        Particle {
            id,
            position: Point3::new(position[0], position[1], position[2]),
            velocity: Vector3::zeros(),
            mass,
            smoothing_length: 0.0,
            internal_energy: 0.0,
            density,
            potential: 0.0,
        }
    }

    pub fn with_velocity(mut self, velocity: [f64; 3]) -> Self {
        self.velocity = Vector3::new(velocity[0], velocity[1], velocity[2]);
        self
    }

    pub fn with_smoothing_length(mut self, h: f64) -> Self {
        self.smoothing_length = h;
        self
    }

    pub fn with_internal_energy(mut self, u: f64) -> Self {
        self.internal_energy = u;
        self
    }

    pub fn with_potential(mut self, potential: f64) -> Self {
        self.potential = potential;
        self
    }
}

/// Particle data held as parallel arrays.
///
/// Particles are identified by their index into these arrays and are never
/// copied out of their slot while a run is in progress. `origin` maps each
/// slot back to the index it had in the set this one was derived from.
#[derive(Debug, Clone, Default)]
pub struct ParticleSet {
    pub ids: Vec<u64>,
    pub positions: Vec<Point3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub masses: Vec<f64>,
    pub smoothing_lengths: Vec<f64>,
    pub internal_energies: Vec<f64>,
    pub densities: Vec<f64>,
    pub potentials: Vec<f64>,
    pub origin: Vec<usize>,
}

impl ParticleSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from particle records, substituting `softening` for
    /// missing smoothing lengths.
    ///
    /// # Examples
    ///
    /// ```
    /// use cloudphinder::particles::{Particle, ParticleSet};
    ///
    /// let set = ParticleSet::from_particles(
    ///     &[
    ///         Particle::new(7, [0.0, 0.0, 0.0], 1.0, 10.0),
    ///         Particle::new(8, [1.0, 0.0, 0.0], 1.0, 5.0).with_smoothing_length(0.5),
    ///     ],
    ///     1e-3,
    /// );
    ///
    /// assert_eq!(set.len(), 2);
    /// assert_eq!(set.smoothing_lengths, vec![1e-3, 0.5]);
    /// ```
    pub fn from_particles(particles: &[Particle], softening: f64) -> Self {
        let mut set = Self::new();
        for p in particles {
            set.push(*p, softening);
        }
        set
    }

    /// Appends a particle and returns its index
    pub fn push(&mut self, particle: Particle, softening: f64) -> usize {
        let index = self.len();
        let h = if particle.smoothing_length > 0.0 {
            particle.smoothing_length
        } else {
            softening
        };
        self.ids.push(particle.id);
        self.positions.push(particle.position);
        self.velocities.push(particle.velocity);
        self.masses.push(particle.mass);
        self.smoothing_lengths.push(h);
        self.internal_energies.push(particle.internal_energy);
        self.densities.push(particle.density);
        self.potentials.push(particle.potential);
        self.origin.push(index);
        index
    }

    /// Returns the number of particles
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Reassembles the record stored at `index`
    pub fn particle(&self, index: usize) -> Particle {
        Particle {
            id: self.ids[index],
            position: self.positions[index],
            velocity: self.velocities[index],
            mass: self.masses[index],
            smoothing_length: self.smoothing_lengths[index],
            internal_energy: self.internal_energies[index],
            density: self.densities[index],
            potential: self.potentials[index],
        }
    }

    /// Total mass of the given members
    pub fn mass_of(&self, members: &[usize]) -> f64 {
        members.iter().map(|&i| self.masses[i]).sum()
    }

    /// Largest smoothing length in the set, 0 when empty
    pub fn max_smoothing_length(&self) -> f64 {
        self.smoothing_lengths.iter().copied().fold(0.0, f64::max)
    }

    /// Returns the total mass of all particles
    pub fn total_mass(&self) -> f64 {
        self.masses.iter().sum()
    }

    /// Checks that every array has the same length and the values are usable.
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        let lengths = [
            ("ids", self.ids.len()),
            ("velocities", self.velocities.len()),
            ("masses", self.masses.len()),
            ("smoothing_lengths", self.smoothing_lengths.len()),
            ("internal_energies", self.internal_energies.len()),
            ("densities", self.densities.len()),
            ("potentials", self.potentials.len()),
            ("origin", self.origin.len()),
        ];
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n) {
            return Err(CloudError::invalid(format!(
                "{name} has {len} entries but there are {n} positions"
            )));
        }
        if let Some(i) = self.masses.iter().position(|&m| !(m > 0.0) || !m.is_finite()) {
            return Err(CloudError::invalid(format!(
                "particle {i} has non-positive mass {}",
                self.masses[i]
            )));
        }
        if let Some(i) = self
            .positions
            .iter()
            .position(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(CloudError::invalid(format!(
                "particle {i} has a non-finite position"
            )));
        }
        Ok(())
    }

    /// Per-particle ranking value; higher values are processed first.
    pub fn rank_values(&self, mode: RankMode) -> Vec<f64> {
        match mode {
            RankMode::Density => self.densities.clone(),
            RankMode::Potential => self.potentials.iter().map(|phi| -phi).collect(),
        }
    }

    /// Indices of particles whose number density exceeds `min_number_density`.
    pub fn dense_indices(&self, number_density_factor: f64, min_number_density: f64) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.densities[i] * number_density_factor > min_number_density)
            .collect()
    }

    /// Copies the selected particles into a new set, in the given order.
    ///
    /// `origin` of the new set points back into `self`'s index space
    /// (composed with `self.origin`, so chains of subsets keep pointing at the
    /// very first set).
    pub fn subset(&self, indices: &[usize]) -> ParticleSet {
        ParticleSet {
            ids: indices.iter().map(|&i| self.ids[i]).collect(),
            positions: indices.iter().map(|&i| self.positions[i]).collect(),
            velocities: indices.iter().map(|&i| self.velocities[i]).collect(),
            masses: indices.iter().map(|&i| self.masses[i]).collect(),
            smoothing_lengths: indices.iter().map(|&i| self.smoothing_lengths[i]).collect(),
            internal_energies: indices.iter().map(|&i| self.internal_energies[i]).collect(),
            densities: indices.iter().map(|&i| self.densities[i]).collect(),
            potentials: indices.iter().map(|&i| self.potentials[i]).collect(),
            origin: indices.iter().map(|&i| self.origin[i]).collect(),
        }
    }

    /// Multiplies every coordinate by `1 + fuzz * U(-1, 1)`.
    pub fn perturb<R: Rng>(&mut self, rng: &mut R, fuzz: f64) {
        for p in &mut self.positions {
            for c in p.coords.iter_mut() {
                *c *= 1.0 + fuzz * rng.random_range(-1.0..1.0);
            }
        }
    }

    /// Pairs of particles that share exactly the same position.
    ///
    /// Each pair is reported as (earlier index, later index); a position shared
    /// by three particles yields two pairs.
    pub fn duplicate_pairs(&self) -> Vec<(usize, usize)> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            let (pa, pb) = (&self.positions[a], &self.positions[b]);
            pa.x.total_cmp(&pb.x)
                .then(pa.y.total_cmp(&pb.y))
                .then(pa.z.total_cmp(&pb.z))
                .then(a.cmp(&b))
        });
        order
            .windows(2)
            .filter(|w| self.positions[w[0]] == self.positions[w[1]])
            .map(|w| (w[0].min(w[1]), w[0].max(w[1])))
            .collect()
    }

    /// Nudges particles off shared positions by a negligible random offset.
    ///
    /// The later particle of each colliding pair is displaced by
    /// `1e-8 * (|x| + h)` per coordinate, so particles sitting at the origin
    /// move too. Returns the number of displacements applied. Collisions that
    /// survive all rounds are left for the neighbour index to reject.
    pub fn separate_duplicates<R: Rng>(&mut self, rng: &mut R) -> usize {
        let mut moved = 0;
        for _ in 0..MAX_SEPARATION_ROUNDS {
            let pairs = self.duplicate_pairs();
            if pairs.is_empty() {
                break;
            }
            for (_, later) in pairs {
                let h = self.smoothing_lengths[later];
                for c in self.positions[later].coords.iter_mut() {
                    let scale = c.abs() + h;
                    *c += DUPLICATE_OFFSET * scale * rng.random_range(-1.0..1.0);
                }
                moved += 1;
            }
        }
        moved
    }
}
