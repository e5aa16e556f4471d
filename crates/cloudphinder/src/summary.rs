//! Shape and energy summaries of bound clouds.

use std::collections::BTreeMap;

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::CloudConfig;
use crate::particles::ParticleSet;
use crate::potential::self_energy;

/// Summary statistics for one bound cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudProperties {
    /// Group id (founding particle index)
    pub id: usize,
    pub mass: f64,
    /// Mass-weighted center
    pub center: Point3<f64>,
    /// Square roots of the covariance eigenvalues, largest first
    pub principal_axes: Vector3<f64>,
    /// `sqrt(5/3 * <r^2>_m)`, the radius of a uniform sphere with the same
    /// mass-weighted mean square radius
    pub effective_radius: f64,
    /// Median member distance from the center
    pub half_mass_radius: f64,
    pub virial_parameter: f64,
    pub num_particles: usize,
}

impl CloudProperties {
    /// Computes the summary of `members` from scratch.
    ///
    /// The virial parameter is recomputed rather than taken from the
    /// assembler's ledger: kinetic energy in the center-of-mass frame plus
    /// thermal energy, over the self-gravitational energy (tree-evaluated when
    /// the cloud is larger than `ntree`).
    pub fn compute(id: usize, particles: &ParticleSet, members: &[usize], config: &CloudConfig) -> Self {
        let masses: Vec<f64> = members.iter().map(|&i| particles.masses[i]).collect();
        let mass: f64 = masses.iter().sum();

        let center = Point3::from(
            members
                .iter()
                .zip(&masses)
                .map(|(&i, &m)| particles.positions[i].coords * m)
                .sum::<Vector3<f64>>()
                / mass,
        );
        let velocity = members
            .iter()
            .zip(&masses)
            .map(|(&i, &m)| particles.velocities[i] * m)
            .sum::<Vector3<f64>>()
            / mass;

        let offsets: Vec<Vector3<f64>> = members.iter().map(|&i| particles.positions[i] - center).collect();
        let radii: Vec<f64> = offsets.iter().map(|d| d.magnitude()).collect();

        let mean_r2 = offsets
            .iter()
            .zip(&masses)
            .map(|(d, &m)| m * d.magnitude_squared())
            .sum::<f64>()
            / mass;

        let kinetic: f64 = members
            .iter()
            .zip(&masses)
            .map(|(&i, &m)| {
                0.5 * m * (particles.velocities[i] - velocity).magnitude_squared()
                    + m * particles.internal_energies[i]
            })
            .sum();
        let potential = config.gravitational_constant
            * self_energy(particles, members, config.opening_angle, config.ntree);

        CloudProperties {
            id,
            mass,
            center,
            principal_axes: principal_axes(&offsets),
            effective_radius: (5.0 / 3.0 * mean_r2).sqrt(),
            half_mass_radius: median(radii),
            virial_parameter: (2.0 * kinetic / potential).abs(),
            num_particles: members.len(),
        }
    }
}

/// Principal axis lengths of a point distribution given as offsets from its
/// center, largest first.
///
/// Uses the unbiased (n - 1) covariance; tiny negative eigenvalues from
/// round-off are clamped to zero.
pub fn principal_axes(offsets: &[Vector3<f64>]) -> Vector3<f64> {
    if offsets.len() < 2 {
        return Vector3::zeros();
    }
    let n = offsets.len() as f64;
    let mean = offsets.iter().sum::<Vector3<f64>>() / n;
    let covariance = offsets
        .iter()
        .map(|d| {
            let c = d - mean;
            c * c.transpose()
        })
        .sum::<Matrix3<f64>>()
        / (n - 1.0);

    let eigen = SymmetricEigen::new(covariance);
    let mut values: Vec<f64> = eigen.eigenvalues.iter().map(|&l| l.max(0.0).sqrt()).collect();
    values.sort_by(|a, b| b.total_cmp(a));
    Vector3::new(values[0], values[1], values[2])
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

/// Summaries of every group with at least `config.min_cloud_members`
/// members, heaviest first.
///
/// Groups are summarised in parallel.
pub fn catalog(
    particles: &ParticleSet,
    groups: &BTreeMap<usize, Vec<usize>>,
    config: &CloudConfig,
) -> Vec<CloudProperties> {
    let mut clouds: Vec<CloudProperties> = groups
        .par_iter()
        .filter(|(_, members)| members.len() >= config.min_cloud_members)
        .map(|(&id, members)| CloudProperties::compute(id, particles, members, config))
        .collect();
    clouds.sort_by(|a, b| b.mass.total_cmp(&a.mass).then(a.id.cmp(&b.id)));
    clouds
}
