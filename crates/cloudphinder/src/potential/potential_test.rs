use approx::assert_relative_eq;
use nalgebra::Point3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::particles::{Particle, ParticleSet};
use crate::potential::{DirectSum, GroupField, PotentialSource, TreePotential, kernel_potential, self_energy};

fn cloud(n: usize, seed: u64) -> ParticleSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let list: Vec<Particle> = (0..n)
        .map(|i| {
            Particle::new(
                i as u64,
                [
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                ],
                rng.random_range(0.5..1.5),
                1.0,
            )
        })
        .collect();
    ParticleSet::from_particles(&list, 1e-3)
}

#[test]
fn test_kernel_is_continuous() {
    let h = 0.4;
    let below = kernel_potential(0.5 * h - 1e-12, h);
    let above = kernel_potential(0.5 * h + 1e-12, h);
    assert_relative_eq!(below, above, max_relative = 1e-9);

    assert_relative_eq!(kernel_potential(h * (1.0 - 1e-12), h), -1.0 / h, max_relative = 1e-9);
}

#[test]
fn test_kernel_is_newtonian_outside_softening() {
    assert_eq!(kernel_potential(3.0, 1.0), -1.0 / 3.0);
    assert_eq!(kernel_potential(1.0, 1.0), -1.0);
}

#[test]
fn test_kernel_is_finite_and_monotone_inside() {
    let h = 1.0;
    let mut previous = kernel_potential(1e-6, h);
    for step in 1..=100 {
        let phi = kernel_potential(step as f64 * 0.01, h);
        assert!(phi.is_finite());
        assert!(phi >= previous);
        previous = phi;
    }
}

#[test]
fn test_direct_sum() {
    let particles = ParticleSet::from_particles(
        &[
            Particle::new(0, [0.0, 0.0, 0.0], 2.0, 1.0),
            Particle::new(1, [4.0, 0.0, 0.0], 1.0, 1.0),
        ],
        1e-3,
    );
    let members = [0, 1];
    let source = DirectSum::new(&particles, &members);

    assert_eq!(source.len(), 2);
    assert_relative_eq!(source.potential_at(Point3::new(2.0, 0.0, 0.0)), -1.5);
    // Each member only feels the other one
    assert_relative_eq!(source.potential_at(Point3::origin()), -0.25);
}

#[test]
fn test_tree_with_zero_opening_angle_is_exact() {
    let particles = cloud(300, 2);
    let members: Vec<usize> = (0..300).collect();
    let tree = TreePotential::build(&particles, &members, 0.0);
    let direct = DirectSum::new(&particles, &members);

    assert_eq!(tree.len(), 300);
    for target in [Point3::new(0.3, -0.2, 0.1), Point3::new(5.0, 5.0, 5.0)] {
        assert_relative_eq!(
            tree.potential_at(target),
            direct.potential_at(target),
            max_relative = 1e-12
        );
    }
}

#[test]
fn test_parallel_potentials_match_serial() {
    let particles = cloud(100, 5);
    let members: Vec<usize> = (0..100).collect();
    let source = DirectSum::new(&particles, &members);
    let targets: Vec<Point3<f64>> = (0..1000)
        .map(|i| Point3::new(i as f64 * 0.01, 2.0, -1.0))
        .collect();

    let batch = source.potentials(&targets);

    assert_eq!(batch.len(), targets.len());
    for (phi, target) in batch.iter().zip(&targets) {
        assert_eq!(*phi, source.potential_at(*target));
    }
}

#[test]
fn test_group_field_adds_tree_and_pending() {
    let particles = cloud(50, 9);
    let snapshot: Vec<usize> = (0..30).collect();
    let pending: Vec<usize> = (30..50).collect();
    let all: Vec<usize> = (0..50).collect();
    let tree = TreePotential::build(&particles, &snapshot, 0.0);
    let field = GroupField {
        tree: Some(&tree),
        pending: DirectSum::new(&particles, &pending),
    };
    let target = Point3::new(2.0, 0.0, 0.0);

    assert_relative_eq!(
        field.potential_at(target),
        DirectSum::new(&particles, &all).potential_at(target),
        max_relative = 1e-12
    );
}

#[test]
fn test_interaction_energy_is_symmetric() {
    let particles = cloud(60, 13);
    let a: Vec<usize> = (0..25).collect();
    let b: Vec<usize> = (25..60).collect();

    let ab = DirectSum::new(&particles, &a).interaction_energy(&particles, &b);
    let ba = DirectSum::new(&particles, &b).interaction_energy(&particles, &a);

    assert!(ab < 0.0);
    assert_relative_eq!(ab, ba, max_relative = 1e-12);
}

#[test]
fn test_self_energy_tree_close_to_direct() {
    let particles = cloud(500, 17);
    let members: Vec<usize> = (0..500).collect();

    let direct = self_energy(&particles, &members, 0.5, usize::MAX);
    let tree = self_energy(&particles, &members, 0.5, 100);

    assert!(direct < 0.0);
    assert_relative_eq!(tree, direct, max_relative = 2e-2);
}
