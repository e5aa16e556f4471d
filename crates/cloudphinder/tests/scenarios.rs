//! End-to-end runs over synthetic datasets with known answers.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};

use cloudphinder::assembler::{AssemblyParams, GroupAssembler};
use cloudphinder::finder::InMemorySource;
use cloudphinder::neighbors::NeighborIndex;
use cloudphinder::particles::RankMode;
use cloudphinder::potential::kernel_potential;
use cloudphinder::sink::CloudReport;
use cloudphinder::{CloudConfig, CloudError, CloudFinder, Particle, ParticleSet};

fn config() -> CloudConfig {
    CloudConfig {
        gravitational_constant: 1.0,
        min_number_density: 0.0,
        number_density_factor: 1.0,
        ..CloudConfig::default()
    }
}

/// A cubic lattice of `side^3` particles centered on `center`, with density
/// falling off with distance from the center. Smoothing lengths span two
/// lattice spacings so neighbour searches reach past the face neighbours.
fn lattice(side: usize, spacing: f64, center: [f64; 3], first_id: u64) -> Vec<Particle> {
    let half = (side - 1) as f64 / 2.0;
    let mut list = Vec::with_capacity(side * side * side);
    for i in 0..side {
        for j in 0..side {
            for k in 0..side {
                let offset = Vector3::new(i as f64 - half, j as f64 - half, k as f64 - half) * spacing;
                let position = Point3::from(Vector3::from(center) + offset);
                let density = 100.0 - offset.magnitude();
                list.push(
                    Particle::new(
                        first_id + list.len() as u64,
                        [position.x, position.y, position.z],
                        1.0,
                        density,
                    )
                    .with_smoothing_length(2.0 * spacing)
                    .with_internal_energy(1e-4),
                );
            }
        }
    }
    list
}

fn brute_force_total(particles: &ParticleSet, members: &[usize]) -> f64 {
    let mass: f64 = members.iter().map(|&i| particles.masses[i]).sum();
    let v_com = members
        .iter()
        .map(|&i| particles.velocities[i] * particles.masses[i])
        .sum::<Vector3<f64>>()
        / mass;
    let mut total = 0.0;
    for (n, &i) in members.iter().enumerate() {
        let m = particles.masses[i];
        total += 0.5 * m * (particles.velocities[i] - v_com).magnitude_squared()
            + m * particles.internal_energies[i];
        for &j in &members[n + 1..] {
            let r = (particles.positions[i] - particles.positions[j]).magnitude();
            total += m * particles.masses[j] * kernel_potential(r, particles.smoothing_lengths[j]);
        }
    }
    total
}

#[test]
fn two_separated_lattices_form_two_clouds() {
    let mut list = lattice(5, 0.25, [0.0, 0.0, 0.0], 0);
    list.extend(lattice(5, 0.25, [100.0, 0.0, 0.0], 125));
    let particles = ParticleSet::from_particles(&list, 1e-5);

    let finder = CloudFinder::new(CloudConfig {
        neighbor_count: 8,
        max_linking_length: 5.0,
        ..config()
    })
    .unwrap();
    let report = finder.find(&particles).unwrap();

    // The lattice centers are the only density maxima
    assert_eq!(report.groups.keys().copied().collect::<Vec<_>>(), vec![62, 187]);
    assert_eq!(report.groups[&62], (0..125).collect::<Vec<usize>>());
    assert_eq!(report.groups[&187], (125..250).collect::<Vec<usize>>());
    assert_eq!(report.stats.founded, 2);
    assert_eq!(report.stats.merged, 0);

    assert_eq!(report.clouds.len(), 2);
    for cloud in &report.clouds {
        assert_eq!(cloud.num_particles, 125);
        assert_relative_eq!(cloud.mass, 125.0);
        assert!(cloud.virial_parameter < 2.0);
    }
    let centers: Vec<f64> = report.clouds.iter().map(|c| c.center.x).collect();
    assert!(centers.iter().any(|x| x.abs() < 1e-9));
    assert!(centers.iter().any(|x| (x - 100.0).abs() < 1e-9));
}

#[test]
fn lattice_bound_at_rest_unbound_when_hot() {
    let cold = ParticleSet::from_particles(&lattice(7, 1.0, [0.0; 3], 0), 1e-5);
    let finder = CloudFinder::new(CloudConfig {
        neighbor_count: 8,
        ..config()
    })
    .unwrap();

    let report = finder.find(&cold).unwrap();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[&171].len(), 343);

    // Face neighbours differ by 1, 7 or 49 in index, so alternating signs
    // give every neighbouring pair opposite velocities
    let hot_list: Vec<Particle> = lattice(7, 1.0, [0.0; 3], 0)
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            p.with_velocity([sign * 1e3, 0.0, 0.0])
        })
        .collect();
    let hot = ParticleSet::from_particles(&hot_list, 1e-5);

    let report = finder.find(&hot).unwrap();
    assert!(report.groups.is_empty());
    assert!(report.clouds.is_empty());

    // The ledger of the final (unbound) group still matches a from-scratch sum
    let table = NeighborIndex::build(&hot.positions).query_all(8, 1e100).unwrap();
    let assembly = GroupAssembler::new(
        &hot,
        &table,
        hot.densities.clone(),
        AssemblyParams {
            gravitational_constant: 1.0,
            ..AssemblyParams::default()
        },
    )
    .unwrap()
    .run();
    let group = &assembly.groups[&171];
    assert_eq!(group.len(), 343);
    assert_relative_eq!(
        group.ledger().total,
        brute_force_total(&hot, group.members()),
        max_relative = 1e-9
    );
}

/// 21 particles on a line at x = -10..10 with density peaks at x = -6 and x = 6
fn two_peak_line() -> ParticleSet {
    let list: Vec<Particle> = (0..21)
        .map(|i| {
            let x = i as f64 - 10.0;
            let density = 10.0 - (x - 6.0).abs().min((x + 6.0).abs());
            Particle::new(i as u64, [x, 0.0, 0.0], 1.0, density).with_smoothing_length(0.1)
        })
        .collect();
    ParticleSet::from_particles(&list, 1e-5)
}

fn run_line(params: AssemblyParams) -> cloudphinder::assembler::Assembly {
    let particles = two_peak_line();
    let table = NeighborIndex::build(&particles.positions).query_all(3, 1e100).unwrap();
    GroupAssembler::new(&particles, &table, particles.densities.clone(), params)
        .unwrap()
        .run()
}

#[test]
fn saddle_between_two_peaks_merges_once() {
    let params = AssemblyParams {
        gravitational_constant: 1.0,
        ..AssemblyParams::default()
    };
    let assembly = run_line(params);

    assert_eq!(assembly.merges.len(), 1);
    let event = assembly.merges[0];
    // x = 0 joins the x = -6 side on the mass tie
    assert_eq!((event.particle, event.survivor, event.absorbed), (10, 4, 16));

    let mut interaction = 0.0;
    for a in 0..10 {
        for b in 11..21 {
            interaction -= 1.0 / (b - a) as f64;
        }
    }
    assert_relative_eq!(event.interaction, interaction, max_relative = 1e-12);
    assert_relative_eq!(
        event.total,
        event.survivor_energy + event.absorbed_energy + event.relative_motion + event.interaction,
        max_relative = 1e-12
    );

    let treed = run_line(AssemblyParams {
        ntree: 2,
        small_group_threshold: 1,
        opening_angle: 0.1,
        ..params
    });
    assert_relative_eq!(treed.merges[0].interaction, interaction, max_relative = 1e-2);
    assert_relative_eq!(
        treed.groups[&4].ledger().total,
        assembly.groups[&4].ledger().total,
        max_relative = 1e-2
    );
}

#[test]
fn potential_mode_matches_density_mode() {
    let list: Vec<Particle> = lattice(5, 0.25, [0.0; 3], 0)
        .into_iter()
        .map(|p| {
            let potential = -p.density;
            p.with_potential(potential)
        })
        .collect();
    let particles = ParticleSet::from_particles(&list, 1e-5);

    let density = CloudFinder::new(CloudConfig {
        neighbor_count: 8,
        ..config()
    })
    .unwrap()
    .find(&particles)
    .unwrap();
    let potential = CloudFinder::new(CloudConfig {
        neighbor_count: 8,
        rank_mode: RankMode::Potential,
        ..config()
    })
    .unwrap()
    .find(&particles)
    .unwrap();

    assert_eq!(density.groups, potential.groups);
}

#[test]
fn isolated_particles_yield_no_clouds() {
    let list: Vec<Particle> = (0..20)
        .map(|i| Particle::new(i, [10.0 * i as f64, 0.0, 0.0], 1.0, 1.0 + i as f64))
        .collect();
    let particles = ParticleSet::from_particles(&list, 1e-5);
    let finder = CloudFinder::new(CloudConfig {
        neighbor_count: 4,
        max_linking_length: 1.0,
        ..config()
    })
    .unwrap();

    let report = finder.find(&particles).unwrap();

    assert_eq!(report.stats.founded, 20);
    assert!(report.groups.is_empty());
}

#[test]
fn batch_skips_failed_datasets() {
    let sources = vec![
        InMemorySource::new(
            "lattice",
            ParticleSet::from_particles(&lattice(5, 0.25, [0.0; 3], 0), 1e-5),
        ),
        InMemorySource::new(
            "tiny",
            ParticleSet::from_particles(&lattice(1, 0.25, [0.0; 3], 0), 1e-5),
        ),
        InMemorySource::new(
            "shifted",
            ParticleSet::from_particles(&lattice(5, 0.25, [50.0, 0.0, 0.0], 0), 1e-5),
        ),
    ];
    let finder = CloudFinder::new(CloudConfig {
        neighbor_count: 8,
        threads: 2,
        ..config()
    })
    .unwrap();

    let mut sink: Vec<CloudReport> = Vec::new();
    let outcome = finder.run_batch(&sources, &mut sink).unwrap();

    assert_eq!(outcome.completed, 2);
    assert_eq!(outcome.skipped, vec!["tiny".to_string()]);
    let labels: Vec<&str> = sink.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["lattice", "shifted"]);

    let tiny = finder.find(&sources[1].particles);
    assert!(matches!(tiny, Err(CloudError::InsufficientData { stage: "total", .. })));
}

#[test]
fn spacing_wider_than_smoothing_leaves_every_particle_alone() {
    let list: Vec<Particle> = (0..40)
        .map(|i| {
            Particle::new(i, [i as f64, 0.0, 0.0], 1.0, 100.0 - i as f64).with_smoothing_length(0.1)
        })
        .collect();
    let particles = ParticleSet::from_particles(&list, 1e-5);
    let finder = CloudFinder::new(CloudConfig {
        neighbor_count: 4,
        ..config()
    })
    .unwrap();

    let report = finder.find(&particles).unwrap();

    assert_eq!(report.stats.founded, 40);
    assert_eq!(report.stats.attached, 0);
    assert_eq!(report.stats.merged, 0);
    assert!(report.groups.is_empty());
}
