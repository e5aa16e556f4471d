use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};

use crate::ledger::EnergyLedger;
use crate::potential::kernel_potential;

struct Body {
    mass: f64,
    position: Point3<f64>,
    velocity: Vector3<f64>,
    internal_energy: f64,
}

fn bodies() -> Vec<Body> {
    vec![
        Body {
            mass: 1.0,
            position: Point3::new(0.0, 0.0, 0.0),
            velocity: Vector3::new(0.1, 0.0, 0.0),
            internal_energy: 0.01,
        },
        Body {
            mass: 2.0,
            position: Point3::new(1.0, 0.0, 0.0),
            velocity: Vector3::new(0.0, 0.2, 0.0),
            internal_energy: 0.02,
        },
        Body {
            mass: 0.5,
            position: Point3::new(0.0, 1.5, 0.0),
            velocity: Vector3::new(-0.1, 0.0, 0.3),
            internal_energy: 0.0,
        },
        Body {
            mass: 1.5,
            position: Point3::new(0.3, 0.2, 2.0),
            velocity: Vector3::new(0.0, -0.2, 0.1),
            internal_energy: 0.05,
        },
        Body {
            mass: 1.0,
            position: Point3::new(-1.0, -1.0, 0.5),
            velocity: Vector3::new(0.05, 0.05, 0.05),
            internal_energy: 0.01,
        },
    ]
}

const H: f64 = 0.01;

/// Kinetic (COM frame, thermal included) and total energy from scratch, G = 1
fn brute_force(bodies: &[Body]) -> (f64, f64) {
    let mass: f64 = bodies.iter().map(|b| b.mass).sum();
    let v_com = bodies.iter().map(|b| b.velocity * b.mass).sum::<Vector3<f64>>() / mass;
    let kinetic: f64 = bodies
        .iter()
        .map(|b| 0.5 * b.mass * (b.velocity - v_com).magnitude_squared() + b.mass * b.internal_energy)
        .sum();
    let mut potential = 0.0;
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let r = (bodies[i].position - bodies[j].position).magnitude();
            potential += bodies[i].mass * bodies[j].mass * kernel_potential(r, H);
        }
    }
    (kinetic, kinetic + potential)
}

fn grow(bodies: &[Body]) -> EnergyLedger {
    let first = &bodies[0];
    let mut ledger = EnergyLedger::singleton(first.mass, first.position, first.velocity, first.internal_energy);
    for (n, b) in bodies.iter().enumerate().skip(1) {
        let phi: f64 = bodies[..n]
            .iter()
            .map(|s| s.mass * kernel_potential((s.position - b.position).magnitude(), H))
            .sum();
        ledger.attach(b.mass, b.position, b.velocity, b.internal_energy, phi);
    }
    ledger
}

#[test]
fn test_singleton_carries_thermal_energy() {
    let ledger = EnergyLedger::singleton(2.0, Point3::origin(), Vector3::new(5.0, 0.0, 0.0), 0.25);

    assert_eq!(ledger.kinetic, 0.5);
    assert_eq!(ledger.total, 0.5);
    assert_eq!(ledger.potential(), 0.0);
}

#[test]
fn test_two_body_attach() {
    let mut ledger = EnergyLedger::singleton(1.0, Point3::origin(), Vector3::zeros(), 0.0);
    ledger.attach(1.0, Point3::new(2.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 0.0, -0.5);

    assert_relative_eq!(ledger.kinetic, 0.25);
    assert_relative_eq!(ledger.total, -0.25);
    assert_relative_eq!(ledger.velocity, Vector3::new(0.5, 0.0, 0.0));
    assert_relative_eq!(ledger.virial_parameter(), 1.0);
    assert!(ledger.is_bound(2.0));
    assert!(!ledger.is_bound(1.0));
}

#[test]
fn test_sequential_attach_matches_brute_force() {
    let bodies = bodies();
    let ledger = grow(&bodies);
    let (kinetic, total) = brute_force(&bodies);

    assert_relative_eq!(ledger.mass, 6.0);
    assert_relative_eq!(ledger.kinetic, kinetic, max_relative = 1e-12);
    assert_relative_eq!(ledger.total, total, max_relative = 1e-12);
}

#[test]
fn test_absorb_matches_brute_force() {
    let bodies = bodies();
    let (left, right) = bodies.split_at(2);
    let mut a = grow(left);
    let b = grow(right);

    let mut interaction = 0.0;
    for p in left {
        for q in right {
            interaction += p.mass * q.mass * kernel_potential((p.position - q.position).magnitude(), H);
        }
    }
    let before = a.total + b.total;
    let relative = a.absorb(&b, interaction);
    let (kinetic, total) = brute_force(&bodies);

    assert_relative_eq!(a.total, before + relative + interaction, max_relative = 1e-12);
    assert_relative_eq!(a.kinetic, kinetic, max_relative = 1e-12);
    assert_relative_eq!(a.total, total, max_relative = 1e-12);
    assert_relative_eq!(a.mass, 6.0);
}

#[test]
fn test_center_of_mass_tracks_members() {
    let bodies = bodies();
    let ledger = grow(&bodies);
    let expected = bodies.iter().map(|b| b.position.coords * b.mass).sum::<Vector3<f64>>() / 6.0;

    assert_relative_eq!(ledger.center_of_mass.coords, expected, max_relative = 1e-12);
}

#[test]
fn test_zero_potential_is_never_bound() {
    let ledger = EnergyLedger::singleton(1.0, Point3::origin(), Vector3::zeros(), 1.0);
    assert!(ledger.virial_parameter().is_infinite());
    assert!(!ledger.is_bound(2.0));

    let cold = EnergyLedger::singleton(1.0, Point3::origin(), Vector3::zeros(), 0.0);
    assert!(cold.virial_parameter().is_nan());
    assert!(!cold.is_bound(2.0));
}
