//! Running energy totals for a growing group.
//!
//! A ledger is only ever updated additively: attaching one particle adds its
//! reduced two-body kinetic term, its thermal energy and its potential energy
//! in the field of the existing members; absorbing another group adds that
//! group's totals, the relative motion of the two centers of mass and the
//! mutual interaction energy. Nothing is recomputed from the member list, so
//! every pairwise interaction is counted exactly once.

use nalgebra::{Point3, Vector3};

/// Mass, center of mass and energy totals of a group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyLedger {
    pub mass: f64,
    pub center_of_mass: Point3<f64>,
    /// Center-of-mass velocity
    pub velocity: Vector3<f64>,
    /// Kinetic energy in the center-of-mass frame plus thermal energy
    pub kinetic: f64,
    /// Kinetic plus thermal plus gravitational energy
    pub total: f64,
}

impl EnergyLedger {
    /// Ledger of a single particle.
    ///
    /// The only energy a lone particle carries is its thermal energy `m * u`;
    /// its self-potential is taken as zero.
    pub fn singleton(
        mass: f64,
        position: Point3<f64>,
        velocity: Vector3<f64>,
        internal_energy: f64,
    ) -> Self {
        let thermal = mass * internal_energy;
        Self {
            mass,
            center_of_mass: position,
            velocity,
            kinetic: thermal,
            total: thermal,
        }
    }

    /// Kinetic increment from adding a particle: `0.5 * mu * |v - v_com|^2 + m * u`,
    /// with `mu` the reduced mass of the particle and the group.
    pub fn kinetic_increment(&self, mass: f64, velocity: &Vector3<f64>, internal_energy: f64) -> f64 {
        let mu = mass * self.mass / (mass + self.mass);
        0.5 * mu * (velocity - self.velocity).magnitude_squared() + mass * internal_energy
    }

    /// Adds one particle.
    ///
    /// `potential` is the gravitational potential at the particle's position
    /// due to the current members, G included. The kinetic increment goes into
    /// both totals; `mass * potential` goes into the total only.
    ///
    /// # Examples
    ///
    /// ```
    /// use nalgebra::{Point3, Vector3};
    /// use cloudphinder::ledger::EnergyLedger;
    ///
    /// let mut ledger = EnergyLedger::singleton(1.0, Point3::origin(), Vector3::zeros(), 0.0);
    /// ledger.attach(1.0, Point3::new(2.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0), 0.0, -0.5);
    ///
    /// // 0.5 * (1 * 1 / 2) * 2^2 = 1 kinetic, 1 * -0.5 potential
    /// assert_eq!(ledger.kinetic, 1.0);
    /// assert_eq!(ledger.total, 0.5);
    /// assert_eq!(ledger.mass, 2.0);
    /// assert_eq!(ledger.center_of_mass, Point3::new(1.0, 0.0, 0.0));
    /// ```
    pub fn attach(
        &mut self,
        mass: f64,
        position: Point3<f64>,
        velocity: Vector3<f64>,
        internal_energy: f64,
        potential: f64,
    ) {
        let kinetic = self.kinetic_increment(mass, &velocity, internal_energy);
        self.kinetic += kinetic;
        self.total += kinetic + mass * potential;

        let total_mass = self.mass + mass;
        self.center_of_mass =
            Point3::from((self.center_of_mass.coords * self.mass + position.coords * mass) / total_mass);
        self.velocity = (self.velocity * self.mass + velocity * mass) / total_mass;
        self.mass = total_mass;
    }

    /// Kinetic energy of the relative motion of two centers of mass:
    /// `0.5 * (m_a * m_b / (m_a + m_b)) * |v_a - v_b|^2`.
    pub fn relative_motion_energy(&self, other: &EnergyLedger) -> f64 {
        let mu = self.mass * other.mass / (self.mass + other.mass);
        0.5 * mu * (self.velocity - other.velocity).magnitude_squared()
    }

    /// Absorbs another group's ledger.
    ///
    /// `interaction` is the mutual potential energy between the two member
    /// sets, G included. Returns the relative-motion term that was added.
    pub fn absorb(&mut self, other: &EnergyLedger, interaction: f64) -> f64 {
        let relative = self.relative_motion_energy(other);
        self.kinetic += other.kinetic + relative;
        self.total += other.total + relative + interaction;

        let total_mass = self.mass + other.mass;
        self.center_of_mass = Point3::from(
            (self.center_of_mass.coords * self.mass + other.center_of_mass.coords * other.mass)
                / total_mass,
        );
        self.velocity = (self.velocity * self.mass + other.velocity * other.mass) / total_mass;
        self.mass = total_mass;
        relative
    }

    /// Gravitational energy alone
    pub fn potential(&self) -> f64 {
        self.total - self.kinetic
    }

    /// Virial parameter `|2 * KE / (E - KE)|`.
    ///
    /// Infinite or NaN when the gravitational energy vanishes.
    pub fn virial_parameter(&self) -> f64 {
        (2.0 * self.kinetic / self.potential().abs()).abs()
    }

    /// True if the virial parameter is finite and below `alpha_crit`
    pub fn is_bound(&self, alpha_crit: f64) -> bool {
        let alpha = self.virial_parameter();
        alpha.is_finite() && alpha < alpha_crit
    }
}
