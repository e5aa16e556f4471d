//! Group records owned by the assembler.

use log::debug;

use crate::ledger::EnergyLedger;
use crate::particles::ParticleSet;
use crate::potential::{DirectSum, GroupField, PotentialSource, TreePotential};

/// A group of particles being assembled.
///
/// Identified by the particle index of its founding member. The group owns
/// its member list, its ledger, an optional tree over a snapshot of its
/// members, and the list of members added since that snapshot.
#[derive(Debug, Clone)]
pub struct Group {
    id: usize,
    members: Vec<usize>,
    ledger: EnergyLedger,
    tree: Option<TreePotential>,
    pending: Vec<usize>,
}

impl Group {
    /// Creates a single-member group founded by particle `id`
    pub fn singleton(id: usize, particles: &ParticleSet) -> Self {
        Group {
            id,
            members: vec![id],
            ledger: EnergyLedger::singleton(
                particles.masses[id],
                particles.positions[id],
                particles.velocities[id],
                particles.internal_energies[id],
            ),
            tree: None,
            pending: vec![id],
        }
    }

    /// Founding particle index, used as the group id
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ledger(&self) -> &EnergyLedger {
        &self.ledger
    }

    pub fn mass(&self) -> f64 {
        self.ledger.mass
    }

    pub fn has_tree(&self) -> bool {
        self.tree.is_some()
    }

    pub fn tree(&self) -> Option<&TreePotential> {
        self.tree.as_ref()
    }

    /// Members not covered by the tree snapshot
    pub fn pending(&self) -> &[usize] {
        &self.pending
    }

    /// The group's potential field: tree snapshot plus pending members.
    pub fn field<'a>(&'a self, particles: &'a ParticleSet) -> GroupField<'a> {
        GroupField {
            tree: self.tree.as_ref(),
            pending: DirectSum::new(particles, &self.pending),
        }
    }

    /// Adds particle `i`, updating the ledger with the potential of the
    /// current members at its position (scaled by `g`).
    ///
    /// Rebuilds the tree over all members once more than `ntree` members are
    /// pending.
    pub fn attach(&mut self, i: usize, particles: &ParticleSet, g: f64, ntree: usize, theta: f64) {
        let position = particles.positions[i];
        let potential = g * self.field(particles).potential_at(position);
        self.ledger.attach(
            particles.masses[i],
            position,
            particles.velocities[i],
            particles.internal_energies[i],
            potential,
        );
        self.members.push(i);
        self.pending.push(i);
        if self.pending.len() > ntree {
            self.rebuild_tree(particles, theta);
        }
    }

    /// Mutual potential energy between this group and `other`, with G = 1.
    ///
    /// The field of whichever group has a tree is evaluated at the other
    /// group's members, preferring this group's field when both or neither
    /// have one.
    pub fn interaction_energy(&self, other: &Group, particles: &ParticleSet) -> f64 {
        if self.has_tree() || !other.has_tree() {
            self.field(particles).interaction_energy(particles, &other.members)
        } else {
            other.field(particles).interaction_energy(particles, &self.members)
        }
    }

    /// Absorbs `other`, which the caller then discards.
    ///
    /// `interaction` is the mutual potential energy (G included). Returns the
    /// relative-motion kinetic term. Tree policy:
    /// - already above `ntree` and absorbing more than `small_group` members:
    ///   rebuild over the combined membership;
    /// - already above `ntree` and absorbing a small group: defer, appending
    ///   the absorbed members to the pending list;
    /// - otherwise everything becomes pending.
    ///
    /// In every case a pending list longer than `ntree` forces a rebuild.
    pub fn absorb(
        &mut self,
        other: Group,
        interaction: f64,
        particles: &ParticleSet,
        ntree: usize,
        small_group: usize,
        theta: f64,
    ) -> f64 {
        let relative = self.ledger.absorb(&other.ledger, interaction);
        let was_large = self.members.len() > ntree;
        let absorbed_large = other.members.len() > small_group;
        self.members.extend_from_slice(&other.members);

        if was_large {
            if absorbed_large {
                self.rebuild_tree(particles, theta);
            } else {
                self.pending.extend_from_slice(&other.members);
            }
        } else {
            self.tree = None;
            self.pending.clear();
            self.pending.extend_from_slice(&self.members);
        }

        if self.pending.len() > ntree {
            self.rebuild_tree(particles, theta);
        }
        relative
    }

    /// Builds a fresh tree over all current members and clears the pending list.
    pub fn rebuild_tree(&mut self, particles: &ParticleSet, theta: f64) {
        debug!(
            "rebuilding tree for group {} over {} members",
            self.id,
            self.members.len()
        );
        self.tree = Some(TreePotential::build(particles, &self.members, theta));
        self.pending.clear();
    }
}
