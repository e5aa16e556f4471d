//! Density-ordered group assembly.
//!
//! Particles are visited once, highest rank first. Each particle either
//! founds a new group, joins the group of its nearest higher-ranked
//! neighbour, or sits on a saddle between two groups, which are merged before
//! it joins the survivor. Every change goes through the groups' energy
//! ledgers, and whenever a group comes out bound its current size is stamped
//! on all of its members.
//!
//! # Example
//!
//! ```
//! use cloudphinder::assembler::{AssemblyParams, GroupAssembler};
//! use cloudphinder::neighbors::NeighborIndex;
//! use cloudphinder::particles::{Particle, ParticleSet};
//!
//! // Three particles on a line, densest in the middle
//! let particles = ParticleSet::from_particles(
//!     &[
//!         Particle::new(0, [-1.0, 0.0, 0.0], 1.0, 1.0),
//!         Particle::new(1, [0.0, 0.0, 0.0], 1.0, 2.0),
//!         Particle::new(2, [1.0, 0.0, 0.0], 1.0, 1.0),
//!     ],
//!     0.01,
//! );
//! let table = NeighborIndex::build(&particles.positions).query_all(2, 10.0).unwrap();
//! let rank = particles.densities.clone();
//!
//! let assembly = GroupAssembler::new(&particles, &table, rank, AssemblyParams::default())
//!     .unwrap()
//!     .run();
//!
//! assert_eq!(assembly.groups.len(), 1);
//! assert_eq!(assembly.groups[&1].len(), 3);
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

use log::{debug, info};

use crate::error::{CloudError, Result};
use crate::extractor;
use crate::group::Group;
use crate::neighbors::NeighborTable;
use crate::particles::ParticleSet;

/// How often the scan reports progress
const PROGRESS_INTERVAL: usize = 10_000;

/// Numerical parameters of an assembly run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyParams {
    pub gravitational_constant: f64,
    pub alpha_crit: f64,
    /// Pending-list length that triggers a tree rebuild
    pub ntree: usize,
    /// Absorbed-group size above which a merge rebuilds immediately
    pub small_group_threshold: usize,
    pub opening_angle: f64,
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self {
            gravitational_constant: 4.301e4,
            alpha_crit: 2.0,
            ntree: 10_000,
            small_group_threshold: 512,
            opening_angle: 0.7,
        }
    }
}

/// What happened to one particle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The particle started its own group
    Founded { particle: usize, group: usize },
    /// The particle joined an existing group
    Attached { particle: usize, group: usize },
    /// The particle sat on a saddle: `absorbed` was merged into `group`,
    /// which the particle then joined
    Merged {
        particle: usize,
        group: usize,
        absorbed: usize,
    },
}

/// Energy bookkeeping of one merge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeEvent {
    /// Saddle particle that triggered the merge
    pub particle: usize,
    pub survivor: usize,
    pub absorbed: usize,
    pub survivor_energy: f64,
    pub absorbed_energy: f64,
    /// `0.5 * mu * |v_a - v_b|^2` of the two centers of mass
    pub relative_motion: f64,
    /// Mutual potential energy, G included
    pub interaction: f64,
    /// Total energy of the merged group before the saddle particle joined
    pub total: f64,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub founded: usize,
    pub attached: usize,
    pub merged: usize,
}

/// The final state of a completed scan.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Live top-level groups keyed by id
    pub groups: BTreeMap<usize, Group>,
    /// Live group of every particle
    pub assigned_group: Vec<Option<usize>>,
    /// Group id of the largest bound configuration each particle belonged to
    pub assigned_bound_group: Vec<Option<usize>>,
    /// Size of that configuration (0 if never bound)
    pub largest_assigned_group: Vec<usize>,
    pub merges: Vec<MergeEvent>,
    pub stats: AssemblyStats,
}

impl Assembly {
    /// Bound group id -> members
    pub fn bound_groups(&self) -> BTreeMap<usize, Vec<usize>> {
        extractor::bound_groups(&self.assigned_bound_group)
    }
}

/// Streaming group builder over one particle set.
pub struct GroupAssembler<'a> {
    particles: &'a ParticleSet,
    neighbors: &'a NeighborTable,
    rank: Vec<f64>,
    params: AssemblyParams,
    order: Vec<usize>,
    cursor: usize,
    groups: Vec<Option<Group>>,
    assigned_group: Vec<Option<usize>>,
    assigned_bound_group: Vec<Option<usize>>,
    largest_assigned_group: Vec<usize>,
    merges: Vec<MergeEvent>,
    stats: AssemblyStats,
}

impl<'a> GroupAssembler<'a> {
    /// Prepares a scan.
    ///
    /// Particles are visited in decreasing `rank`; equal ranks keep their
    /// index order.
    pub fn new(
        particles: &'a ParticleSet,
        neighbors: &'a NeighborTable,
        rank: Vec<f64>,
        params: AssemblyParams,
    ) -> Result<Self> {
        let n = particles.len();
        if neighbors.len() != n || rank.len() != n {
            return Err(CloudError::invalid(format!(
                "{} particles but {} neighbour lists and {} rank values",
                n,
                neighbors.len(),
                rank.len()
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| rank[b].total_cmp(&rank[a]));

        Ok(Self {
            particles,
            neighbors,
            rank,
            params,
            order,
            cursor: 0,
            groups: vec![None; n],
            assigned_group: vec![None; n],
            assigned_bound_group: vec![None; n],
            largest_assigned_group: vec![0; n],
            merges: Vec::new(),
            stats: AssemblyStats::default(),
        })
    }

    /// Processing order (particle indices)
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Particles processed so far
    pub fn processed(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor == self.order.len()
    }

    /// Live group with the given id
    pub fn group(&self, id: usize) -> Option<&Group> {
        self.groups.get(id).and_then(Option::as_ref)
    }

    pub fn assigned_group(&self) -> &[Option<usize>] {
        &self.assigned_group
    }

    pub fn assigned_bound_group(&self) -> &[Option<usize>] {
        &self.assigned_bound_group
    }

    pub fn largest_assigned_group(&self) -> &[usize] {
        &self.largest_assigned_group
    }

    pub fn merges(&self) -> &[MergeEvent] {
        &self.merges
    }

    /// Processes the next particle in rank order.
    pub fn process_next(&mut self) -> Option<Step> {
        let i = *self.order.get(self.cursor)?;
        self.cursor += 1;
        Some(self.process(i))
    }

    /// Runs the scan to completion.
    pub fn run(mut self) -> Assembly {
        let n = self.order.len();
        let start = Instant::now();
        while self.cursor < n {
            if self.cursor % PROGRESS_INTERVAL == 0 {
                let done = self.cursor as f64 / n as f64;
                debug!(
                    "processed {} of {} particles; ~{:.2}% done",
                    self.cursor,
                    n,
                    100.0 * done * done
                );
            }
            self.process_next();
        }
        info!(
            "assembled {} particles in {:.3?}: {} groups founded, {} merges",
            n,
            start.elapsed(),
            self.stats.founded,
            self.stats.merged
        );
        self.finish()
    }

    /// Hands over the final state.
    pub fn finish(self) -> Assembly {
        let groups = self
            .groups
            .into_iter()
            .flatten()
            .map(|g| (g.id(), g))
            .collect();
        Assembly {
            groups,
            assigned_group: self.assigned_group,
            assigned_bound_group: self.assigned_bound_group,
            largest_assigned_group: self.largest_assigned_group,
            merges: self.merges,
            stats: self.stats,
        }
    }

    fn process(&mut self, i: usize) -> Step {
        let rank_i = self.rank[i];

        // Groups of the (up to) two nearest strictly higher-ranked neighbours.
        // Neighbour lists are sorted by distance, so the first two hits are
        // the nearest.
        let higher: Vec<usize> = self
            .neighbors
            .neighbors(i)
            .iter()
            .filter(|&&j| self.rank[j] > rank_i)
            .filter_map(|&j| self.assigned_group[j])
            .take(2)
            .collect();

        match higher.as_slice() {
            [] => self.found(i),
            [g] => self.attach(i, *g),
            [a, b] if a == b => self.attach(i, *a),
            [a, b, ..] => {
                // The heavier group survives; on equal mass the nearer one does
                let (survivor, absorbed) = if self.group_mass(*a) < self.group_mass(*b) {
                    (*b, *a)
                } else {
                    (*a, *b)
                };
                self.merge(i, survivor, absorbed);
                self.attach(i, survivor);
                Step::Merged {
                    particle: i,
                    group: survivor,
                    absorbed,
                }
            }
        }
    }

    fn group_mass(&self, id: usize) -> f64 {
        self.group(id).map_or(0.0, Group::mass)
    }

    fn found(&mut self, i: usize) -> Step {
        self.groups[i] = Some(Group::singleton(i, self.particles));
        self.assigned_group[i] = Some(i);
        self.stats.founded += 1;
        Step::Founded {
            particle: i,
            group: i,
        }
    }

    fn attach(&mut self, i: usize, g: usize) -> Step {
        let params = self.params;
        if let Some(group) = self.groups[g].as_mut() {
            group.attach(
                i,
                self.particles,
                params.gravitational_constant,
                params.ntree,
                params.opening_angle,
            );
        }
        self.assigned_group[i] = Some(g);
        self.stats.attached += 1;
        self.record_if_bound(g);
        Step::Attached {
            particle: i,
            group: g,
        }
    }

    fn merge(&mut self, i: usize, survivor_id: usize, absorbed_id: usize) {
        let params = self.params;
        let Some(absorbed) = self.groups[absorbed_id].take() else {
            return;
        };
        let Some(survivor) = self.groups[survivor_id].as_mut() else {
            self.groups[absorbed_id] = Some(absorbed);
            return;
        };

        let survivor_energy = survivor.ledger().total;
        let absorbed_energy = absorbed.ledger().total;
        let interaction =
            params.gravitational_constant * survivor.interaction_energy(&absorbed, self.particles);

        for &m in absorbed.members() {
            self.assigned_group[m] = Some(survivor_id);
        }

        let relative_motion = survivor.absorb(
            absorbed,
            interaction,
            self.particles,
            params.ntree,
            params.small_group_threshold,
            params.opening_angle,
        );

        self.merges.push(MergeEvent {
            particle: i,
            survivor: survivor_id,
            absorbed: absorbed_id,
            survivor_energy,
            absorbed_energy,
            relative_motion,
            interaction,
            total: survivor.ledger().total,
        });
        self.stats.merged += 1;
        self.record_if_bound(survivor_id);
    }

    /// Stamps the group's id and size on its members if it is bound and at
    /// least as large as what each member has on record.
    fn record_if_bound(&mut self, g: usize) {
        let Some(group) = self.groups[g].as_ref() else {
            return;
        };
        if !group.ledger().is_bound(self.params.alpha_crit) {
            return;
        }
        let size = group.len();
        for &m in group.members() {
            if size >= self.largest_assigned_group[m] {
                self.largest_assigned_group[m] = size;
                self.assigned_bound_group[m] = Some(g);
            }
        }
    }
}
