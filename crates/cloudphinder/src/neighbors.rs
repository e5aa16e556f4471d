//! k-nearest-neighbour search over particle positions.
//!
//! The kd-tree is arena-allocated: nodes live contiguously in a `Vec` and
//! reference each other by index, and leaves own contiguous ranges of a
//! permuted index array. Queries for all particles run in parallel but the
//! call blocks until every list is complete.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nalgebra::Point3;
use rayon::prelude::*;

use crate::error::{CloudError, Result};

/// Points per leaf before a node is split
const LEAF_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    fn new(index: usize) -> Self {
        debug_assert!(index < u32::MAX as usize, "NodeId overflow");
        NodeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug)]
enum KdNode {
    /// Range into `NeighborIndex::order`
    Leaf { start: u32, end: u32 },
    Split {
        axis: usize,
        value: f64,
        left: NodeId,
        right: NodeId,
    },
}

/// Candidate neighbour ordered by (distance², index) so the heap top is the
/// current worst match.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    dist_sq: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.index.cmp(&other.index))
    }
}

/// Spatial index answering k-nearest queries within a maximum radius.
pub struct NeighborIndex<'a> {
    positions: &'a [Point3<f64>],
    order: Vec<usize>,
    nodes: Vec<KdNode>,
    root: Option<NodeId>,
}

impl<'a> NeighborIndex<'a> {
    /// Builds the tree over `positions`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nalgebra::Point3;
    /// use cloudphinder::neighbors::NeighborIndex;
    ///
    /// let positions: Vec<Point3<f64>> = (0..10)
    ///     .map(|i| Point3::new(i as f64, 0.0, 0.0))
    ///     .collect();
    /// let index = NeighborIndex::build(&positions);
    /// let (indices, distances) = index.nearest(&positions[4], 3, 1e10);
    ///
    /// assert_eq!(indices, vec![4, 3, 5]);
    /// assert_eq!(distances, vec![0.0, 1.0, 1.0]);
    /// ```
    pub fn build(positions: &'a [Point3<f64>]) -> Self {
        let mut order: Vec<usize> = (0..positions.len()).collect();
        let mut nodes = Vec::with_capacity(2 * positions.len() / LEAF_SIZE + 1);
        let root = if positions.is_empty() {
            None
        } else {
            Some(Self::build_recursive(positions, &mut order, 0, &mut nodes))
        };
        NeighborIndex {
            positions,
            order,
            nodes,
            root,
        }
    }

    fn build_recursive(
        positions: &[Point3<f64>],
        order: &mut [usize],
        offset: usize,
        nodes: &mut Vec<KdNode>,
    ) -> NodeId {
        if order.len() <= LEAF_SIZE {
            let id = NodeId::new(nodes.len());
            nodes.push(KdNode::Leaf {
                start: offset as u32,
                end: (offset + order.len()) as u32,
            });
            return id;
        }

        // Split along the axis of largest spread
        let axis = (0..3)
            .map(|axis| {
                let (lo, hi) = order.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(positions[i][axis]), hi.max(positions[i][axis])),
                );
                (axis, hi - lo)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(axis, _)| axis);

        let mid = order.len() / 2;
        order.select_nth_unstable_by(mid, |&a, &b| {
            positions[a][axis].total_cmp(&positions[b][axis])
        });
        let value = positions[order[mid]][axis];

        let (left_slice, right_slice) = order.split_at_mut(mid);
        let left = Self::build_recursive(positions, left_slice, offset, nodes);
        let right = Self::build_recursive(positions, right_slice, offset + mid, nodes);

        let id = NodeId::new(nodes.len());
        nodes.push(KdNode::Split {
            axis,
            value,
            left,
            right,
        });
        id
    }

    /// Returns the number of indexed points
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Up to `k` nearest points to `target` no farther than `radius`, sorted
    /// by (distance, index). Returns parallel index and distance vectors.
    pub fn nearest(&self, target: &Point3<f64>, k: usize, radius: f64) -> (Vec<usize>, Vec<f64>) {
        let mut heap = BinaryHeap::with_capacity(k + 1);
        if let Some(root) = self.root {
            if k > 0 {
                self.nearest_recursive(root, target, k, radius * radius, &mut heap);
            }
        }
        let sorted = heap.into_sorted_vec();
        let indices = sorted.iter().map(|c| c.index).collect();
        let distances = sorted.iter().map(|c| c.dist_sq.sqrt()).collect();
        (indices, distances)
    }

    fn nearest_recursive(
        &self,
        node_id: NodeId,
        target: &Point3<f64>,
        k: usize,
        radius_sq: f64,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        match self.nodes[node_id.index()] {
            KdNode::Leaf { start, end } => {
                for &index in &self.order[start as usize..end as usize] {
                    let dist_sq = (self.positions[index] - *target).magnitude_squared();
                    if dist_sq > radius_sq {
                        continue;
                    }
                    let candidate = Candidate { dist_sq, index };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }

            KdNode::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = target[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.nearest_recursive(near, target, k, radius_sq, heap);

                // The far side can only help if the splitting plane is closer
                // than both the search radius and the current worst match
                let plane_sq = diff * diff;
                let worst_sq = if heap.len() < k {
                    radius_sq
                } else {
                    heap.peek().map_or(radius_sq, |c| c.dist_sq.min(radius_sq))
                };
                if plane_sq <= worst_sq {
                    self.nearest_recursive(far, target, k, radius_sq, heap);
                }
            }
        }
    }

    /// Queries every indexed point against the whole set.
    ///
    /// `k` is capped at the number of points. Fails with
    /// [`CloudError::DegenerateGeometry`] if any two points coincide.
    pub fn query_all(&self, k: usize, radius: f64) -> Result<NeighborTable> {
        let k = k.min(self.len());
        let lists: Vec<(Vec<usize>, Vec<f64>)> = self
            .positions
            .par_iter()
            .map(|p| self.nearest(p, k, radius))
            .collect();

        for (i, (indices, distances)) in lists.iter().enumerate() {
            if let Some(pos) = distances
                .iter()
                .zip(indices)
                .position(|(&d, &j)| d == 0.0 && j != i)
            {
                let j = indices[pos];
                return Err(CloudError::DegenerateGeometry {
                    first: i.min(j),
                    second: i.max(j),
                });
            }
        }

        let (indices, distances) = lists.into_iter().unzip();
        Ok(NeighborTable {
            k,
            indices,
            distances,
        })
    }
}

/// Per-particle neighbour lists.
///
/// List `i` starts with `i` itself at distance zero, followed by up to `k - 1`
/// neighbours in ascending distance. Slots beyond the search radius are
/// absent, so a list can be shorter than `k`.
#[derive(Debug, Clone)]
pub struct NeighborTable {
    k: usize,
    indices: Vec<Vec<usize>>,
    distances: Vec<Vec<f64>>,
}

impl NeighborTable {
    /// Builds a table from precomputed lists (e.g. from an external index).
    pub fn from_lists(k: usize, indices: Vec<Vec<usize>>, distances: Vec<Vec<f64>>) -> Result<Self> {
        if indices.len() != distances.len() {
            return Err(CloudError::invalid("neighbour index and distance lists differ in length"));
        }
        if let Some(i) = (0..indices.len())
            .find(|&i| indices[i].len() != distances[i].len() || indices[i].len() > k)
        {
            return Err(CloudError::invalid(format!("malformed neighbour list for particle {i}")));
        }
        if let Some(i) = (0..distances.len()).find(|&i| distances[i].windows(2).any(|w| !(w[0] <= w[1]))) {
            return Err(CloudError::invalid(format!(
                "neighbour list for particle {i} is not sorted by distance"
            )));
        }
        Ok(NeighborTable {
            k,
            indices,
            distances,
        })
    }

    /// Requested list length, self included
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Neighbours of `i` excluding `i` itself, nearest first
    pub fn neighbors(&self, i: usize) -> &[usize] {
        let list = &self.indices[i];
        match list.first() {
            Some(&first) if first == i => &list[1..],
            _ => list,
        }
    }

    /// Distances matching [`NeighborTable::neighbors`]
    pub fn distances(&self, i: usize) -> &[f64] {
        let offset = self.indices[i].len() - self.neighbors(i).len();
        &self.distances[i][offset..]
    }

    /// Number of neighbour slots left empty by the radius cap
    pub fn missing(&self, i: usize) -> usize {
        self.k.saturating_sub(1).saturating_sub(self.neighbors(i).len())
    }

    /// True if every one of the `k - 1` neighbour slots is out of range
    pub fn is_isolated(&self, i: usize) -> bool {
        self.neighbors(i).is_empty()
    }
}
