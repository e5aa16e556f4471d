//! Arena-based Barnes-Hut octree for gravitational potentials.
//!
//! Nodes are stored contiguously in a `Vec` and reference each other by
//! index. Unlike a force tree built over a live body slice, this tree owns a
//! snapshot of its source points: a group keeps its tree across many later
//! queries while new members accumulate outside it.
//!
//! Source points are reordered during construction so that every leaf covers
//! a contiguous range of the point array.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Point3;
//! use cloudphinder::octree::{Octree, SourcePoint};
//!
//! let points = vec![
//!     SourcePoint::new(Point3::new(0.0, 0.0, 0.0), 1.0, 0.0),
//!     SourcePoint::new(Point3::new(1.0, 0.0, 0.0), 1.0, 0.0),
//! ];
//!
//! let tree = Octree::build(points);
//! let phi = tree.potential(Point3::new(10.0, 0.0, 0.0), 0.5);
//! assert!(phi < 0.0);
//! ```

use nalgebra::{Point3, Vector3};

use crate::potential::kernel_potential;

/// Tree depth at which remaining points share one leaf
const MAX_DEPTH: usize = 30;

/// A point mass with its softening length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourcePoint {
    pub position: Point3<f64>,
    pub mass: f64,
    /// Softening length; separations below it use the spline kernel
    pub softening: f64,
}

impl SourcePoint {
    pub fn new(position: Point3<f64>, mass: f64, softening: f64) -> Self {
        Self {
            position,
            mass,
            softening,
        }
    }

    /// Potential at `target` due to this point, with G = 1
    #[inline]
    pub fn potential_at(&self, target: Point3<f64>) -> f64 {
        let r = (self.position - target).magnitude();
        self.mass * kernel_potential(r, self.softening)
    }
}

/// An axis-aligned box in 3D space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Creates the smallest box that encloses all the given points.
    pub fn new_from_points(points: &[SourcePoint]) -> Self {
        points.iter().fold(
            Self {
                min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
                max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            },
            |bounds, p| Self {
                min: bounds.min.inf(&p.position),
                max: bounds.max.sup(&p.position),
            },
        )
    }

    fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Length of the box diagonal
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).magnitude()
    }

    /// Determines which octant (0-7) a point belongs to.
    ///
    /// Bit 0 is set above the center in x, bit 1 in y, bit 2 in z.
    fn octant(&self, point: &Point3<f64>) -> usize {
        let center = self.center();
        let x_bit = (point.x > center.x) as usize;
        let y_bit = (point.y > center.y) as usize;
        let z_bit = (point.z > center.z) as usize;
        x_bit | (y_bit << 1) | (z_bit << 2)
    }

    /// Creates the sub-box for the specified octant (0-7)
    fn subdivide(&self, octant: usize) -> Self {
        let center = self.center();
        let pick = |bit: usize, axis: usize| {
            if octant & bit != 0 {
                (center[axis], self.max[axis])
            } else {
                (self.min[axis], center[axis])
            }
        };
        let (x0, x1) = pick(1, 0);
        let (y0, y1) = pick(2, 1);
        let (z0, z1) = pick(4, 2);
        BoundingBox {
            min: Point3::new(x0, y0, z0),
            max: Point3::new(x1, y1, z1),
        }
    }
}

/// Index into the node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(u32);

impl NodeId {
    /// Sentinel value representing an empty octant
    pub const EMPTY: NodeId = NodeId(u32::MAX);

    fn new(index: usize) -> Self {
        debug_assert!(index < u32::MAX as usize, "NodeId overflow");
        NodeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

/// A node in the arena-based octree.
#[derive(Clone, Copy, Debug)]
pub enum Node {
    /// Single point (index into the reordered point array)
    Leaf { point: u32 },

    /// Several points at maximum depth, stored contiguously
    LeafMulti { start: u32, count: u32 },

    /// Region of space with aggregated monopole data
    Internal {
        center_of_mass: Point3<f64>,
        total_mass: f64,
        /// Largest softening length of any point below this node
        max_softening: f64,
        bounds: BoundingBox,
        children: [NodeId; 8],
    },
}

/// Barnes-Hut octree over an owned snapshot of source points.
#[derive(Clone, Debug)]
pub struct Octree {
    nodes: Vec<Node>,
    points: Vec<SourcePoint>,
    pub(crate) root: NodeId,
}

impl Octree {
    /// Builds an octree over the given points.
    pub fn build(points: Vec<SourcePoint>) -> Self {
        let bounds = BoundingBox::new_from_points(&points);
        let mut nodes = Vec::with_capacity(points.len() * 2);
        let mut ordered = Vec::with_capacity(points.len());
        let indices: Vec<usize> = (0..points.len()).collect();

        let root = Self::build_recursive(&points, &indices, bounds, 0, &mut nodes, &mut ordered);

        Octree {
            nodes,
            points: ordered,
            root,
        }
    }

    fn build_recursive(
        points: &[SourcePoint],
        indices: &[usize],
        bounds: BoundingBox,
        depth: usize,
        arena: &mut Vec<Node>,
        ordered: &mut Vec<SourcePoint>,
    ) -> NodeId {
        match indices {
            [] => NodeId::EMPTY,

            [single] => {
                let id = NodeId::new(arena.len());
                arena.push(Node::Leaf {
                    point: ordered.len() as u32,
                });
                ordered.push(points[*single]);
                id
            }

            _ if depth >= MAX_DEPTH => {
                let id = NodeId::new(arena.len());
                arena.push(Node::LeafMulti {
                    start: ordered.len() as u32,
                    count: indices.len() as u32,
                });
                ordered.extend(indices.iter().map(|&i| points[i]));
                id
            }

            indices => {
                let mut octants: [Vec<usize>; 8] = Default::default();
                for &i in indices {
                    octants[bounds.octant(&points[i].position)].push(i);
                }

                let children: [NodeId; 8] = std::array::from_fn(|q| {
                    Self::build_recursive(
                        points,
                        &octants[q],
                        bounds.subdivide(q),
                        depth + 1,
                        arena,
                        ordered,
                    )
                });

                let (total_mass, weighted_pos, max_softening) = indices.iter().fold(
                    (0.0f64, Vector3::zeros(), 0.0f64),
                    |(mass, pos, h), &i| {
                        let p = &points[i];
                        (mass + p.mass, pos + p.position.coords * p.mass, h.max(p.softening))
                    },
                );

                let id = NodeId::new(arena.len());
                arena.push(Node::Internal {
                    center_of_mass: Point3::from(weighted_pos / total_mass),
                    total_mass,
                    max_softening,
                    bounds,
                    children,
                });
                id
            }
        }
    }

    /// Gravitational potential at `pos` with G = 1.
    ///
    /// A node is replaced by its monopole when `diagonal / distance < theta`
    /// and the point lies outside every softening length inside it; otherwise
    /// the walk descends. Sources at exactly `pos` contribute nothing.
    pub fn potential(&self, pos: Point3<f64>, theta: f64) -> f64 {
        self.potential_recursive(self.root, pos, theta)
    }

    fn potential_recursive(&self, node_id: NodeId, pos: Point3<f64>, theta: f64) -> f64 {
        if node_id.is_empty() {
            return 0.0;
        }

        match &self.nodes[node_id.index()] {
            Node::Leaf { point } => self.points[*point as usize].potential_at(pos),

            Node::LeafMulti { start, count } => self.points
                [*start as usize..(*start + *count) as usize]
                .iter()
                .map(|p| p.potential_at(pos))
                .sum(),

            Node::Internal {
                center_of_mass,
                total_mass,
                max_softening,
                bounds,
                children,
            } => {
                let distance = (*center_of_mass - pos).magnitude();

                if distance > *max_softening && bounds.diagonal() < theta * distance {
                    -total_mass / distance
                } else {
                    children
                        .iter()
                        .map(|&child| self.potential_recursive(child, pos, theta))
                        .sum()
                }
            }
        }
    }

    /// Total mass held by the tree
    pub fn total_mass(&self) -> f64 {
        self.points.iter().map(|p| p.mass).sum()
    }

    /// Returns the number of source points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the number of nodes in the tree (for diagnostics)
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
