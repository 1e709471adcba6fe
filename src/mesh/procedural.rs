//! Basic procedural mesh generation routines.
//!
//! All meshes are conforming: nodes shared between neighboring elements are stored only once.
//! Nodes are identified through their index on the global (order-refined) node lattice, so
//! no floating-point comparisons are involved in merging them.
use crate::element::{Geometry, LagrangeElement};
use crate::lagrange::gauss_lobatto_points;
use crate::mesh::{LagrangeMesh2d, LagrangeMesh3d};
use findpts_traits::Real;
use nalgebra::{Point2, Point3};
use rustc_hash::FxHashMap;

// Counter-clockwise triangles splitting the unit square along its diagonal
const SQUARE_TRIANGLES: [[[usize; 2]; 3]; 2] = [[[0, 0], [1, 0], [1, 1]], [[0, 0], [1, 1], [0, 1]]];

// Kuhn (Freudenthal) decomposition of the unit cube: one tetrahedron per permutation of the axes
const AXIS_PERMUTATIONS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

struct NodeRegistry {
    nodes: FxHashMap<[usize; 3], usize>,
    keys: Vec<[usize; 3]>,
}

impl NodeRegistry {
    fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            keys: Vec::new(),
        }
    }

    fn node_index(&mut self, key: [usize; 3]) -> usize {
        let keys = &mut self.keys;
        *self.nodes.entry(key).or_insert_with(|| {
            keys.push(key);
            keys.len() - 1
        })
    }
}

/// Maps a lattice index to a coordinate.
///
/// Tensor elements place their nodes on a GLL grid in each cell, simplicial elements on an
/// equispaced grid.
fn lattice_coordinate<T: Real>(key: usize, order: usize, cell_size: T, gll: Option<&[f64]>) -> T {
    let p = order;
    let cell = T::from_usize(key / p).unwrap();
    let local = key % p;
    let local_coord = match gll {
        Some(points) => 0.5 * (points[local] + 1.0),
        None => local as f64 / p as f64,
    };
    (cell + T::from_f64(local_coord).unwrap()) * cell_size
}

/// Lattice keys of the nodes of a simplex with the given lattice vertices (in cell units).
fn simplex_node_key(order: usize, vertices: &[[usize; 3]], node: &[usize]) -> [usize; 3] {
    let p = order;
    let mut key = vertices[0].map(|v| p * v);
    for (a, &n_a) in node.iter().enumerate() {
        for d in 0..3 {
            // Vertices are corners of the same cell, so the difference may be negative
            let delta = vertices[a + 1][d] as isize - vertices[0][d] as isize;
            key[d] = (key[d] as isize + n_a as isize * delta) as usize;
        }
    }
    key
}

/// Creates a mesh of the unit square with `cells_per_dim^2` cells.
///
/// Each cell is a single square element, or two triangles for `Geometry::Triangle`.
///
/// # Panics
///
/// Panics if the geometry is not a square or triangle, or if the order is zero.
pub fn create_unit_square_lagrange_mesh_2d<T>(geometry: Geometry, order: usize, cells_per_dim: usize) -> LagrangeMesh2d<T>
where
    T: Real,
{
    assert!(
        matches!(geometry, Geometry::Square | Geometry::Triangle),
        "Geometry must be two-dimensional"
    );
    let element = LagrangeElement::new(geometry, order).expect("Order must be positive");
    let p = order;
    let h = T::one() / T::from_usize(cells_per_dim).unwrap();
    let mut registry = NodeRegistry::new();
    let mut connectivity = Vec::new();

    for cy in 0..cells_per_dim {
        for cx in 0..cells_per_dim {
            match geometry {
                Geometry::Square => {
                    for node in 0..element.num_nodes() {
                        let [i, j, _] = element.node_lattice_index(node);
                        connectivity.push(registry.node_index([cx * p + i, cy * p + j, 0]));
                    }
                }
                _ => {
                    for triangle in &SQUARE_TRIANGLES {
                        let vertices: Vec<[usize; 3]> = triangle.iter().map(|v| [cx + v[0], cy + v[1], 0]).collect();
                        for node in 0..element.num_nodes() {
                            let idx = element.node_lattice_index(node);
                            connectivity.push(registry.node_index(simplex_node_key(p, &vertices, &idx[..2])));
                        }
                    }
                }
            }
        }
    }

    let gll = gauss_lobatto_points(p + 1);
    let gll = geometry.is_tensor_product().then_some(gll.as_slice());
    let vertices = registry
        .keys
        .iter()
        .map(|key| Point2::new(lattice_coordinate(key[0], p, h, gll), lattice_coordinate(key[1], p, h, gll)))
        .collect();

    LagrangeMesh2d::from_vertices_and_connectivity(element, vertices, connectivity)
}

/// Creates a mesh of the unit cube with `cells_per_dim^3` cells.
///
/// Each cell is a single cube element, six tetrahedra (Kuhn decomposition) for
/// `Geometry::Tetrahedron` or two prisms for `Geometry::Prism`.
///
/// # Panics
///
/// Panics if the geometry is not a cube, tetrahedron or prism, or if the order is zero.
pub fn create_unit_box_lagrange_mesh_3d<T>(geometry: Geometry, order: usize, cells_per_dim: usize) -> LagrangeMesh3d<T>
where
    T: Real,
{
    assert!(
        matches!(geometry, Geometry::Cube | Geometry::Tetrahedron | Geometry::Prism),
        "Geometry must be a cube, tetrahedron or prism"
    );
    let element = LagrangeElement::new(geometry, order).expect("Order must be positive");
    let p = order;
    let h = T::one() / T::from_usize(cells_per_dim).unwrap();
    let mut registry = NodeRegistry::new();
    let mut connectivity = Vec::new();

    for cz in 0..cells_per_dim {
        for cy in 0..cells_per_dim {
            for cx in 0..cells_per_dim {
                let cell = [cx, cy, cz];
                match geometry {
                    Geometry::Cube => {
                        for node in 0..element.num_nodes() {
                            let idx = element.node_lattice_index(node);
                            let key = [0, 1, 2].map(|d| cell[d] * p + idx[d]);
                            connectivity.push(registry.node_index(key));
                        }
                    }
                    Geometry::Tetrahedron => {
                        for permutation in &AXIS_PERMUTATIONS {
                            let mut vertices = vec![cell];
                            let mut corner = cell;
                            for &axis in permutation {
                                corner[axis] += 1;
                                vertices.push(corner);
                            }
                            for node in 0..element.num_nodes() {
                                let idx = element.node_lattice_index(node);
                                connectivity.push(registry.node_index(simplex_node_key(p, &vertices, &idx)));
                            }
                        }
                    }
                    _ => {
                        for triangle in &SQUARE_TRIANGLES {
                            let vertices: Vec<[usize; 3]> =
                                triangle.iter().map(|v| [cx + v[0], cy + v[1], cz]).collect();
                            for node in 0..element.num_nodes() {
                                let idx = element.node_lattice_index(node);
                                let mut key = simplex_node_key(p, &vertices, &idx[..2]);
                                key[2] = cz * p + idx[2];
                                connectivity.push(registry.node_index(key));
                            }
                        }
                    }
                }
            }
        }
    }

    let gll = gauss_lobatto_points(p + 1);
    let gll = geometry.is_tensor_product().then_some(gll.as_slice());
    let vertices = registry
        .keys
        .iter()
        .map(|key| {
            Point3::new(
                lattice_coordinate(key[0], p, h, gll),
                lattice_coordinate(key[1], p, h, gll),
                lattice_coordinate(key[2], p, h, gll),
            )
        })
        .collect();

    LagrangeMesh3d::from_vertices_and_connectivity(element, vertices, connectivity)
}
