//! Reference geometries and nodal Lagrange elements.
//!
//! Public reference coordinates follow the usual conventions for each geometry: `[0, 1]^d`
//! for squares and cubes, the unit simplex `{xi_i >= 0, sum_i xi_i <= 1}` for triangles and
//! tetrahedra and the unit triangle times `[0, 1]` for prisms.
use crate::lagrange::{lexicographic_multi_index, LagrangeBasis1d};
use findpts_traits::Real;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// The geometry type of a reference element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geometry {
    Segment,
    Triangle,
    Square,
    Tetrahedron,
    Cube,
    Prism,
    Pyramid,
}

impl Geometry {
    pub fn reference_dim(&self) -> usize {
        match self {
            Geometry::Segment => 1,
            Geometry::Triangle | Geometry::Square => 2,
            Geometry::Tetrahedron | Geometry::Cube | Geometry::Prism | Geometry::Pyramid => 3,
        }
    }

    pub fn num_vertices(&self) -> usize {
        match self {
            Geometry::Segment => 2,
            Geometry::Triangle => 3,
            Geometry::Square => 4,
            Geometry::Tetrahedron => 4,
            Geometry::Cube => 8,
            Geometry::Prism => 6,
            Geometry::Pyramid => 5,
        }
    }

    /// Whether elements of this geometry are tensor products of 1D elements in two or three
    /// dimensions.
    pub fn is_tensor_product(&self) -> bool {
        matches!(self, Geometry::Square | Geometry::Cube)
    }

    /// Whether the reference element can be split into quadrilaterals or hexahedra.
    pub fn is_splittable(&self) -> bool {
        matches!(self, Geometry::Triangle | Geometry::Tetrahedron | Geometry::Prism)
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Geometry::Segment => "segment",
            Geometry::Triangle => "triangle",
            Geometry::Square => "square",
            Geometry::Tetrahedron => "tetrahedron",
            Geometry::Cube => "cube",
            Geometry::Prism => "prism",
            Geometry::Pyramid => "pyramid",
        };
        write!(f, "{}", name)
    }
}

/// A nodal Lagrange element of arbitrary order on a reference geometry.
///
/// Squares and cubes use Gauss-Lobatto-Legendre nodes in each direction. Their *native* node
/// order is topological: the vertices first (counter-clockwise, bottom face before top face
/// in 3D), followed by the nodes on edges, faces and the interior. The element provides the
/// lexicographic dof map `lex -> native` that relates the two orders.
///
/// Triangles, tetrahedra and prisms use equispaced nodes, enumerated lexicographically over
/// their lattice indices. They have no dof map.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeElement<T> {
    geometry: Geometry,
    order: usize,
    // Lattice index of each node in native order
    node_indices: Vec<[usize; 3]>,
    node_coords: Vec<[T; 3]>,
    dof_map: Option<Vec<usize>>,
    // GLL basis for tensor elements, equispaced basis (for the prism axis) otherwise
    basis: LagrangeBasis1d<T>,
}

impl<T: Real> LagrangeElement<T> {
    /// Constructs the Lagrange element of the given order on the given geometry.
    ///
    /// Returns `None` if the geometry is not supported or the order is zero.
    pub fn new(geometry: Geometry, order: usize) -> Option<Self> {
        if order == 0 {
            return None;
        }
        match geometry {
            Geometry::Square | Geometry::Cube => Some(Self::tensor(geometry, order)),
            Geometry::Triangle | Geometry::Tetrahedron | Geometry::Prism => Some(Self::simplex(geometry, order)),
            Geometry::Segment | Geometry::Pyramid => None,
        }
    }

    fn tensor(geometry: Geometry, order: usize) -> Self {
        let dim = geometry.reference_dim();
        let n = order + 1;
        let basis = LagrangeBasis1d::gauss_lobatto(n);
        let node_indices = tensor_native_order(dim, order);

        let mut dof_map = vec![0; n.pow(dim as u32)];
        for (native, idx) in node_indices.iter().enumerate() {
            let lex = idx[0] + n * idx[1] + n * n * idx[2];
            dof_map[lex] = native;
        }

        let half = T::from_f64(0.5).unwrap();
        let node_coords = node_indices
            .iter()
            .map(|idx| {
                let mut xi = [T::zero(); 3];
                for a in 0..dim {
                    xi[a] = half * (basis.nodes()[idx[a]] + T::one());
                }
                xi
            })
            .collect();

        Self {
            geometry,
            order,
            node_indices,
            node_coords,
            dof_map: Some(dof_map),
            basis,
        }
    }

    fn simplex(geometry: Geometry, order: usize) -> Self {
        let p = order;
        let mut node_indices = Vec::new();
        match geometry {
            Geometry::Triangle => {
                for j in 0..=p {
                    for i in 0..=(p - j) {
                        node_indices.push([i, j, 0]);
                    }
                }
            }
            Geometry::Tetrahedron => {
                for k in 0..=p {
                    for j in 0..=(p - k) {
                        for i in 0..=(p - j - k) {
                            node_indices.push([i, j, k]);
                        }
                    }
                }
            }
            Geometry::Prism => {
                for k in 0..=p {
                    for j in 0..=p {
                        for i in 0..=(p - j) {
                            node_indices.push([i, j, k]);
                        }
                    }
                }
            }
            _ => unreachable!("Not a simplicial geometry"),
        }

        let p_as_t = T::from_usize(p).unwrap();
        let node_coords = node_indices
            .iter()
            .map(|idx| idx.map(|i| T::from_usize(i).unwrap() / p_as_t))
            .collect();

        Self {
            geometry,
            order,
            node_indices,
            node_coords,
            dof_map: None,
            basis: LagrangeBasis1d::equispaced(p + 1),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn reference_dim(&self) -> usize {
        self.geometry.reference_dim()
    }

    pub fn num_nodes(&self) -> usize {
        self.node_indices.len()
    }

    /// Public reference coordinates of the given node (native order).
    pub fn node_reference_coords(&self, node: usize) -> &[T] {
        &self.node_coords[node][..self.reference_dim()]
    }

    /// Integer lattice index of the given node (native order).
    ///
    /// This is the tensor multi-index for squares and cubes and the index on the equispaced
    /// node lattice for simplicial elements.
    pub fn node_lattice_index(&self, node: usize) -> [usize; 3] {
        self.node_indices[node]
    }

    /// The map `lex -> native` from lexicographic tensor order to native node order.
    ///
    /// Only available for tensor-product elements.
    pub fn lexicographic_dof_map(&self) -> Option<&[usize]> {
        self.dof_map.as_deref()
    }

    /// Evaluates all basis functions (native order) at the given public reference coordinates.
    pub fn populate_basis(&self, basis_values: &mut [T], reference_coords: &[T]) {
        let dim = self.reference_dim();
        assert_eq!(basis_values.len(), self.num_nodes());
        assert_eq!(reference_coords.len(), dim);

        if self.geometry.is_tensor_product() {
            self.populate_tensor_basis(basis_values, reference_coords);
        } else {
            self.populate_simplex_basis(basis_values, reference_coords);
        }
    }

    fn populate_tensor_basis(&self, basis_values: &mut [T], xi: &[T]) {
        let dim = self.reference_dim();
        let n = self.order + 1;
        let two = T::from_f64(2.0).unwrap();
        let mut axis_values = vec![T::zero(); dim * n];
        for a in 0..dim {
            self.basis
                .populate_values(&mut axis_values[a * n..(a + 1) * n], two * xi[a] - T::one());
        }

        let dof_map = self.dof_map.as_ref().expect("Tensor elements always have a dof map");
        for (lex, &native) in dof_map.iter().enumerate() {
            let idx = lexicographic_multi_index(lex, n, dim);
            basis_values[native] = (0..dim).fold(T::one(), |acc, a| acc * axis_values[a * n + idx[a]]);
        }
    }

    fn populate_simplex_basis(&self, basis_values: &mut [T], xi: &[T]) {
        let p = self.order;
        let p_as_t = T::from_usize(p).unwrap();
        match self.geometry {
            Geometry::Triangle | Geometry::Tetrahedron => {
                let lambda0 = xi.iter().fold(T::one(), |acc, &x| acc - x);
                for (phi, idx) in basis_values.iter_mut().zip(&self.node_indices) {
                    let alpha0 = p - idx.iter().sum::<usize>();
                    let mut value = silvester(alpha0, p_as_t * lambda0);
                    for a in 0..xi.len() {
                        value *= silvester(idx[a], p_as_t * xi[a]);
                    }
                    *phi = value;
                }
            }
            Geometry::Prism => {
                let n = p + 1;
                let two = T::from_f64(2.0).unwrap();
                let mut z_values = vec![T::zero(); n];
                self.basis.populate_values(&mut z_values, two * xi[2] - T::one());
                let lambda0 = T::one() - xi[0] - xi[1];
                for (phi, idx) in basis_values.iter_mut().zip(&self.node_indices) {
                    let alpha0 = p - idx[0] - idx[1];
                    *phi = silvester(alpha0, p_as_t * lambda0)
                        * silvester(idx[0], p_as_t * xi[0])
                        * silvester(idx[1], p_as_t * xi[1])
                        * z_values[idx[2]];
                }
            }
            _ => unreachable!("Not a simplicial geometry"),
        }
    }
}

/// Silvester's polynomial `R_a(z) = prod_{m = 0}^{a - 1} (z - m) / (m + 1)`.
///
/// With `z = p lambda` for a barycentric coordinate `lambda`, products of these polynomials
/// give the equispaced Lagrange basis on simplices.
fn silvester<T: Real>(a: usize, z: T) -> T {
    (0..a).fold(T::one(), |acc, m| {
        let m = T::from_usize(m).unwrap();
        acc * (z - m) / (m + T::one())
    })
}

/// Multi-indices of the nodes of a tensor-product element in native (topological) order.
fn tensor_native_order(dim: usize, order: usize) -> Vec<[usize; 3]> {
    let p = order;
    let n = p + 1;
    let mut corners = vec![[0, 0, 0], [p, 0, 0], [p, p, 0], [0, p, 0]];
    if dim == 3 {
        corners.extend([[0, 0, p], [p, 0, p], [p, p, p], [0, p, p]]);
    }

    // 0: on the lower end, 1: interior, 2: on the upper end
    let class = |i: usize| {
        if i == 0 {
            0
        } else if i == p {
            2
        } else {
            1
        }
    };

    let mut others: Vec<[usize; 3]> = (0..n.pow(dim as u32))
        .map(|lex| lexicographic_multi_index(lex, n, dim))
        .filter(|idx| idx[..dim].iter().any(|&i| class(i) == 1))
        .collect();

    // Group nodes by entity dimension, then by entity, then lexicographically within the entity
    others.sort_by_key(|idx| {
        let entity_dim = idx[..dim].iter().filter(|&&i| class(i) == 1).count();
        let entity: Vec<usize> = idx[..dim].iter().rev().map(|&i| class(i)).collect();
        let within: Vec<usize> = idx[..dim].iter().rev().copied().collect();
        (entity_dim, entity, within)
    });

    corners.into_iter().chain(others).collect()
}
