//! Splitting of simplicial reference elements into quadrilaterals and hexahedra.
//!
//! The search structure only handles tensor-product elements. Triangles are therefore split
//! into three quadrilaterals, tetrahedra into four hexahedra and prisms into three hexahedra.
//! Each sub-element is the image of `[-1, 1]^d` under a multilinear map whose corners are
//! given in parent reference coordinates. Vertices of a sub-element are listed
//! counter-clockwise, bottom face before top face for hexahedra.
use crate::element::Geometry;
use crate::error::SetupError;
use crate::lagrange::{gauss_lobatto_points, lexicographic_multi_index};
use findpts_traits::Real;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, OVector};

const THIRD: f64 = 1.0 / 3.0;

const TRIANGLE_VERTICES: &[[f64; 3]] = &[
    [0.0, 0.0, 0.0],
    [0.5, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 0.5, 0.0],
    [THIRD, THIRD, 0.0],
    [0.5, 0.5, 0.0],
    [0.0, 1.0, 0.0],
];

const TRIANGLE_SUB_ELEMENTS: &[&[usize]] = &[&[3, 4, 1, 0], &[4, 5, 2, 1], &[6, 5, 4, 3]];

const TETRAHEDRON_VERTICES: &[[f64; 3]] = &[
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.5, 0.0, 0.0],
    [0.5, 0.5, 0.0],
    [0.0, 0.5, 0.0],
    [0.0, 0.0, 0.5],
    [0.5, 0.0, 0.5],
    [0.0, 0.5, 0.5],
    [THIRD, 0.0, THIRD],
    [THIRD, THIRD, THIRD],
    [0.0, THIRD, THIRD],
    [THIRD, THIRD, 0.0],
    [0.25, 0.25, 0.25],
];

const TETRAHEDRON_SUB_ELEMENTS: &[&[usize]] = &[
    &[0, 4, 10, 7, 6, 13, 14, 12],
    &[4, 1, 8, 10, 13, 5, 11, 14],
    &[13, 5, 11, 14, 6, 2, 9, 12],
    &[10, 8, 3, 7, 14, 11, 9, 12],
];

const PRISM_VERTICES: &[[f64; 3]] = &[
    [0.0, 0.0, 0.0],
    [0.5, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 0.5, 0.0],
    [THIRD, THIRD, 0.0],
    [0.5, 0.5, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.5, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 0.5, 1.0],
    [THIRD, THIRD, 1.0],
    [0.5, 0.5, 1.0],
    [0.0, 1.0, 1.0],
];

const PRISM_SUB_ELEMENTS: &[&[usize]] = &[
    &[3, 4, 1, 0, 10, 11, 8, 7],
    &[4, 5, 2, 1, 11, 12, 9, 8],
    &[6, 5, 4, 3, 13, 12, 11, 10],
];

// Sub-element vertex of each lexicographic corner of [-1, 1]^d
const CORNER_TO_VERTEX: [usize; 8] = [0, 1, 3, 2, 4, 5, 7, 6];

/// Vertex and sub-element tables of the subdivision of a reference element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SplitTable {
    geometry: Geometry,
    vertices: &'static [[f64; 3]],
    sub_elements: &'static [&'static [usize]],
}

impl SplitTable {
    /// The subdivision table of the given geometry.
    ///
    /// Fails with [`SetupError::UnsupportedGeometry`] for geometries that are not triangles,
    /// tetrahedra or prisms.
    pub fn for_geometry(geometry: Geometry) -> Result<Self, SetupError> {
        let (vertices, sub_elements) = match geometry {
            Geometry::Triangle => (TRIANGLE_VERTICES, TRIANGLE_SUB_ELEMENTS),
            Geometry::Tetrahedron => (TETRAHEDRON_VERTICES, TETRAHEDRON_SUB_ELEMENTS),
            Geometry::Prism => (PRISM_VERTICES, PRISM_SUB_ELEMENTS),
            _ => return Err(SetupError::UnsupportedGeometry(geometry)),
        };
        Ok(Self {
            geometry,
            vertices,
            sub_elements,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_sub_elements(&self) -> usize {
        self.sub_elements.len()
    }

    /// Parent reference coordinates of the table vertices, padded with zeros to three components.
    pub fn vertices(&self) -> &'static [[f64; 3]] {
        self.vertices
    }

    /// Vertex indices of each sub-element.
    pub fn sub_elements(&self) -> &'static [&'static [usize]] {
        self.sub_elements
    }
}

/// The order-`p` curving of the split reference element.
///
/// Holds the parent reference coordinates of every node of every sub-element: for each
/// sub-element, the `(p + 1)^d` Gauss-Lobatto-Legendre grid of `[-1, 1]^d` in lexicographic
/// order mapped through the sub-element map.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSplit<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    table: SplitTable,
    order: usize,
    // Corner coordinates in parent reference space, per sub-element in lexicographic corner order
    corners: Vec<Vec<OPoint<T, D>>>,
    points: Vec<OPoint<T, D>>,
}

impl<T, D> ReferenceSplit<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    pub fn new(geometry: Geometry, order: usize) -> Result<Self, SetupError> {
        let table = SplitTable::for_geometry(geometry)?;
        if geometry.reference_dim() != D::dim() {
            return Err(SetupError::DimensionMismatch {
                reference_dim: geometry.reference_dim(),
                spatial_dim: D::dim(),
            });
        }
        if order == 0 {
            return Err(SetupError::InvalidOrder(order));
        }

        let dim = D::dim();
        let corners: Vec<Vec<OPoint<T, D>>> = table
            .sub_elements()
            .iter()
            .map(|sub_element| {
                (0..1 << dim)
                    .map(|corner| {
                        let vertex = table.vertices()[sub_element[CORNER_TO_VERTEX[corner]]];
                        OPoint::from(OVector::<T, D>::from_fn(|a, _| T::from_f64(vertex[a]).unwrap()))
                    })
                    .collect()
            })
            .collect();

        let n = order + 1;
        let gll: Vec<T> = gauss_lobatto_points(n)
            .into_iter()
            .map(|x| T::from_f64(x).unwrap())
            .collect();

        let mut split = Self {
            table,
            order,
            corners,
            points: Vec::new(),
        };
        let mut points = Vec::with_capacity(split.num_sub_elements() * n.pow(dim as u32));
        for sub_element in 0..split.num_sub_elements() {
            for lex in 0..n.pow(dim as u32) {
                let idx = lexicographic_multi_index(lex, n, dim);
                let r = OPoint::from(OVector::<T, D>::from_fn(|a, _| gll[idx[a]]));
                points.push(split.map_to_parent(sub_element, &r));
            }
        }
        split.points = points;
        Ok(split)
    }

    pub fn geometry(&self) -> Geometry {
        self.table.geometry()
    }

    pub fn table(&self) -> &SplitTable {
        &self.table
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_sub_elements(&self) -> usize {
        self.table.num_sub_elements()
    }

    pub fn nodes_per_sub_element(&self) -> usize {
        (self.order + 1).pow(D::dim() as u32)
    }

    /// Parent reference coordinates of all sub-element nodes, sub-element by sub-element.
    pub fn points(&self) -> &[OPoint<T, D>] {
        &self.points
    }

    /// Maps coordinates `r` in `[-1, 1]^d` of the given sub-element to parent reference
    /// coordinates.
    pub fn map_to_parent(&self, sub_element: usize, r: &OPoint<T, D>) -> OPoint<T, D> {
        let dim = D::dim();
        let half = T::from_f64(0.5).unwrap();
        let mut x = OPoint::origin();
        for (corner, vertex) in self.corners[sub_element].iter().enumerate() {
            let weight = (0..dim).fold(T::one(), |acc, a| {
                if corner & (1 << a) != 0 {
                    acc * half * (T::one() + r[a])
                } else {
                    acc * half * (T::one() - r[a])
                }
            });
            x.coords += &vertex.coords * weight;
        }
        x
    }
}
