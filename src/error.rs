//! Errors reported when configuring point location on a mesh.
use crate::element::Geometry;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// A mesh or space that cannot be used for point location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// The mesh has no elements or no nodes.
    EmptyMesh,
    /// Only squares, cubes, triangles, tetrahedra and prisms are supported.
    UnsupportedGeometry(Geometry),
    /// All elements must share the same geometry.
    MixedGeometry { first: Geometry, other: Geometry },
    /// The polynomial order must be at least one.
    InvalidOrder(usize),
    /// The reference dimension of the elements does not match the spatial dimension.
    DimensionMismatch { reference_dim: usize, spatial_dim: usize },
    /// Tensor-product elements must provide a lexicographic dof map.
    MissingDofMap,
    /// `setup` was called on an instance that is already set up.
    AlreadySetUp,
}

impl Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            SetupError::EmptyMesh => write!(f, "Mesh nodes are required, but the mesh has no elements or nodes."),
            SetupError::UnsupportedGeometry(geometry) => {
                write!(f, "Element type {} is not supported for point location.", geometry)
            }
            SetupError::MixedGeometry { first, other } => write!(
                f,
                "Mixed meshes are not supported: found {} elements after {} elements.",
                other, first
            ),
            SetupError::InvalidOrder(order) => write!(f, "Invalid polynomial order {}.", order),
            SetupError::DimensionMismatch {
                reference_dim,
                spatial_dim,
            } => write!(
                f,
                "Elements of reference dimension {} cannot be located in {}-dimensional space.",
                reference_dim, spatial_dim
            ),
            SetupError::MissingDofMap => write!(f, "Tensor basis element without lexicographic dof map."),
            SetupError::AlreadySetUp => write!(f, "Already set up. Free the existing data first."),
        }
    }
}

impl Error for SetupError {}
