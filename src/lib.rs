//! Point location and field interpolation on high-order, curved finite element meshes.
//!
//! [`FindPoints`](find_points::FindPoints) builds a spatial search structure over the
//! elements of a [`NodalSpace`](mesh::NodalSpace), locates arbitrary physical points in it
//! (element, reference coordinates and owning process) and interpolates nodal fields at the
//! located points.
pub mod comm;
pub mod element;
pub mod error;
pub mod find_points;
pub mod lagrange;
pub mod layout;
pub mod mesh;
pub mod search;
pub mod split;

pub mod geometry {
    pub use findpts_geometry::*;
}

pub mod optimize {
    pub use findpts_optimize::*;
}

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub use findpts_traits::Real;

pub extern crate nalgebra;
