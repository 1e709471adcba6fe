//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U1};

/// An allocator for a single (spatial) dimension.
///
/// Besides vectors and square matrices of `T`, this covers the `f64` copies used for
/// bounding volumes and the index vectors used by matrix decompositions.
pub trait DimAllocator<T: Scalar, D: DimName>:
    Allocator<T, D>
    + Allocator<T, D, D>
    + Allocator<T, U1, D>
    + Allocator<usize, D>
    + Allocator<(usize, usize), D>
    + Allocator<f64, D>
    + Allocator<f64, D, D>
    + Allocator<bool, D>
{
}

impl<T, D> DimAllocator<T, D> for DefaultAllocator
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>
        + Allocator<T, D, D>
        + Allocator<T, U1, D>
        + Allocator<usize, D>
        + Allocator<(usize, usize), D>
        + Allocator<f64, D>
        + Allocator<f64, D, D>
        + Allocator<bool, D>,
{
}
