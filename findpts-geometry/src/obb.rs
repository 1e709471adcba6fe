use crate::AxisAlignedBoundingBox;
use findpts_traits::allocators::DimAllocator;
use findpts_traits::Real;
use nalgebra::{DefaultAllocator, DimName, OMatrix, OPoint, OVector};

/// An oriented bounding box.
///
/// The box is stored as the affine map `y = A (x - c)` together with an axis-aligned box in
/// the local `y` frame. A point `x` is contained in the oriented box if `A (x - c)` is
/// contained in the local box. The map need not be orthogonal: for finite elements, a natural
/// choice is the inverse Jacobian of the element map at the element centre, in which case the
/// local box is approximately `[-1, 1]^d`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedBoundingBox<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    center: OPoint<T, D>,
    transform: OMatrix<T, D, D>,
    local_bounds: AxisAlignedBoundingBox<T, D>,
}

impl<T, D> OrientedBoundingBox<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Constructs the tightest box in the frame `y = transform * (x - center)` containing all
    /// the given points.
    ///
    /// Returns `None` if there are no points.
    pub fn from_points_in_frame<'a>(
        center: OPoint<T, D>,
        transform: OMatrix<T, D, D>,
        points: impl IntoIterator<Item = &'a OPoint<T, D>>,
    ) -> Option<Self> {
        let local_points: Vec<_> = points
            .into_iter()
            .map(|x| OPoint::from(&transform * (x - &center)))
            .collect();
        let local_bounds = AxisAlignedBoundingBox::from_points(&local_points)?;
        Some(Self {
            center,
            transform,
            local_bounds,
        })
    }

    pub fn center(&self) -> &OPoint<T, D> {
        &self.center
    }

    pub fn transform(&self) -> &OMatrix<T, D, D> {
        &self.transform
    }

    pub fn local_bounds(&self) -> &AxisAlignedBoundingBox<T, D> {
        &self.local_bounds
    }

    /// Maps a point into the local frame of the box.
    pub fn to_local(&self, point: &OPoint<T, D>) -> OVector<T, D> {
        &self.transform * (point - &self.center)
    }

    pub fn contains_point(&self, point: &OPoint<T, D>) -> bool {
        self.local_bounds
            .contains_point(&OPoint::from(self.to_local(point)))
    }

    /// Grows the local box by `factor` times its largest local extent in all directions.
    pub fn grow_relative(&self, factor: T) -> Self {
        Self {
            center: self.center.clone(),
            transform: self.transform.clone(),
            local_bounds: self.local_bounds.grow_relative(factor),
        }
    }
}
