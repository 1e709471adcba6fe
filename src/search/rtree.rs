use findpts_geometry::AxisAlignedBoundingBox;
use findpts_traits::allocators::DimAllocator;
use findpts_traits::{to_f64, Real};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, OVector};
use rstar::primitives::GeomWithData;
use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};

/// An R-tree over element bounding boxes.
///
/// The tree is always stored in `f64`, regardless of the scalar type of the mesh.
pub(crate) struct RTreeAccelerationStructure<D: DimName>
where
    DefaultAllocator: Allocator<f64, D>,
{
    tree: RTree<GeomWithData<RTreeAABB<D>, usize>>,
}

#[derive(Debug, Clone, PartialEq)]
struct RTreePoint<D>(pub OPoint<f64, D>)
where
    D: DimName,
    DefaultAllocator: Allocator<f64, D>;

impl<D> rstar::Point for RTreePoint<D>
where
    D: DimName,
    DefaultAllocator: Allocator<f64, D>,
{
    type Scalar = f64;
    const DIMENSIONS: usize = D::USIZE;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        Self(OVector::<f64, D>::from_fn(|i, _| generator(i)).into())
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        self.0[index]
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        &mut self.0[index]
    }
}

struct RTreeAABB<D: DimName>(pub AxisAlignedBoundingBox<f64, D>)
where
    DefaultAllocator: Allocator<f64, D>;

impl<D: DimName> RTreeObject for RTreeAABB<D>
where
    DefaultAllocator: Allocator<f64, D>,
{
    type Envelope = AABB<RTreePoint<D>>;

    fn envelope(&self) -> Self::Envelope {
        let Self(aabb) = self;
        let box_min = aabb.min().clone();
        let box_max = aabb.max().clone();
        AABB::from_corners(RTreePoint(box_min.into()), RTreePoint(box_max.into()))
    }
}

impl<D: DimName> PointDistance for RTreeAABB<D>
where
    DefaultAllocator: Allocator<f64, D>,
{
    fn distance_2(&self, point: &RTreePoint<D>) -> <<Self::Envelope as Envelope>::Point as rstar::Point>::Scalar {
        self.0.dist2_to(&point.0)
    }

    fn contains_point(&self, point: &<Self::Envelope as Envelope>::Point) -> bool {
        self.0.contains_point(&point.0)
    }
}

impl<D: DimName> RTreeAccelerationStructure<D>
where
    DefaultAllocator: Allocator<f64, D>,
{
    /// Bulk-loads the tree. Box `i` is identified by index `i` in query results.
    pub fn from_bounding_boxes<T: Real>(boxes: &[AxisAlignedBoundingBox<T, D>]) -> Self
    where
        DefaultAllocator: DimAllocator<T, D>,
    {
        let geometries = boxes
            .iter()
            .enumerate()
            .map(|(i, bounding_box)| {
                let box_min = bounding_box.min().map(to_f64);
                let box_max = bounding_box.max().map(to_f64);
                let box_f64 = AxisAlignedBoundingBox::new(box_min, box_max);
                GeomWithData::new(RTreeAABB(box_f64), i)
            })
            .collect();
        let tree = RTree::bulk_load(geometries);
        Self { tree }
    }

    /// Indices of all boxes that contain the given point, in no particular order.
    pub fn boxes_containing_point<T: Real>(&self, point: &OPoint<T, D>) -> Vec<usize>
    where
        DefaultAllocator: DimAllocator<T, D>,
    {
        let point_f64: OPoint<f64, D> = point.map(to_f64);
        self.tree
            .locate_all_at_point(&RTreePoint(point_f64))
            .map(|geom| geom.data)
            .collect()
    }

    pub fn size(&self) -> usize {
        self.tree.size()
    }
}
