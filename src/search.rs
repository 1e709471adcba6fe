//! Spatial search over tensor-product elements given by their nodes.
//!
//! A [`SearchStructure`] is built from a flattened, dimension-major node array: all `x`
//! coordinates first, then all `y` coordinates, then all `z` coordinates. Each coordinate
//! block holds the nodes of every element in turn, in lexicographic order on the
//! Gauss-Lobatto-Legendre grid of `[-1, 1]^d`. Element maps, bounding volumes and point
//! location are all expressed in terms of this array.
use crate::find_points::FindPointsSettings;
use crate::lagrange::{apply_along_axes, lexicographic_multi_index, LagrangeBasis1d, TensorBasisEvaluation};
use crate::search::rtree::RTreeAccelerationStructure;
use findpts_geometry::{AxisAlignedBoundingBox, OrientedBoundingBox};
use findpts_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use findpts_optimize::newton::{box_constrained_newton, Bounds, NewtonSettings};
use findpts_traits::allocators::DimAllocator;
use findpts_traits::Real;
use itertools::Itertools;
use log::{debug, warn};
use nalgebra::{DMatrixViewMut, DVector, DVectorView, DVectorViewMut, DefaultAllocator, DimName, OMatrix, OPoint, OVector};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

mod rtree;

/// Outcome of locating a single point.
///
/// Codes are ordered by quality: `Inside < OnBoundary < NotFound`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LocationCode {
    /// The point lies inside an element (up to round-off).
    Inside,
    /// The point lies on the boundary of an element, within the extrapolation margin.
    OnBoundary,
    /// The point could not be located. The reported location is the closest approximation
    /// found, if any.
    NotFound,
}

/// Bounding data for a single element of a [`SearchStructure`].
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBounds<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    aabb: AxisAlignedBoundingBox<T, D>,
    obb: Option<OrientedBoundingBox<T, D>>,
    scale: T,
}

impl<T, D> ElementBounds<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// The inflated axis-aligned bounding box of the element. It encloses the whole element,
    /// not only its nodes.
    pub fn aabb(&self) -> &AxisAlignedBoundingBox<T, D> {
        &self.aabb
    }

    /// The inflated oriented bounding box of the element, unless its Jacobian at the element
    /// center is singular.
    pub fn obb(&self) -> Option<&OrientedBoundingBox<T, D>> {
        self.obb.as_ref()
    }

    /// A characteristic length of the element (the diagonal of the uninflated box around its
    /// control points).
    pub fn scale(&self) -> T {
        self.scale
    }

    pub fn contains_point(&self, point: &OPoint<T, D>) -> bool {
        self.aabb.contains_point(point) && self.obb.as_ref().map_or(true, |obb| obb.contains_point(point))
    }
}

/// The result of locating a point among the elements of a single [`SearchStructure`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMatch<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub code: LocationCode,
    pub element: usize,
    /// Reference coordinates in `[-1, 1]^d`, possibly extended by the extrapolation margin.
    pub reference_coords: OPoint<T, D>,
    /// Distance between the point and its image under the element map.
    pub distance: T,
}

impl<T, D> LocalMatch<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Orders matches by code, then distance, then element index.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.code
            .cmp(&other.code)
            .then_with(|| {
                self.distance
                    .partial_cmp(&other.distance)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| self.element.cmp(&other.element))
    }
}

/// Bounding volumes, an R-tree and element maps for a collection of tensor-product elements.
pub struct SearchStructure<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    nodes_per_dim: usize,
    num_elements: usize,
    coordinates: Vec<T>,
    basis: LagrangeBasis1d<T>,
    bounds: Vec<ElementBounds<T, D>>,
    tree: RTreeAccelerationStructure<D>,
    settings: FindPointsSettings<T>,
}

impl<T, D> SearchStructure<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Builds the search structure from a flattened, dimension-major node array.
    ///
    /// # Panics
    ///
    /// Panics if there are fewer than two nodes per dimension or if the length of
    /// `coordinates` is not a multiple of `D * nodes_per_dim^D`.
    pub fn new(coordinates: Vec<T>, nodes_per_dim: usize, settings: &FindPointsSettings<T>) -> Self {
        let dim = D::dim();
        assert!(nodes_per_dim >= 2, "Search elements need at least two nodes per dimension");
        let nodes_per_element = nodes_per_dim.pow(dim as u32);
        assert_eq!(
            coordinates.len() % (dim * nodes_per_element),
            0,
            "Node array length must be a multiple of the number of coordinates per element"
        );
        let num_elements = coordinates.len() / (dim * nodes_per_element);
        let basis = LagrangeBasis1d::gauss_lobatto(nodes_per_dim);

        let mut structure = Self {
            nodes_per_dim,
            num_elements,
            coordinates,
            basis,
            bounds: Vec::with_capacity(num_elements),
            // Replaced below, once the bounds are known
            tree: RTreeAccelerationStructure::from_bounding_boxes::<T>(&[]),
            settings: settings.clone(),
        };

        // Bounding volumes enclose the Bernstein control points of the element map
        let bernstein_matrix = structure.basis.bernstein_matrix();
        let bounds: Vec<_> = (0..num_elements)
            .map(|element| structure.compute_element_bounds(element, &bernstein_matrix))
            .collect();
        let boxes: Vec<_> = bounds.iter().map(|b| b.aabb.clone()).collect();
        structure.tree = RTreeAccelerationStructure::from_bounding_boxes(&boxes);
        structure.bounds = bounds;
        debug!(
            "Built search structure with {} elements ({} nodes per dimension, {} boxes in tree)",
            num_elements,
            nodes_per_dim,
            structure.tree.size()
        );
        structure
    }

    fn compute_element_bounds(&self, element: usize, bernstein_matrix: &[T]) -> ElementBounds<T, D> {
        let dim = D::dim();
        let n = self.nodes_per_dim;
        let inflation = self.settings.bounding_box_inflation;

        // The element map lies in the convex hull of its control points, so any box that
        // encloses them (in any affine frame) encloses the whole element
        let control_coords: Vec<Vec<T>> = (0..dim)
            .map(|axis| apply_along_axes(self.element_coordinates(element, axis), n, dim, bernstein_matrix))
            .collect();
        let control_points: Vec<OPoint<T, D>> = (0..self.nodes_per_element())
            .map(|i| OPoint::from(OVector::<T, D>::from_fn(|a, _| control_coords[a][i])))
            .collect();

        let aabb = AxisAlignedBoundingBox::from_points(&control_points).expect("Elements always have nodes");
        let scale = aabb.diameter();

        // Round-off in the control points grows with the magnitude of the coordinates
        let magnitude = control_points
            .iter()
            .flat_map(|p| p.coords.iter())
            .fold(aabb.max_extent(), |m, x| m.max(x.abs()));
        let padding = T::from_f64(1e4).expect("f64 must be convertible to T") * T::default_epsilon() * magnitude;
        let relative_padding = if aabb.max_extent() > T::zero() {
            padding / aabb.max_extent()
        } else {
            T::zero()
        };

        let origin = OPoint::<T, D>::origin();
        let center = self.map_reference_coords(element, &origin);
        let jacobian = self.reference_jacobian(element, &origin);
        let obb = match jacobian.try_inverse() {
            Some(inverse) => OrientedBoundingBox::from_points_in_frame(center, inverse, &control_points)
                .map(|obb| obb.grow_relative(inflation + relative_padding)),
            None => {
                warn!("Element {} has a singular Jacobian at its center", element);
                None
            }
        };

        ElementBounds {
            aabb: aabb.grow_relative(inflation).grow_uniformly(padding),
            obb,
            scale,
        }
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn nodes_per_dim(&self) -> usize {
        self.nodes_per_dim
    }

    pub fn nodes_per_element(&self) -> usize {
        self.nodes_per_dim.pow(D::dim() as u32)
    }

    /// The flattened, dimension-major node array.
    pub fn coordinates(&self) -> &[T] {
        &self.coordinates
    }

    pub fn element_bounds(&self, element: usize) -> &ElementBounds<T, D> {
        &self.bounds[element]
    }

    pub fn settings(&self) -> &FindPointsSettings<T> {
        &self.settings
    }

    /// The `axis` coordinates of all nodes of the given element, in lexicographic order.
    pub fn element_coordinates(&self, element: usize, axis: usize) -> &[T] {
        let npe = self.nodes_per_element();
        let offset = axis * self.num_elements * npe + element * npe;
        &self.coordinates[offset..offset + npe]
    }

    fn element_node(&self, element: usize, node: usize) -> OPoint<T, D> {
        OPoint::from(OVector::<T, D>::from_fn(|a, _| {
            self.element_coordinates(element, a)[node]
        }))
    }

    /// Maps reference coordinates in `[-1, 1]^d` to physical coordinates.
    pub fn map_reference_coords(&self, element: usize, reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        let mut evaluation = TensorBasisEvaluation::new(D::dim(), self.nodes_per_dim);
        evaluation.populate(&self.basis, reference_coords.coords.as_slice());
        OPoint::from(OVector::<T, D>::from_fn(|a, _| {
            evaluation.interpolate(self.element_coordinates(element, a))
        }))
    }

    /// The Jacobian `dx/dr` of the element map at the given reference coordinates.
    pub fn reference_jacobian(&self, element: usize, reference_coords: &OPoint<T, D>) -> OMatrix<T, D, D> {
        let dim = D::dim();
        let mut evaluation = TensorBasisEvaluation::new(dim, self.nodes_per_dim);
        evaluation.populate(&self.basis, reference_coords.coords.as_slice());
        let mut jacobian = OMatrix::<T, D, D>::zeros();
        let mut gradient = vec![T::zero(); dim];
        for a in 0..dim {
            evaluation.interpolate_with_gradient(self.element_coordinates(element, a), &mut gradient);
            for b in 0..dim {
                jacobian[(a, b)] = gradient[b];
            }
        }
        jacobian
    }

    /// Evaluates the element interpolant of the given node values (in the order of the node
    /// array, one scalar per node) at reference coordinates in `[-1, 1]^d`.
    pub fn evaluate(&self, node_values: &[T], element: usize, reference_coords: &OPoint<T, D>) -> T {
        let npe = self.nodes_per_element();
        assert_eq!(
            node_values.len(),
            self.num_elements * npe,
            "Node values must match the node array"
        );
        let mut evaluation = TensorBasisEvaluation::new(D::dim(), self.nodes_per_dim);
        evaluation.populate(&self.basis, reference_coords.coords.as_slice());
        evaluation.interpolate(&node_values[element * npe..(element + 1) * npe])
    }

    /// Candidate elements for the given point.
    ///
    /// These are the elements whose inflated bounding volumes contain the point, ordered by
    /// the distance from the point to the center of their bounding box (ties broken by element
    /// index) and truncated to the maximum number of candidates.
    pub fn candidates(&self, point: &OPoint<T, D>) -> Vec<usize> {
        self.tree
            .boxes_containing_point(point)
            .into_iter()
            .filter(|&element| self.bounds[element].contains_point(point))
            .map(|element| {
                let d2 = (self.bounds[element].aabb.center() - point).norm_squared();
                (d2, element)
            })
            .sorted_by(|(d2_a, a), (d2_b, b)| {
                d2_a.partial_cmp(d2_b)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.cmp(b))
            })
            .take(self.settings.max_candidates)
            .map(|(_, element)| element)
            .collect()
    }

    /// Locates the point among the elements of this structure.
    ///
    /// The first candidate that contains the point is returned. Otherwise, the best match by
    /// code, distance and element index is returned. Returns `None` if there are no candidates.
    pub fn locate(&self, point: &OPoint<T, D>) -> Option<LocalMatch<T, D>> {
        let mut best: Option<LocalMatch<T, D>> = None;
        for element in self.candidates(point) {
            let Some(candidate) = self.locate_in_element(element, point) else {
                continue;
            };
            if candidate.code == LocationCode::Inside {
                return Some(candidate);
            }
            let is_better = best
                .as_ref()
                .map_or(true, |best| candidate.compare(best) == Ordering::Less);
            if is_better {
                best = Some(candidate);
            }
        }
        best
    }

    /// Locates each of the given points, preserving order.
    #[cfg(not(feature = "rayon"))]
    pub fn locate_all(&self, points: &[OPoint<T, D>]) -> Vec<Option<LocalMatch<T, D>>> {
        points.iter().map(|point| self.locate(point)).collect()
    }

    /// Locates each of the given points in parallel, preserving order.
    #[cfg(feature = "rayon")]
    pub fn locate_all(&self, points: &[OPoint<T, D>]) -> Vec<Option<LocalMatch<T, D>>>
    where
        Self: Sync,
        OPoint<T, D>: Send + Sync,
    {
        use rayon::prelude::*;
        points.par_iter().map(|point| self.locate(point)).collect()
    }

    /// Inverts the element map for the given point with a box-constrained Newton method.
    ///
    /// Returns `None` if the iteration breaks down.
    pub fn locate_in_element(&self, element: usize, point: &OPoint<T, D>) -> Option<LocalMatch<T, D>> {
        let settings = &self.settings;
        let tolerance = settings.newton_tolerance;
        let residual_tolerance = self.residual_tolerance(element, point);
        let one = T::one();
        let margin = settings.extrapolation_margin;

        let initial_guess = self.closest_node_reference_coords(element, point);
        let mut r = DVector::from_column_slice(initial_guess.coords.as_slice());
        let residual = ElementMapResidual::new(self, element, point);
        let newton_settings = NewtonSettings {
            max_iterations: Some(settings.max_newton_iterations),
            tolerance: residual_tolerance,
            step_tolerance: tolerance,
        };

        let result = match box_constrained_newton(residual, &mut r, Bounds::new(-one - margin, one + margin), newton_settings) {
            Ok(result) => result,
            Err(err) => {
                debug!("Newton iteration failed in element {}: {}", element, err);
                return None;
            }
        };

        let code = if result.residual_norm > residual_tolerance {
            debug!(
                "Point not found in element {} after {} iterations ({:?}), residual {}",
                element, result.iterations, result.termination, result.residual_norm
            );
            LocationCode::NotFound
        } else if r.iter().all(|r_i| r_i.abs() <= one + tolerance) {
            LocationCode::Inside
        } else {
            LocationCode::OnBoundary
        };

        Some(LocalMatch {
            code,
            element,
            reference_coords: OPoint::from(OVector::<T, D>::from_fn(|a, _| r[a])),
            distance: result.residual_norm,
        })
    }

    /// The residual below which the element map is considered to hit the point.
    ///
    /// This is the Newton tolerance relative to the element scale, plus a round-off allowance
    /// relative to the magnitude of the point's coordinates, so that meshes far from the
    /// origin are treated like meshes near it.
    pub fn residual_tolerance(&self, element: usize, point: &OPoint<T, D>) -> T {
        let magnitude = point
            .coords
            .iter()
            .fold(T::zero(), |m, x| m.max(x.abs()));
        let round_off = T::from_f64(1e3).expect("f64 must be convertible to T") * T::default_epsilon();
        let tolerance = self.settings.newton_tolerance * self.bounds[element].scale + round_off * magnitude;
        tolerance.max(T::default_epsilon())
    }

    fn closest_node_reference_coords(&self, element: usize, point: &OPoint<T, D>) -> OPoint<T, D> {
        let dim = D::dim();
        let n = self.nodes_per_dim;
        let closest = (0..self.nodes_per_element())
            .map(|node| (node, (self.element_node(element, node) - point).norm_squared()))
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .map(|(node, _)| node)
            .unwrap_or(0);
        let idx = lexicographic_multi_index(closest, n, dim);
        OPoint::from(OVector::<T, D>::from_fn(|a, _| self.basis.nodes()[idx[a]]))
    }
}

/// The residual `F(r) = x(r) - x*` of the element map for a fixed target point `x*`.
struct ElementMapResidual<'a, T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    search: &'a SearchStructure<T, D>,
    element: usize,
    target: &'a OPoint<T, D>,
    evaluation: TensorBasisEvaluation<T>,
    reference_coords: Vec<T>,
    gradient: Vec<T>,
}

impl<'a, T, D> ElementMapResidual<'a, T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn new(search: &'a SearchStructure<T, D>, element: usize, target: &'a OPoint<T, D>) -> Self {
        let dim = D::dim();
        Self {
            search,
            element,
            target,
            evaluation: TensorBasisEvaluation::new(dim, search.nodes_per_dim),
            reference_coords: vec![T::zero(); dim],
            gradient: vec![T::zero(); dim],
        }
    }

    fn populate(&mut self, r: &DVectorView<T>) {
        for (r_i, &value) in self.reference_coords.iter_mut().zip(r.iter()) {
            *r_i = value;
        }
        self.evaluation
            .populate(&self.search.basis, &self.reference_coords);
    }
}

impl<'a, T, D> VectorFunction<T> for ElementMapResidual<'a, T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn dimension(&self) -> usize {
        D::dim()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, r: &DVectorView<T>) {
        self.populate(r);
        for a in 0..D::dim() {
            let x_a = self
                .evaluation
                .interpolate(self.search.element_coordinates(self.element, a));
            f[a] = x_a - self.target[a];
        }
    }
}

impl<'a, T, D> DifferentiableVectorFunction<T> for ElementMapResidual<'a, T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn jacobian_into(&mut self, jacobian: &mut DMatrixViewMut<T>, r: &DVectorView<T>) {
        self.populate(r);
        for a in 0..D::dim() {
            self.evaluation.interpolate_with_gradient(
                self.search.element_coordinates(self.element, a),
                &mut self.gradient,
            );
            for b in 0..D::dim() {
                jacobian[(a, b)] = self.gradient[b];
            }
        }
    }
}
