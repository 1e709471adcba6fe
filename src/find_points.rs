//! Point location and field interpolation on (possibly distributed) high-order meshes.
use crate::comm::Communicator;
use crate::element::Geometry;
use crate::error::SetupError;
use crate::layout::{ElementLayout, SplitSimplexLayout, TensorLayout};
use crate::mesh::{NodalField, NodalSpace};
use crate::search::{LocalMatch, LocationCode, SearchStructure};
use findpts_traits::allocators::DimAllocator;
use findpts_traits::{from_f64, to_f64, Real};
use log::{debug, info};
use nalgebra::{DVector, DefaultAllocator, DimName, OPoint, OVector};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Tuning parameters for point location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Real + Deserialize<'de>"))]
pub struct FindPointsSettings<T> {
    /// Relative amount by which element bounding boxes are grown, in terms of their largest
    /// extent.
    pub bounding_box_inflation: T,
    /// Newton tolerance. Residuals are measured relative to the element size.
    pub newton_tolerance: T,
    /// Maximum number of candidate elements examined per point.
    pub max_candidates: usize,
    pub max_newton_iterations: usize,
    /// How far outside `[-1, 1]` (in reference coordinates) a point may lie and still be
    /// reported as on the boundary of an element.
    pub extrapolation_margin: T,
}

impl<T: Real> Default for FindPointsSettings<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            bounding_box_inflation: 0.1,
            newton_tolerance: 1e-12,
            max_candidates: 256,
            max_newton_iterations: 50,
            extrapolation_margin: 1e-6,
        }
    }
}

/// The location of a single query point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLocation<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub code: LocationCode,
    /// Rank of the process owning the element.
    pub process: usize,
    /// Index of the element on its owning process, or `None` if no candidate element exists.
    pub element: Option<usize>,
    /// Public reference coordinates of the point in its element.
    pub reference_coords: OPoint<T, D>,
    /// Distance between the point and the image of its reference coordinates.
    pub distance: T,
    // Search element and [-1, 1]^d coordinates on the owning process
    search_match: Option<(usize, OPoint<T, D>)>,
}

impl<T, D> PointLocation<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn unresolved(process: usize) -> Self {
        Self {
            code: LocationCode::NotFound,
            process,
            element: None,
            reference_coords: OPoint::origin(),
            distance: T::from_f64(f64::MAX).unwrap(),
            search_match: None,
        }
    }

    /// Whether the point was found inside or on the boundary of an element.
    pub fn is_found(&self) -> bool {
        self.code != LocationCode::NotFound
    }
}

/// Locations of a batch of query points, in query order.
#[derive(Debug, Clone, PartialEq)]
pub struct FindPointsResult<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    locations: Vec<PointLocation<T, D>>,
}

impl<T, D> FindPointsResult<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn locations(&self) -> &[PointLocation<T, D>] {
        &self.locations
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointLocation<T, D>> {
        self.locations.iter()
    }

    pub fn codes(&self) -> Vec<LocationCode> {
        self.locations.iter().map(|location| location.code).collect()
    }

    pub fn num_found(&self) -> usize {
        self.locations.iter().filter(|location| location.is_found()).count()
    }
}

impl<T, D> std::ops::Index<usize> for FindPointsResult<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    type Output = PointLocation<T, D>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.locations[index]
    }
}

struct SetupState<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    geometry: Geometry,
    num_nodes: usize,
    layout: Box<dyn ElementLayout<T, D>>,
    search: SearchStructure<T, D>,
}

/// Locates points in a mesh distributed over the processes of a communicator, and
/// interpolates fields at the located points.
///
/// Every process holds its own part of the mesh. [`find_points`](Self::find_points) and
/// [`interpolate`](Self::interpolate) are collective: all processes of the communicator must
/// call them together, each with its own (possibly empty) batch of points.
pub struct FindPoints<T, D, C>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    communicator: C,
    state: Option<SetupState<T, D>>,
}

impl<T, D, C> FindPoints<T, D, C>
where
    T: Real,
    D: DimName,
    C: Communicator,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(communicator: C) -> Self {
        Self {
            communicator,
            state: None,
        }
    }

    pub fn communicator(&self) -> &C {
        &self.communicator
    }

    pub fn is_set_up(&self) -> bool {
        self.state.is_some()
    }

    /// The search structure over the local mesh, if set up.
    pub fn search_structure(&self) -> Option<&SearchStructure<T, D>> {
        self.state.as_ref().map(|state| &state.search)
    }

    /// Builds the search structure for the local part of the mesh.
    ///
    /// All elements must share a single geometry, which is either a square/cube or a
    /// triangle/tetrahedron/prism, of the same dimension as the space.
    pub fn setup(&mut self, space: &dyn NodalSpace<T, D>, settings: &FindPointsSettings<T>) -> Result<(), SetupError> {
        if self.state.is_some() {
            return Err(SetupError::AlreadySetUp);
        }
        if space.num_elements() == 0 || space.num_nodes() == 0 {
            return Err(SetupError::EmptyMesh);
        }

        let geometry = space.element_geometry(0);
        if let Some(other) = (1..space.num_elements())
            .map(|element| space.element_geometry(element))
            .find(|&other| other != geometry)
        {
            return Err(SetupError::MixedGeometry { first: geometry, other });
        }
        if !geometry.is_tensor_product() && !geometry.is_splittable() {
            return Err(SetupError::UnsupportedGeometry(geometry));
        }
        if space.order() == 0 {
            return Err(SetupError::InvalidOrder(space.order()));
        }
        if geometry.reference_dim() != D::dim() {
            return Err(SetupError::DimensionMismatch {
                reference_dim: geometry.reference_dim(),
                spatial_dim: D::dim(),
            });
        }

        let layout: Box<dyn ElementLayout<T, D>> = if geometry.is_tensor_product() {
            Box::new(TensorLayout::new(space)?)
        } else {
            Box::new(SplitSimplexLayout::new(space)?)
        };
        let coordinates = layout.extract_node_coordinates(space);
        let search = SearchStructure::new(coordinates, layout.nodes_per_dim(), settings);

        info!(
            "Point location set up on rank {}: {} {} elements of order {} ({} search elements)",
            self.communicator.rank(),
            space.num_elements(),
            geometry,
            space.order(),
            search.num_elements()
        );

        self.state = Some(SetupState {
            geometry,
            num_nodes: space.num_nodes(),
            layout,
            search,
        });
        Ok(())
    }

    /// Releases the search structure. The instance may then be set up again.
    pub fn free_data(&mut self) {
        self.state = None;
    }

    /// The geometry of the elements of the mesh, if set up.
    pub fn geometry(&self) -> Option<Geometry> {
        self.state.as_ref().map(|state| state.geometry)
    }

    fn state(&self) -> &SetupState<T, D> {
        self.state
            .as_ref()
            .expect("FindPoints must be set up before points can be located or interpolated")
    }
}

// Point location may run in parallel over the points
impl<T, D, C> FindPoints<T, D, C>
where
    T: Real,
    D: DimName,
    C: Communicator,
    DefaultAllocator: DimAllocator<T, D>,
    SearchStructure<T, D>: Sync,
    OPoint<T, D>: Send + Sync,
{
    /// Locates the given points in the distributed mesh.
    ///
    /// Among all processes, the best match is chosen by location code, then distance, then
    /// lowest rank.
    ///
    /// # Panics
    ///
    /// Panics if the instance is not set up.
    pub fn find_points(&self, points: &[OPoint<T, D>]) -> FindPointsResult<T, D> {
        let state = self.state();
        let dim = D::dim();
        let rank = self.communicator.rank();

        let send_points: Vec<f64> = points
            .iter()
            .flat_map(|point| point.coords.iter().map(|&x| to_f64(x)))
            .collect();
        let gathered_points = self.communicator.all_gather_varcount(&send_points);
        let all_points: Vec<OPoint<T, D>> = gathered_points
            .iter()
            .flat_map(|buffer| buffer.chunks_exact(dim))
            .map(|coords| OPoint::from(OVector::<T, D>::from_fn(|a, _| from_f64(coords[a]))))
            .collect();

        let matches = state.search.locate_all(&all_points);
        let mut records = Vec::with_capacity(matches.len() * record_len(dim));
        for local_match in &matches {
            MatchRecord::encode(local_match.as_ref(), state.layout.as_ref(), &mut records);
        }
        let gathered_records = self.communicator.all_gather_varcount(&records);

        let offset: usize = gathered_points[..rank]
            .iter()
            .map(|buffer| buffer.len() / dim)
            .sum();
        let locations = (0..points.len())
            .map(|i| {
                let mut best: Option<(usize, MatchRecord<T, D>)> = None;
                for (process, process_records) in gathered_records.iter().enumerate() {
                    let Some(record) = MatchRecord::<T, D>::decode(process_records, offset + i) else {
                        continue;
                    };
                    let is_better = best
                        .as_ref()
                        .map_or(true, |(_, best)| record.compare(best) == Ordering::Less);
                    if is_better {
                        best = Some((process, record));
                    }
                }
                match best {
                    Some((process, record)) => record.into_location(process),
                    None => PointLocation::unresolved(rank),
                }
            })
            .collect();

        let result = FindPointsResult { locations };
        debug!(
            "Located {} of {} points on rank {}",
            result.num_found(),
            result.len(),
            rank
        );
        result
    }

    /// Locates points given as a dimension-major coordinate array: all `x` coordinates, then
    /// all `y` coordinates, then all `z` coordinates.
    ///
    /// # Panics
    ///
    /// Panics if the length of `coordinates` is not a multiple of the dimension, or if the
    /// instance is not set up.
    pub fn find_points_dimension_major(&self, coordinates: &[T]) -> FindPointsResult<T, D> {
        let dim = D::dim();
        assert_eq!(
            coordinates.len() % dim,
            0,
            "Coordinate array length {} is not a multiple of the dimension {}",
            coordinates.len(),
            dim
        );
        let num_points = coordinates.len() / dim;
        let points: Vec<OPoint<T, D>> = (0..num_points)
            .map(|i| OPoint::from(OVector::<T, D>::from_fn(|a, _| coordinates[a * num_points + i])))
            .collect();
        self.find_points(&points)
    }
}

impl<T, D, C> FindPoints<T, D, C>
where
    T: Real,
    D: DimName,
    C: Communicator,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Interpolates a nodal field at previously located points.
    ///
    /// The output is component-major: component `c` at point `i` is stored at
    /// `c * result.len() + i`. Points that were not matched to any element yield zero.
    ///
    /// # Panics
    ///
    /// Panics if the instance is not set up, or if the field is not defined on the nodes of
    /// the local mesh.
    pub fn interpolate(&self, result: &FindPointsResult<T, D>, field: &NodalField<T>) -> DVector<T> {
        let state = self.state();
        let dim = D::dim();
        let rank = self.communicator.rank();
        let num_points = result.len();
        let num_components = field.num_components();
        assert_eq!(
            field.num_nodes(),
            state.num_nodes,
            "Field must have one value per node of the mesh"
        );

        // Request: [owner, search element, reference coords, point index]
        let request_len = 3 + dim;
        let mut requests = Vec::new();
        for (i, location) in result.iter().enumerate() {
            if let Some((search_element, r)) = &location.search_match {
                requests.push(location.process as f64);
                requests.push(*search_element as f64);
                requests.extend(r.coords.iter().map(|&r_i| to_f64(r_i)));
                requests.push(i as f64);
            }
        }
        let gathered_requests = self.communicator.all_gather_varcount(&requests);

        // Contribution: [origin, point index, values of all components]
        let mut component_values: Option<Vec<Vec<T>>> = None;
        let mut contributions = Vec::new();
        for (origin, process_requests) in gathered_requests.iter().enumerate() {
            for request in process_requests.chunks_exact(request_len) {
                if request[0] as usize != rank {
                    continue;
                }
                let values = component_values.get_or_insert_with(|| {
                    (0..num_components)
                        .map(|c| state.layout.node_values(field.component(c)))
                        .collect()
                });
                let search_element = request[1] as usize;
                let r = OPoint::from(OVector::<T, D>::from_fn(|a, _| from_f64(request[2 + a])));
                contributions.push(origin as f64);
                contributions.push(request[2 + dim]);
                for node_values in values.iter() {
                    let value = state.search.evaluate(node_values, search_element, &r);
                    contributions.push(to_f64(value));
                }
            }
        }
        let gathered_contributions = self.communicator.all_gather_varcount(&contributions);

        let mut output = DVector::zeros(num_components * num_points);
        for contribution in gathered_contributions
            .iter()
            .flat_map(|buffer| buffer.chunks_exact(2 + num_components))
        {
            if contribution[0] as usize != rank {
                continue;
            }
            let i = contribution[1] as usize;
            for c in 0..num_components {
                output[c * num_points + i] += from_f64::<T>(contribution[2 + c]);
            }
        }
        output
    }
}

/// A local match as exchanged between processes.
///
/// Encoded as `[code, search element, element, r, xi, distance]`, where `r` are coordinates
/// in `[-1, 1]^d` of the search element and `xi` the public reference coordinates of the
/// element. Points without any candidate have search element `-1`.
struct MatchRecord<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    code: LocationCode,
    search_element: usize,
    element: usize,
    search_coords: OPoint<T, D>,
    reference_coords: OPoint<T, D>,
    distance: f64,
}

impl<T, D> MatchRecord<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn encode(local_match: Option<&LocalMatch<T, D>>, layout: &dyn ElementLayout<T, D>, buffer: &mut Vec<f64>) {
        let dim = D::dim();
        match local_match {
            Some(local_match) => {
                let (element, xi) = layout.to_public(local_match.element, &local_match.reference_coords);
                buffer.push(encode_code(local_match.code));
                buffer.push(local_match.element as f64);
                buffer.push(element as f64);
                buffer.extend(local_match.reference_coords.iter().map(|&r| to_f64(r)));
                buffer.extend(xi.iter().map(|&x| to_f64(x)));
                buffer.push(to_f64(local_match.distance));
            }
            None => {
                buffer.push(encode_code(LocationCode::NotFound));
                buffer.push(-1.0);
                buffer.push(-1.0);
                buffer.extend(std::iter::repeat(0.0).take(2 * dim));
                buffer.push(f64::MAX);
            }
        }
    }

    fn decode(buffer: &[f64], index: usize) -> Option<Self> {
        let dim = D::dim();
        let len = record_len(dim);
        let record = &buffer[index * len..(index + 1) * len];
        if record[1] < 0.0 {
            return None;
        }
        Some(Self {
            code: decode_code(record[0]),
            search_element: record[1] as usize,
            element: record[2] as usize,
            search_coords: OPoint::from(OVector::<T, D>::from_fn(|a, _| from_f64(record[3 + a]))),
            reference_coords: OPoint::from(OVector::<T, D>::from_fn(|a, _| from_f64(record[3 + dim + a]))),
            distance: record[3 + 2 * dim],
        })
    }

    /// Orders records by code, then distance.
    fn compare(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code).then_with(|| {
            self.distance
                .partial_cmp(&other.distance)
                .unwrap_or(Ordering::Equal)
        })
    }

    fn into_location(self, process: usize) -> PointLocation<T, D> {
        PointLocation {
            code: self.code,
            process,
            element: Some(self.element),
            reference_coords: self.reference_coords,
            distance: from_f64(self.distance),
            search_match: Some((self.search_element, self.search_coords)),
        }
    }
}

fn record_len(dim: usize) -> usize {
    4 + 2 * dim
}

fn encode_code(code: LocationCode) -> f64 {
    match code {
        LocationCode::Inside => 0.0,
        LocationCode::OnBoundary => 1.0,
        LocationCode::NotFound => 2.0,
    }
}

fn decode_code(value: f64) -> LocationCode {
    match value as usize {
        0 => LocationCode::Inside,
        1 => LocationCode::OnBoundary,
        _ => LocationCode::NotFound,
    }
}
