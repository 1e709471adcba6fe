use crate::element::{Geometry, LagrangeElement};
use findpts_geometry::{AxisAlignedBoundingBox, BoundedGeometry};
use findpts_traits::Real;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, Scalar, U2, U3};

pub mod procedural;

/// A mesh together with a nodal (Lagrange) finite element space describing its geometry.
///
/// This is the interface through which [`FindPoints`](crate::find_points::FindPoints) reads
/// a mesh. The geometric map of element `e` is
/// `x(xi) = sum_k phi_k(xi) x_{nodes[k]}`, where `phi_k` are the element basis functions
/// evaluated by [`populate_element_basis`](Self::populate_element_basis) and `nodes` are the
/// global node indices of the element in native order.
pub trait NodalSpace<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn num_elements(&self) -> usize;

    fn num_nodes(&self) -> usize;

    fn element_geometry(&self, element_index: usize) -> Geometry;

    /// Polynomial order of the nodal basis.
    fn order(&self) -> usize;

    fn element_node_count(&self, element_index: usize) -> usize;

    /// Writes the global node indices of the element in native order to `nodes`.
    fn populate_element_nodes(&self, nodes: &mut [usize], element_index: usize);

    /// Positions of all nodes of the space.
    fn vertices(&self) -> &[OPoint<T, D>];

    /// Evaluates the element basis (native order) at the given public reference coordinates.
    fn populate_element_basis(&self, element_index: usize, basis_values: &mut [T], reference_coords: &OPoint<T, D>);

    /// The lexicographic dof map `lex -> native` of a tensor-product element, if available.
    fn lexicographic_dof_map(&self, element_index: usize) -> Option<&[usize]>;
}

/// A mesh of nodal Lagrange elements of a single geometry and order.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeMesh<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    element: LagrangeElement<T>,
    vertices: Vec<OPoint<T, D>>,
    // Flat connectivity, element_node_count entries per element
    connectivity: Vec<usize>,
}

pub type LagrangeMesh2d<T> = LagrangeMesh<T, U2>;
pub type LagrangeMesh3d<T> = LagrangeMesh<T, U3>;

impl<T, D> LagrangeMesh<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    /// Construct a mesh from nodes and flat connectivity.
    ///
    /// # Panics
    ///
    /// Panics if the connectivity length is not a multiple of the number of element nodes,
    /// or if the connectivity references nodes out of bounds.
    pub fn from_vertices_and_connectivity(
        element: LagrangeElement<T>,
        vertices: Vec<OPoint<T, D>>,
        connectivity: Vec<usize>,
    ) -> Self {
        let nodes_per_element = element.num_nodes();
        assert_eq!(
            connectivity.len() % nodes_per_element,
            0,
            "Connectivity length must be a multiple of the number of element nodes"
        );
        assert!(
            connectivity.iter().all(|&node| node < vertices.len()),
            "Connectivity references nodes out of bounds"
        );
        Self {
            element,
            vertices,
            connectivity,
        }
    }

    pub fn element(&self) -> &LagrangeElement<T> {
        &self.element
    }

    pub fn vertices_mut(&mut self) -> &mut [OPoint<T, D>] {
        &mut self.vertices
    }

    /// Global node indices of the given element (native order).
    pub fn element_connectivity(&self, element_index: usize) -> &[usize] {
        let n = self.element.num_nodes();
        &self.connectivity[n * element_index..n * (element_index + 1)]
    }

    /// Applies the given map to every node, yielding a curved mesh for non-affine maps.
    pub fn transform_vertices(&mut self, mut transformation: impl FnMut(&mut OPoint<T, D>)) {
        for v in &mut self.vertices {
            transformation(v);
        }
    }

    /// Maps public reference coordinates of the element to physical coordinates.
    pub fn map_element_reference_coords(&self, element_index: usize, reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        let mut basis = vec![T::zero(); self.element.num_nodes()];
        self.populate_element_basis(element_index, &mut basis, reference_coords);
        let mut x = OPoint::origin();
        for (phi, &node) in basis.iter().zip(self.element_connectivity(element_index)) {
            x.coords += &self.vertices[node].coords * *phi;
        }
        x
    }
}

impl<T, D> NodalSpace<T, D> for LagrangeMesh<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn num_elements(&self) -> usize {
        self.connectivity.len() / self.element.num_nodes()
    }

    fn num_nodes(&self) -> usize {
        self.vertices.len()
    }

    fn element_geometry(&self, _element_index: usize) -> Geometry {
        self.element.geometry()
    }

    fn order(&self) -> usize {
        self.element.order()
    }

    fn element_node_count(&self, _element_index: usize) -> usize {
        self.element.num_nodes()
    }

    fn populate_element_nodes(&self, nodes: &mut [usize], element_index: usize) {
        nodes.copy_from_slice(self.element_connectivity(element_index));
    }

    fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    fn populate_element_basis(&self, _element_index: usize, basis_values: &mut [T], reference_coords: &OPoint<T, D>) {
        self.element
            .populate_basis(basis_values, reference_coords.coords.as_slice());
    }

    fn lexicographic_dof_map(&self, _element_index: usize) -> Option<&[usize]> {
        self.element.lexicographic_dof_map()
    }
}

impl<T, D> BoundedGeometry<T> for LagrangeMesh<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    type Dimension = D;

    /// The bounding box of the mesh nodes.
    ///
    /// # Panics
    ///
    /// Panics if the mesh has no nodes.
    fn bounding_box(&self) -> AxisAlignedBoundingBox<T, D> {
        AxisAlignedBoundingBox::from_points(&self.vertices).expect("Mesh must have at least one node")
    }
}

/// A read-only view of a (possibly vector-valued) field given by its values at mesh nodes.
///
/// Values are stored component-major: component `c` of node `i` is at `c * num_nodes + i`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NodalField<'a, T> {
    values: &'a [T],
    num_components: usize,
}

impl<'a, T> NodalField<'a, T> {
    /// # Panics
    ///
    /// Panics if `num_components` is zero or does not divide the number of values.
    pub fn new(values: &'a [T], num_components: usize) -> Self {
        assert!(num_components > 0, "A field must have at least one component");
        assert_eq!(
            values.len() % num_components,
            0,
            "Number of values must be a multiple of the number of components"
        );
        Self { values, num_components }
    }

    pub fn scalar(values: &'a [T]) -> Self {
        Self::new(values, 1)
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn num_nodes(&self) -> usize {
        self.values.len() / self.num_components
    }

    pub fn values(&self) -> &'a [T] {
        self.values
    }

    /// Nodal values of a single component.
    pub fn component(&self, component: usize) -> &'a [T] {
        assert!(component < self.num_components, "Component index out of bounds");
        let n = self.num_nodes();
        &self.values[component * n..(component + 1) * n]
    }
}
