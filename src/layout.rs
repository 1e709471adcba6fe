//! Extraction of search-structure node data from a nodal space.
//!
//! The search structure works on tensor-product elements with nodes in lexicographic order.
//! An [`ElementLayout`] describes how the elements of a [`NodalSpace`] are turned into such
//! search elements, and how data flows between the two: node coordinates and field values in
//! one direction, matches (search element, reference coordinates) in the other.
use crate::error::SetupError;
use crate::mesh::NodalSpace;
use crate::split::ReferenceSplit;
use findpts_traits::allocators::DimAllocator;
use findpts_traits::Real;
use nalgebra::{DefaultAllocator, DimName, OPoint};

/// The correspondence between the elements of a nodal space and search elements.
pub trait ElementLayout<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Number of search elements generated by each element of the space.
    fn search_elements_per_element(&self) -> usize;

    /// Number of search-element nodes per dimension.
    fn nodes_per_dim(&self) -> usize;

    /// Total number of search elements.
    fn num_search_elements(&self) -> usize;

    /// Produces the flattened, dimension-major node array of all search elements.
    fn extract_node_coordinates(&self, space: &dyn NodalSpace<T, D>) -> Vec<T>;

    /// Produces the search-node values of a scalar field given by its values at the nodes of
    /// the space. The result is ordered like a single coordinate block of the node array.
    fn node_values(&self, values: &[T]) -> Vec<T>;

    /// Maps a search element and reference coordinates in `[-1, 1]^d` to the element of the
    /// space and its public reference coordinates.
    fn to_public(&self, search_element: usize, reference_coords: &OPoint<T, D>) -> (usize, OPoint<T, D>);
}

/// Layout for quadrilateral and hexahedral meshes: each element is one search element, with
/// its nodes permuted into lexicographic order through the dof map.
#[derive(Debug, Clone)]
pub struct TensorLayout {
    nodes_per_dim: usize,
    num_elements: usize,
    // gather[e * nodes_per_element + lex] is the global node at lexicographic position lex of element e
    gather: Vec<usize>,
}

impl TensorLayout {
    pub fn new<T, D, S>(space: &S) -> Result<Self, SetupError>
    where
        T: Real,
        D: DimName,
        S: NodalSpace<T, D> + ?Sized,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let num_elements = space.num_elements();
        let nodes_per_dim = space.order() + 1;
        let nodes_per_element = nodes_per_dim.pow(D::dim() as u32);
        let mut gather = Vec::with_capacity(num_elements * nodes_per_element);
        let mut element_nodes = Vec::new();

        for element in 0..num_elements {
            let dof_map = space
                .lexicographic_dof_map(element)
                .ok_or(SetupError::MissingDofMap)?;
            assert_eq!(
                dof_map.len(),
                nodes_per_element,
                "Dof map size does not match the polynomial order"
            );
            element_nodes.resize(space.element_node_count(element), 0);
            space.populate_element_nodes(&mut element_nodes, element);
            gather.extend(dof_map.iter().map(|&native| element_nodes[native]));
        }

        Ok(Self {
            nodes_per_dim,
            num_elements,
            gather,
        })
    }
}

impl<T, D> ElementLayout<T, D> for TensorLayout
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn search_elements_per_element(&self) -> usize {
        1
    }

    fn nodes_per_dim(&self) -> usize {
        self.nodes_per_dim
    }

    fn num_search_elements(&self) -> usize {
        self.num_elements
    }

    fn extract_node_coordinates(&self, space: &dyn NodalSpace<T, D>) -> Vec<T> {
        let vertices = space.vertices();
        let mut coordinates = Vec::with_capacity(D::dim() * self.gather.len());
        for axis in 0..D::dim() {
            coordinates.extend(self.gather.iter().map(|&node| vertices[node][axis]));
        }
        coordinates
    }

    fn node_values(&self, values: &[T]) -> Vec<T> {
        self.gather.iter().map(|&node| values[node]).collect()
    }

    fn to_public(&self, search_element: usize, reference_coords: &OPoint<T, D>) -> (usize, OPoint<T, D>) {
        let half = T::from_f64(0.5).unwrap();
        let xi = reference_coords.map(|r_i| half * (r_i + T::one()));
        (search_element, xi)
    }
}

/// Layout for triangle, tetrahedron and prism meshes: each element is split into
/// quadrilaterals or hexahedra, whose nodes are found by evaluating the element map at the
/// points of a [`ReferenceSplit`].
#[derive(Debug, Clone)]
pub struct SplitSimplexLayout<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    split: ReferenceSplit<T, D>,
    num_elements: usize,
    nodes_per_element: usize,
    // Row-major (split points x element nodes), shared by all elements of a single geometry and order
    basis_matrix: Vec<T>,
    connectivity: Vec<usize>,
}

impl<T, D> SplitSimplexLayout<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new<S>(space: &S) -> Result<Self, SetupError>
    where
        S: NodalSpace<T, D> + ?Sized,
    {
        let num_elements = space.num_elements();
        if num_elements == 0 {
            return Err(SetupError::EmptyMesh);
        }
        let split = ReferenceSplit::new(space.element_geometry(0), space.order())?;
        let nodes_per_element = space.element_node_count(0);

        let mut basis_matrix = vec![T::zero(); split.points().len() * nodes_per_element];
        for (row, point) in basis_matrix
            .chunks_exact_mut(nodes_per_element)
            .zip(split.points())
        {
            space.populate_element_basis(0, row, point);
        }

        let mut connectivity = vec![0; num_elements * nodes_per_element];
        for (element, nodes) in connectivity.chunks_exact_mut(nodes_per_element).enumerate() {
            assert_eq!(
                space.element_node_count(element),
                nodes_per_element,
                "All elements must have the same number of nodes"
            );
            space.populate_element_nodes(nodes, element);
        }

        Ok(Self {
            split,
            num_elements,
            nodes_per_element,
            basis_matrix,
            connectivity,
        })
    }

    pub fn split(&self) -> &ReferenceSplit<T, D> {
        &self.split
    }

    fn split_points_per_element(&self) -> usize {
        self.split.points().len()
    }

    /// Applies the basis matrix to per-node values of every element.
    fn evaluate_at_split_points(&self, mut node_value: impl FnMut(usize) -> T) -> Vec<T> {
        let mut output = Vec::with_capacity(self.num_elements * self.split_points_per_element());
        for nodes in self.connectivity.chunks_exact(self.nodes_per_element) {
            let element_values: Vec<T> = nodes.iter().map(|&node| node_value(node)).collect();
            for row in self.basis_matrix.chunks_exact(self.nodes_per_element) {
                let value = row
                    .iter()
                    .zip(&element_values)
                    .fold(T::zero(), |acc, (&phi, &u)| acc + phi * u);
                output.push(value);
            }
        }
        output
    }
}

impl<T, D> ElementLayout<T, D> for SplitSimplexLayout<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn search_elements_per_element(&self) -> usize {
        self.split.num_sub_elements()
    }

    fn nodes_per_dim(&self) -> usize {
        self.split.order() + 1
    }

    fn num_search_elements(&self) -> usize {
        self.num_elements * self.split.num_sub_elements()
    }

    fn extract_node_coordinates(&self, space: &dyn NodalSpace<T, D>) -> Vec<T> {
        let vertices = space.vertices();
        let mut coordinates = Vec::with_capacity(D::dim() * self.num_elements * self.split_points_per_element());
        for axis in 0..D::dim() {
            coordinates.extend(self.evaluate_at_split_points(|node| vertices[node][axis]));
        }
        coordinates
    }

    fn node_values(&self, values: &[T]) -> Vec<T> {
        self.evaluate_at_split_points(|node| values[node])
    }

    fn to_public(&self, search_element: usize, reference_coords: &OPoint<T, D>) -> (usize, OPoint<T, D>) {
        let num_sub_elements = self.split.num_sub_elements();
        let element = search_element / num_sub_elements;
        let sub_element = search_element % num_sub_elements;
        (element, self.split.map_to_parent(sub_element, reference_coords))
    }
}
