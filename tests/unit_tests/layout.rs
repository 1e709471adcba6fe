use crate::ModifiedSpace;
use findpts::element::Geometry;
use findpts::error::SetupError;
use findpts::find_points::FindPointsSettings;
use findpts::layout::{ElementLayout, SplitSimplexLayout, TensorLayout};
use findpts::mesh::procedural::{create_unit_box_lagrange_mesh_3d, create_unit_square_lagrange_mesh_2d};
use findpts::mesh::{LagrangeMesh2d, LagrangeMesh3d, NodalSpace};
use findpts::search::SearchStructure;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Point2, Point3, U2, U3};
use std::f64::consts::PI;

/// Checks that every search element reproduces the map of its parent element.
fn assert_consistent_with_mesh_2d(layout: &dyn ElementLayout<f64, U2>, mesh: &LagrangeMesh2d<f64>) {
    let coordinates = layout.extract_node_coordinates(mesh);
    assert_eq!(
        coordinates.len(),
        2 * layout.num_search_elements() * layout.nodes_per_dim().pow(2)
    );
    let search = SearchStructure::new(coordinates, layout.nodes_per_dim(), &FindPointsSettings::default());
    let reference_points = [[-1.0, -1.0], [0.3, -0.2], [0.9, 0.7], [-0.5, 1.0]].map(Point2::from);
    for search_element in 0..layout.num_search_elements() {
        for r in &reference_points {
            let (element, xi) = layout.to_public(search_element, r);
            let expected = mesh.map_element_reference_coords(element, &xi);
            let x = search.map_reference_coords(search_element, r);
            assert_matrix_eq!(x.coords, expected.coords, comp = abs, tol = 1e-12);
        }
    }
}

fn assert_consistent_with_mesh_3d(layout: &dyn ElementLayout<f64, U3>, mesh: &LagrangeMesh3d<f64>) {
    let coordinates = layout.extract_node_coordinates(mesh);
    assert_eq!(
        coordinates.len(),
        3 * layout.num_search_elements() * layout.nodes_per_dim().pow(3)
    );
    let search = SearchStructure::new(coordinates, layout.nodes_per_dim(), &FindPointsSettings::default());
    let reference_points = [[-1.0, -1.0, -1.0], [0.3, -0.2, 0.5], [0.9, 0.7, -0.8]].map(Point3::from);
    for search_element in 0..layout.num_search_elements() {
        for r in &reference_points {
            let (element, xi) = layout.to_public(search_element, r);
            let expected = mesh.map_element_reference_coords(element, &xi);
            let x = search.map_reference_coords(search_element, r);
            assert_matrix_eq!(x.coords, expected.coords, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn tensor_layout_reproduces_curved_quadrilaterals() {
    let mut mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Square, 4, 2);
    mesh.transform_vertices(|v| {
        let (x, y) = (v.x, v.y);
        v.x += 0.05 * (PI * y).sin();
        v.y += 0.05 * (PI * x).sin();
    });
    let layout = TensorLayout::new(&mesh).unwrap();
    assert_eq!(ElementLayout::<f64, U2>::search_elements_per_element(&layout), 1);
    assert_eq!(ElementLayout::<f64, U2>::num_search_elements(&layout), 4);
    assert_consistent_with_mesh_2d(&layout, &mesh);
}

#[test]
fn tensor_layout_reproduces_curved_hexahedra() {
    let mut mesh = create_unit_box_lagrange_mesh_3d::<f64>(Geometry::Cube, 3, 2);
    mesh.transform_vertices(|v| {
        let (x, y, z) = (v.x, v.y, v.z);
        v.x += 0.05 * (PI * y).sin() * (PI * z).sin();
        v.z += 0.05 * (PI * x).sin();
    });
    let layout = TensorLayout::new(&mesh).unwrap();
    assert_consistent_with_mesh_3d(&layout, &mesh);
}

#[test]
fn tensor_layout_public_coordinates() {
    let mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Square, 2, 1);
    let layout = TensorLayout::new(&mesh).unwrap();
    let (element, xi) = ElementLayout::<f64, U2>::to_public(&layout, 0, &Point2::new(-1.0, 0.5));
    assert_eq!(element, 0);
    assert_matrix_eq!(xi.coords, Point2::new(0.0, 0.75).coords, comp = abs, tol = 1e-15);
}

#[test]
fn tensor_layout_requires_dof_map() {
    let mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Square, 2, 1);
    let space = ModifiedSpace::new(&mesh).without_dof_map();
    assert_eq!(TensorLayout::new(&space).unwrap_err(), SetupError::MissingDofMap);
}

#[test]
fn split_layout_reproduces_affine_simplices() {
    for p in 1..4 {
        let mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Triangle, p, 2);
        let layout = SplitSimplexLayout::new(&mesh).unwrap();
        assert_eq!(layout.search_elements_per_element(), 3);
        assert_eq!(layout.num_search_elements(), 3 * mesh.num_elements());
        assert_eq!(layout.nodes_per_dim(), p + 1);
        assert_consistent_with_mesh_2d(&layout, &mesh);
    }

    for geometry in [Geometry::Tetrahedron, Geometry::Prism] {
        let mesh = create_unit_box_lagrange_mesh_3d::<f64>(geometry, 2, 1);
        let layout = SplitSimplexLayout::new(&mesh).unwrap();
        let expected_splits = if geometry == Geometry::Prism { 3 } else { 4 };
        assert_eq!(layout.search_elements_per_element(), expected_splits);
        assert_consistent_with_mesh_3d(&layout, &mesh);
    }
}

#[test]
fn split_layout_public_coordinates_identify_parent() {
    let mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Triangle, 2, 1);
    let layout = SplitSimplexLayout::new(&mesh).unwrap();
    // Search element 4 is the second sub-element of the second triangle
    let r = Point2::new(0.2, -0.3);
    let (element, xi) = layout.to_public(4, &r);
    assert_eq!(element, 1);
    assert_matrix_eq!(xi.coords, layout.split().map_to_parent(1, &r).coords, comp = abs, tol = 1e-15);
}

#[test]
fn node_values_follow_node_array_order() {
    let mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Triangle, 2, 2);
    let layout = SplitSimplexLayout::new(&mesh).unwrap();
    let coordinates = layout.extract_node_coordinates(&mesh);
    let n = coordinates.len() / 2;

    // u = x y lies in the space of the mesh
    let u: Vec<f64> = mesh.vertices().iter().map(|v| v.x * v.y).collect();
    let values = layout.node_values(&u);
    assert_eq!(values.len(), n);
    for i in 0..n {
        assert_scalar_eq!(values[i], coordinates[i] * coordinates[n + i], comp = abs, tol = 1e-14);
    }
}

#[test]
fn split_layout_rejects_tensor_mesh() {
    let mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Square, 2, 1);
    assert_eq!(
        SplitSimplexLayout::new(&mesh).unwrap_err(),
        SetupError::UnsupportedGeometry(Geometry::Square)
    );
}
