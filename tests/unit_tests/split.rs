use findpts::element::Geometry;
use findpts::error::SetupError;
use findpts::split::{ReferenceSplit, SplitTable};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Point2, Point3, U2, U3};

#[test]
fn split_table_sizes() {
    let sizes = |geometry| {
        let table = SplitTable::for_geometry(geometry).unwrap();
        (table.num_vertices(), table.num_sub_elements())
    };
    assert_eq!(sizes(Geometry::Triangle), (7, 3));
    assert_eq!(sizes(Geometry::Tetrahedron), (15, 4));
    assert_eq!(sizes(Geometry::Prism), (14, 3));
}

#[test]
fn split_table_rejects_tensor_and_pyramid_geometries() {
    for geometry in [Geometry::Square, Geometry::Cube, Geometry::Pyramid, Geometry::Segment] {
        assert_eq!(
            SplitTable::for_geometry(geometry),
            Err(SetupError::UnsupportedGeometry(geometry))
        );
    }
}

#[test]
fn sub_element_count_is_independent_of_order() {
    for p in 1..6 {
        let triangle = ReferenceSplit::<f64, U2>::new(Geometry::Triangle, p).unwrap();
        assert_eq!(triangle.num_sub_elements(), 3);
        assert_eq!(triangle.table().num_vertices(), 7);
        assert_eq!(triangle.nodes_per_sub_element(), (p + 1).pow(2));
        assert_eq!(triangle.points().len(), 3 * (p + 1).pow(2));

        let tet = ReferenceSplit::<f64, U3>::new(Geometry::Tetrahedron, p).unwrap();
        assert_eq!(tet.num_sub_elements(), 4);
        assert_eq!(tet.points().len(), 4 * (p + 1).pow(3));

        let prism = ReferenceSplit::<f64, U3>::new(Geometry::Prism, p).unwrap();
        assert_eq!(prism.num_sub_elements(), 3);
        assert_eq!(prism.points().len(), 3 * (p + 1).pow(3));
    }
}

#[test]
fn reference_split_rejects_invalid_configurations() {
    assert_eq!(
        ReferenceSplit::<f64, U2>::new(Geometry::Tetrahedron, 2),
        Err(SetupError::DimensionMismatch {
            reference_dim: 3,
            spatial_dim: 2
        })
    );
    assert_eq!(
        ReferenceSplit::<f64, U2>::new(Geometry::Triangle, 0),
        Err(SetupError::InvalidOrder(0))
    );
    assert_eq!(
        ReferenceSplit::<f64, U2>::new(Geometry::Square, 2),
        Err(SetupError::UnsupportedGeometry(Geometry::Square))
    );
}

#[test]
fn triangle_sub_elements_tile_the_reference_triangle() {
    let split = ReferenceSplit::<f64, U2>::new(Geometry::Triangle, 1).unwrap();
    let corners = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]].map(Point2::from);

    let mut total_area = 0.0;
    for sub_element in 0..split.num_sub_elements() {
        let mapped: Vec<_> = corners
            .iter()
            .map(|r| split.map_to_parent(sub_element, r))
            .collect();
        // Shoelace formula, the quadrilaterals are straight-sided
        let area: f64 = (0..4)
            .map(|i| {
                let (a, b) = (&mapped[i], &mapped[(i + 1) % 4]);
                0.5 * (a.x * b.y - b.x * a.y)
            })
            .sum();
        assert!(area.abs() > 0.1);
        total_area += area.abs();
    }
    assert_scalar_eq!(total_area, 0.5, comp = abs, tol = 1e-14);
}

#[test]
fn sub_element_centers_and_corners_map_into_parent_simplex() {
    let split = ReferenceSplit::<f64, U3>::new(Geometry::Tetrahedron, 2).unwrap();
    for sub_element in 0..split.num_sub_elements() {
        let center = split.map_to_parent(sub_element, &Point3::origin());
        assert!(center.iter().all(|&x| x > 0.0));
        assert!(center.x + center.y + center.z < 1.0);
    }

    // The first sub-element touches the origin vertex of the tetrahedron
    let corner = split.map_to_parent(0, &Point3::new(-1.0, -1.0, -1.0));
    assert_matrix_eq!(corner.coords, Point3::<f64>::origin().coords, comp = abs, tol = 1e-15);

    for point in split.points() {
        assert!(point.iter().all(|&x| x >= -1e-14));
        assert!(point.x + point.y + point.z <= 1.0 + 1e-14);
    }
}

#[test]
fn prism_split_points_lie_in_prism() {
    let split = ReferenceSplit::<f64, U3>::new(Geometry::Prism, 3).unwrap();
    for point in split.points() {
        assert!(point.iter().all(|&x| x >= -1e-14));
        assert!(point.x + point.y <= 1.0 + 1e-14);
        assert!(point.z <= 1.0 + 1e-14);
    }
}
