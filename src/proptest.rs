//! Proptest strategies for points and reference coordinates.
use crate::element::Geometry;
use ::proptest::prelude::*;
use nalgebra::{Point2, Point3};

/// Points strictly inside the unit square, at least `margin` away from its boundary.
pub fn point_in_unit_square(margin: f64) -> impl Strategy<Value = Point2<f64>> {
    let range = margin..(1.0 - margin);
    [range.clone(), range].prop_map(|[x, y]| Point2::new(x, y))
}

/// Points strictly inside the unit cube, at least `margin` away from its boundary.
pub fn point_in_unit_cube(margin: f64) -> impl Strategy<Value = Point3<f64>> {
    let range = margin..(1.0 - margin);
    [range.clone(), range.clone(), range].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Public reference coordinates strictly inside the reference element of the given geometry.
///
/// Unused trailing components are zero.
///
/// # Panics
///
/// Panics if the geometry is a segment or pyramid.
pub fn reference_point(geometry: Geometry) -> impl Strategy<Value = [f64; 3]> {
    let margin = 1e-3;
    let unit = margin..(1.0 - margin);
    let coords = [unit.clone(), unit.clone(), unit];
    coords.prop_map(move |[a, b, c]| match geometry {
        Geometry::Square => [a, b, 0.0],
        Geometry::Cube => [a, b, c],
        // Scale the square into the triangle, keeping the point away from the hypotenuse
        Geometry::Triangle => [a * (1.0 - b) * (1.0 - margin), b, 0.0],
        Geometry::Prism => [a * (1.0 - b) * (1.0 - margin), b, c],
        Geometry::Tetrahedron => {
            let y = b * (1.0 - c);
            [a * (1.0 - y - c) * (1.0 - margin), y, c]
        }
        Geometry::Segment | Geometry::Pyramid => panic!("No reference points for {} elements", geometry),
    })
}

/// Geometries supported by point location, paired with small orders.
pub fn supported_geometry_and_order() -> impl Strategy<Value = (Geometry, usize)> {
    let geometry = prop_oneof![
        Just(Geometry::Square),
        Just(Geometry::Cube),
        Just(Geometry::Triangle),
        Just(Geometry::Tetrahedron),
        Just(Geometry::Prism)
    ];
    (geometry, 1..=4usize)
}
