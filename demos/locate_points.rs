//! Locates points in a curved high-order mesh and interpolates a field at them.
//!
//! Usage: `locate_points [settings.json]`. The optional JSON file may override any of the
//! point location settings.
use eyre::eyre;
use findpts::comm::SerialCommunicator;
use findpts::element::Geometry;
use findpts::find_points::{FindPoints, FindPointsSettings};
use findpts::mesh::procedural::create_unit_box_lagrange_mesh_3d;
use findpts::mesh::{NodalField, NodalSpace};
use findpts::search::LocationCode;
use log::info;
use nalgebra::{Point3, U3};
use std::f64::consts::PI;
use std::fs;

fn field(p: &Point3<f64>) -> f64 {
    (PI * p.x).sin() * p.y + p.z * p.z
}

fn main() -> eyre::Result<()> {
    env_logger::init();

    let settings: FindPointsSettings<f64> = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&fs::read_to_string(&path)?)?,
        None => FindPointsSettings::default(),
    };
    info!("Settings: {:?}", settings);

    let mut mesh = create_unit_box_lagrange_mesh_3d::<f64>(Geometry::Tetrahedron, 4, 4);
    mesh.transform_vertices(|v| {
        let (x, y) = (v.x, v.y);
        v.z += 0.05 * (PI * x).sin() * (PI * y).sin() * v.z;
    });

    let mut find_points = FindPoints::<f64, U3, _>::new(SerialCommunicator);
    find_points.setup(&mesh, &settings)?;

    // Points on a regular grid, some of which lie above the curved top face
    let n = 12;
    let points: Vec<_> = (0..n * n * n)
        .map(|i| {
            let [a, b, c] = [i % n, (i / n) % n, i / (n * n)];
            let h = 1.0 / (n - 1) as f64;
            Point3::new(a as f64 * h, b as f64 * h, 1.05 * c as f64 * h)
        })
        .collect();
    let result = find_points.find_points(&points);

    let count = |code| result.iter().filter(|location| location.code == code).count();
    println!(
        "{} points: {} inside, {} on boundary, {} not found",
        result.len(),
        count(LocationCode::Inside),
        count(LocationCode::OnBoundary),
        count(LocationCode::NotFound)
    );
    if result.num_found() == 0 {
        return Err(eyre!("No points were located"));
    }

    let values: Vec<f64> = mesh.vertices().iter().map(field).collect();
    let interpolated = find_points.interpolate(&result, &NodalField::scalar(&values));
    let max_error = result
        .iter()
        .zip(&points)
        .enumerate()
        .filter(|(_, (location, _))| location.code == LocationCode::Inside)
        .map(|(i, (_, point))| (interpolated[i] - field(point)).abs())
        .fold(0.0, f64::max);
    println!("Maximum interpolation error at interior points: {:e}", max_error);

    find_points.free_data();
    Ok(())
}
