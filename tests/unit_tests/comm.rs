use findpts::comm::{Communicator, SerialCommunicator, ThreadCommunicator};
use findpts::element::Geometry;
use findpts::find_points::{FindPoints, FindPointsResult, FindPointsSettings};
use findpts::mesh::procedural::create_unit_square_lagrange_mesh_2d;
use findpts::mesh::{LagrangeMesh2d, NodalField, NodalSpace};
use findpts::search::LocationCode;
use matrixcompare::assert_scalar_eq;
use nalgebra::{DVector, Point2, U2};
use std::thread;

/// Runs `f` on every member of a group of communicating threads, returning results by rank.
fn run_on_threads<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(ThreadCommunicator) -> R + Sync,
{
    let f = &f;
    thread::scope(|scope| {
        let handles: Vec<_> = ThreadCommunicator::create_group(size)
            .into_iter()
            .map(|comm| scope.spawn(move || f(comm)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    })
}

/// The part of a curved unit square mesh owned by the given rank: rank 0 owns `x < 0.5` and
/// rank 1 owns `x > 0.5`.
fn half_domain_mesh(geometry: Geometry, rank: usize) -> LagrangeMesh2d<f64> {
    let mut mesh = create_unit_square_lagrange_mesh_2d::<f64>(geometry, 3, 2);
    mesh.transform_vertices(|v| {
        v.x = 0.5 * v.x + 0.5 * rank as f64;
        v.y += 0.03 * (4.0 * v.x).sin() * v.y * (1.0 - v.y);
    });
    mesh
}

fn locate_and_interpolate(
    comm: ThreadCommunicator,
    mesh: &LagrangeMesh2d<f64>,
    points: &[Point2<f64>],
) -> (FindPointsResult<f64, U2>, DVector<f64>) {
    let mut find_points = FindPoints::<f64, U2, _>::new(comm);
    find_points
        .setup(mesh, &FindPointsSettings::default())
        .unwrap();
    let result = find_points.find_points(points);
    let values: Vec<f64> = mesh.vertices().iter().map(|v| v.x + 2.0 * v.y).collect();
    let interpolated = find_points.interpolate(&result, &NodalField::scalar(&values));
    (result, interpolated)
}

#[test]
fn serial_communicator_gathers_own_buffer() {
    let comm = SerialCommunicator;
    assert_eq!(comm.rank(), 0);
    assert_eq!(comm.size(), 1);
    assert_eq!(comm.all_gather_varcount(&[1.0, 2.0]), vec![vec![1.0, 2.0]]);
}

#[test]
fn thread_communicator_gathers_buffers_of_all_ranks() {
    let gathered = run_on_threads(3, |comm| {
        assert_eq!(comm.size(), 3);
        let data = vec![comm.rank() as f64; comm.rank()];
        let first = comm.all_gather_varcount(&data);
        // A second collective must not observe buffers of the first
        let second = comm.all_gather_varcount(&[10.0 + comm.rank() as f64]);
        (first, second)
    });

    for (first, second) in gathered {
        assert_eq!(first, vec![vec![], vec![1.0], vec![2.0, 2.0]]);
        assert_eq!(second, vec![vec![10.0], vec![11.0], vec![12.0]]);
    }
}

#[test]
#[should_panic]
fn thread_communicator_group_must_not_be_empty() {
    let _ = ThreadCommunicator::create_group(0);
}

#[test]
fn points_are_located_on_owning_rank() {
    for geometry in [Geometry::Square, Geometry::Triangle] {
        let meshes = [half_domain_mesh(geometry, 0), half_domain_mesh(geometry, 1)];
        // Each rank queries points in both halves of the domain as well as outside of it
        let queries = [
            vec![Point2::new(0.2, 0.3), Point2::new(0.8, 0.6), Point2::new(2.0, 0.5)],
            vec![Point2::new(0.6, 0.9), Point2::new(0.1, 0.1)],
        ];

        let outputs = run_on_threads(2, |comm| {
            let rank = comm.rank();
            locate_and_interpolate(comm, &meshes[rank], &queries[rank])
        });

        let expected_processes = [vec![0, 1, 0], vec![1, 0]];
        for (rank, (result, interpolated)) in outputs.iter().enumerate() {
            let points = &queries[rank];
            assert_eq!(result.len(), points.len());
            for (i, (location, point)) in result.iter().zip(points).enumerate() {
                assert_eq!(location.process, expected_processes[rank][i]);
                if point.x > 1.0 {
                    assert_eq!(location.code, LocationCode::NotFound);
                    assert_eq!(location.element, None);
                    assert_scalar_eq!(interpolated[i], 0.0);
                } else {
                    assert_eq!(location.code, LocationCode::Inside);
                    let owner_mesh = &meshes[location.process];
                    let x = owner_mesh.map_element_reference_coords(location.element.unwrap(), &location.reference_coords);
                    assert!((x - point).norm() <= 1e-10);
                    assert_scalar_eq!(interpolated[i], point.x + 2.0 * point.y, comp = abs, tol = 1e-10);
                }
            }
        }
    }
}

#[test]
fn ties_between_ranks_are_broken_by_lowest_rank() {
    let mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Square, 2, 2);
    let points = [Point2::new(0.3, 0.7), Point2::new(0.75, 0.25)];

    let outputs = run_on_threads(2, |comm| {
        let mut find_points = FindPoints::<f64, U2, _>::new(comm);
        find_points
            .setup(&mesh, &FindPointsSettings::default())
            .unwrap();
        let result = find_points.find_points(&points);
        let values = vec![1.0; 2 * mesh.num_nodes()];
        let interpolated = find_points.interpolate(&result, &NodalField::new(&values, 2));
        (result, interpolated)
    });

    for (result, interpolated) in &outputs {
        assert!(result.iter().all(|location| location.process == 0));
        assert_eq!(result.codes(), vec![LocationCode::Inside; 2]);
        // Values are contributed by the owning rank only
        assert_eq!(interpolated.len(), 4);
        for &value in interpolated.iter() {
            assert_scalar_eq!(value, 1.0, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn ranks_without_points_take_part_in_collectives() {
    let mesh = create_unit_square_lagrange_mesh_2d::<f64>(Geometry::Triangle, 2, 2);
    let outputs = run_on_threads(3, |comm| {
        let points = if comm.rank() == 2 {
            vec![Point2::new(0.4, 0.45)]
        } else {
            Vec::new()
        };
        let mut find_points = FindPoints::<f64, U2, _>::new(comm);
        find_points
            .setup(&mesh, &FindPointsSettings::default())
            .unwrap();
        let result = find_points.find_points(&points);
        let values: Vec<f64> = mesh.vertices().iter().map(|v| v.x * v.y).collect();
        let interpolated = find_points.interpolate(&result, &NodalField::scalar(&values));
        (result, interpolated)
    });

    assert!(outputs[0].0.is_empty());
    assert!(outputs[1].0.is_empty());
    let (result, interpolated) = &outputs[2];
    assert_eq!(result[0].code, LocationCode::Inside);
    assert_eq!(result[0].process, 0);
    assert_scalar_eq!(interpolated[0], 0.4 * 0.45, comp = abs, tol = 1e-12);
}
