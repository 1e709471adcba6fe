use findpts::lagrange::{
    apply_along_axes, gauss_lobatto_points, lexicographic_multi_index, LagrangeBasis1d, TensorBasisEvaluation,
};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DVector;
use proptest::prelude::*;

#[test]
fn gauss_lobatto_points_low_order() {
    assert_eq!(gauss_lobatto_points(2), vec![-1.0, 1.0]);

    let points = DVector::from_vec(gauss_lobatto_points(3));
    let expected = DVector::from_vec(vec![-1.0, 0.0, 1.0]);
    assert_matrix_eq!(points, expected, comp = abs, tol = 1e-15);

    let a = 1.0 / f64::sqrt(5.0);
    let points = DVector::from_vec(gauss_lobatto_points(4));
    let expected = DVector::from_vec(vec![-1.0, -a, a, 1.0]);
    assert_matrix_eq!(points, expected, comp = abs, tol = 1e-15);

    let b = f64::sqrt(3.0 / 7.0);
    let points = DVector::from_vec(gauss_lobatto_points(5));
    let expected = DVector::from_vec(vec![-1.0, -b, 0.0, b, 1.0]);
    assert_matrix_eq!(points, expected, comp = abs, tol = 1e-15);
}

#[test]
fn gauss_lobatto_points_are_sorted_and_symmetric() {
    for n in 2..20 {
        let points = gauss_lobatto_points(n);
        assert_eq!(points.len(), n);
        assert_eq!(points[0], -1.0);
        assert_eq!(points[n - 1], 1.0);
        for i in 0..n {
            assert_eq!(points[i], -points[n - 1 - i]);
        }
        assert!(points.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn lagrange_basis_is_kronecker_at_nodes() {
    for n in 2..8 {
        for basis in [LagrangeBasis1d::<f64>::gauss_lobatto(n), LagrangeBasis1d::equispaced(n)] {
            let mut values = vec![0.0; n];
            for (i, &x_i) in basis.nodes().iter().enumerate() {
                basis.populate_values(&mut values, x_i);
                for (j, &value) in values.iter().enumerate() {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_scalar_eq!(value, expected, comp = abs, tol = 1e-12);
                }
            }
        }
    }
}

#[test]
fn evaluation_matrix_reproduces_polynomials() {
    let basis = LagrangeBasis1d::<f64>::gauss_lobatto(4);
    let f = |x: f64| 2.0 * x.powi(3) - x + 0.5;
    let nodal_values: Vec<_> = basis.nodes().iter().map(|&x| f(x)).collect();
    let points = [-0.9, -0.2, 0.0, 0.35, 1.0];
    let matrix = basis.evaluation_matrix(&points);
    assert_eq!(matrix.len(), points.len() * 4);

    for (row, &x) in matrix.chunks_exact(4).zip(&points) {
        let value: f64 = row.iter().zip(&nodal_values).map(|(phi, u)| phi * u).sum();
        assert_scalar_eq!(value, f(x), comp = abs, tol = 1e-13);
    }
}

#[test]
fn lexicographic_multi_index_has_x_fastest() {
    assert_eq!(lexicographic_multi_index(0, 3, 2), [0, 0, 0]);
    assert_eq!(lexicographic_multi_index(1, 3, 2), [1, 0, 0]);
    assert_eq!(lexicographic_multi_index(3, 3, 2), [0, 1, 0]);
    assert_eq!(lexicographic_multi_index(8, 3, 2), [2, 2, 0]);
    assert_eq!(lexicographic_multi_index(13, 3, 3), [1, 1, 1]);
    assert_eq!(lexicographic_multi_index(26, 3, 3), [2, 2, 2]);
}

#[test]
fn apply_along_axes_evaluates_tensor_interpolant_on_grid() {
    let n = 3;
    let basis = LagrangeBasis1d::<f64>::gauss_lobatto(n);
    let f = |x: f64, y: f64, z: f64| x * y * y - 2.0 * z + x * z;

    let nodal_values: Vec<_> = (0..n * n * n)
        .map(|lex| {
            let [i, j, k] = lexicographic_multi_index(lex, n, 3);
            f(basis.nodes()[i], basis.nodes()[j], basis.nodes()[k])
        })
        .collect();

    let points = [-1.0, -0.4, 0.1, 0.8];
    let m = points.len();
    let matrix = basis.evaluation_matrix(&points);
    let grid_values = apply_along_axes(&nodal_values, n, 3, &matrix);
    assert_eq!(grid_values.len(), m * m * m);

    for (lex, &value) in grid_values.iter().enumerate() {
        let [i, j, k] = lexicographic_multi_index(lex, m, 3);
        assert_scalar_eq!(value, f(points[i], points[j], points[k]), comp = abs, tol = 1e-13);
    }
}

#[test]
fn tensor_evaluation_interpolates_values_and_gradients() {
    let n = 3;
    let basis = LagrangeBasis1d::<f64>::gauss_lobatto(n);
    let f = |x: f64, y: f64| x * x * y + 3.0 * y - 1.0;
    let grad_f = |x: f64, y: f64| [2.0 * x * y, x * x + 3.0];

    let nodal_values: Vec<_> = (0..n * n)
        .map(|lex| {
            let [i, j, _] = lexicographic_multi_index(lex, n, 2);
            f(basis.nodes()[i], basis.nodes()[j])
        })
        .collect();

    let mut evaluation = TensorBasisEvaluation::new(2, n);
    let mut gradient = vec![0.0; 2];
    for xi in [[0.0, 0.0], [0.3, -0.7], [-1.0, 1.0], [0.95, 0.25]] {
        evaluation.populate(&basis, &xi);
        assert_scalar_eq!(evaluation.interpolate(&nodal_values), f(xi[0], xi[1]), comp = abs, tol = 1e-13);

        let value = evaluation.interpolate_with_gradient(&nodal_values, &mut gradient);
        assert_scalar_eq!(value, f(xi[0], xi[1]), comp = abs, tol = 1e-13);
        let expected_gradient = grad_f(xi[0], xi[1]);
        assert_scalar_eq!(gradient[0], expected_gradient[0], comp = abs, tol = 1e-12);
        assert_scalar_eq!(gradient[1], expected_gradient[1], comp = abs, tol = 1e-12);
    }
}

proptest! {
    #[test]
    fn lagrange_basis_partition_of_unity(n in 2..10usize, x in -1.0..=1.0f64) {
        for basis in [LagrangeBasis1d::<f64>::gauss_lobatto(n), LagrangeBasis1d::equispaced(n)] {
            let mut values = vec![0.0; n];
            let mut derivatives = vec![0.0; n];
            basis.populate_values_and_derivatives(&mut values, &mut derivatives, x);
            let sum: f64 = values.iter().sum();
            let derivative_sum: f64 = derivatives.iter().sum();
            prop_assert!((sum - 1.0).abs() <= 1e-10);
            prop_assert!(derivative_sum.abs() <= 1e-8);
        }
    }
}

#[test]
fn bernstein_coefficients_of_linear_functions_are_equispaced() {
    for n in 2..8 {
        let basis = LagrangeBasis1d::<f64>::gauss_lobatto(n);
        let matrix = basis.bernstein_matrix();
        let p = (n - 1) as f64;

        let ones = vec![1.0; n];
        let constant = apply_along_axes(&ones, n, 1, &matrix);
        let linear = apply_along_axes(basis.nodes(), n, 1, &matrix);
        for k in 0..n {
            assert_scalar_eq!(constant[k], 1.0, comp = abs, tol = 1e-12);
            assert_scalar_eq!(linear[k], 2.0 * k as f64 / p - 1.0, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn bernstein_coefficients_enclose_interpolant() {
    // A cubic bump that peaks between the nodes of every Gauss-Lobatto grid with an even
    // number of nodes
    let f = |x: f64| 1.0 - x * x + 0.3 * x * x * x;
    let basis = LagrangeBasis1d::<f64>::gauss_lobatto(4);
    let values: Vec<f64> = basis.nodes().iter().map(|&x| f(x)).collect();
    let coefficients = apply_along_axes(&values, 4, 1, &basis.bernstein_matrix());
    let upper = coefficients.iter().copied().fold(f64::MIN, f64::max);
    let lower = coefficients.iter().copied().fold(f64::MAX, f64::min);
    assert_scalar_eq!(coefficients[0], f(-1.0), comp = abs, tol = 1e-12);
    assert_scalar_eq!(coefficients[3], f(1.0), comp = abs, tol = 1e-12);

    for i in 0..=200 {
        let x = -1.0 + 0.01 * i as f64;
        assert!(lower <= f(x) && f(x) <= upper);
    }
    // The nodes alone miss the peak
    let node_max = values.iter().copied().fold(f64::MIN, f64::max);
    assert!(node_max < f(0.0));
}
