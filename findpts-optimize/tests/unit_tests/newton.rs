use findpts_optimize::calculus::{DifferentiableVectorFunction, VectorFunction, VectorFunctionBuilder};
use findpts_optimize::newton::*;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Matrix3, Vector3};
use numeric_literals::replace_numeric_literals;

struct MockLinearVectorFunction;

impl VectorFunction<f64> for MockLinearVectorFunction {
    fn dimension(&self) -> usize {
        3
    }

    #[replace_numeric_literals(f64::from(literal))]
    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        let a = Matrix3::new(5, 1, 2, 1, 4, 2, 2, 2, 4);
        let b = Vector3::new(1, 2, 3);
        let r = a * x - b;
        f.copy_from(&r);
    }
}

impl DifferentiableVectorFunction<f64> for MockLinearVectorFunction {
    #[replace_numeric_literals(f64::from(literal))]
    fn jacobian_into(&mut self, jacobian: &mut DMatrixViewMut<f64>, _x: &DVectorView<f64>) {
        let a = Matrix3::new(5, 1, 2, 1, 4, 2, 2, 2, 4);
        jacobian.copy_from(&a);
    }
}

fn default_settings() -> NewtonSettings<f64> {
    NewtonSettings {
        max_iterations: Some(50),
        tolerance: 1e-12,
        step_tolerance: 1e-14,
    }
}

#[test]
fn newton_converges_in_single_iteration_for_linear_system() {
    let expected_solution = Vector3::new(-0.125, 1.0 / 6.0, 0.72916666666666666);

    let mut x = DVector::zeros(3);
    let bounds = Bounds::new(-10.0, 10.0);
    let result = box_constrained_newton(MockLinearVectorFunction, &mut x, bounds, default_settings())
        .expect("Newton iterations must succeed");

    assert_matrix_eq!(x, expected_solution, comp = abs, tol = 1e-12);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.termination, Termination::ResidualTolerance);
}

#[test]
fn newton_respects_bounds_when_root_is_outside_box() {
    // F(x) = x - (2, 0.5): the root (2, 0.5) lies outside [-1, 1]^2
    let function = VectorFunctionBuilder::with_dimension(2)
        .with_function(|f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| {
            f[0] = x[0] - 2.0;
            f[1] = x[1] - 0.5;
        })
        .with_jacobian(|j: &mut DMatrixViewMut<f64>, _x: &DVectorView<f64>| {
            j.fill_with_identity();
        });

    let mut x = DVector::zeros(2);
    let result = box_constrained_newton(function, &mut x, Bounds::new(-1.0, 1.0), default_settings())
        .expect("Newton iterations must succeed");

    assert_matrix_eq!(x, DVector::from_column_slice(&[1.0, 0.5]), comp = abs, tol = 1e-12);
    assert!((result.residual_norm - 1.0).abs() < 1e-12);
    assert_eq!(result.termination, Termination::StepTolerance);
}

#[test]
fn newton_projects_initial_guess_onto_box() {
    let function = VectorFunctionBuilder::with_dimension(1)
        .with_function(|f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| {
            f[0] = x[0] - 0.25;
        })
        .with_jacobian(|j: &mut DMatrixViewMut<f64>, _x: &DVectorView<f64>| {
            j[(0, 0)] = 1.0;
        });

    let mut x = DVector::from_column_slice(&[5.0]);
    let result = box_constrained_newton(function, &mut x, Bounds::new(-1.0, 1.0), default_settings())
        .expect("Newton iterations must succeed");

    assert!((x[0] - 0.25).abs() < 1e-12);
    assert_eq!(result.termination, Termination::ResidualTolerance);
}

#[test]
fn newton_converges_for_nonlinear_system() {
    // Root at (0.5, 0.5)
    let function = VectorFunctionBuilder::with_dimension(2)
        .with_function(|f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| {
            f[0] = x[0] * x[0] * x[0] - 0.125;
            f[1] = x[1] + x[0] * x[1] - 0.75;
        })
        .with_jacobian(|j: &mut DMatrixViewMut<f64>, x: &DVectorView<f64>| {
            j[(0, 0)] = 3.0 * x[0] * x[0];
            j[(0, 1)] = 0.0;
            j[(1, 0)] = x[1];
            j[(1, 1)] = 1.0 + x[0];
        });

    let mut x = DVector::from_column_slice(&[0.9, 0.1]);
    let result = box_constrained_newton(function, &mut x, Bounds::new(-1.0, 1.0), default_settings())
        .expect("Newton iterations must succeed");

    assert_matrix_eq!(x, DVector::from_column_slice(&[0.5, 0.5]), comp = abs, tol = 1e-10);
    assert_eq!(result.termination, Termination::ResidualTolerance);
    assert!(result.iterations < 50);
}

#[test]
fn newton_stops_at_iteration_limit() {
    let function = VectorFunctionBuilder::with_dimension(1)
        .with_function(|f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>| {
            f[0] = x[0].powi(3) - 0.001;
        })
        .with_jacobian(|j: &mut DMatrixViewMut<f64>, x: &DVectorView<f64>| {
            j[(0, 0)] = 3.0 * x[0] * x[0];
        });

    let settings = NewtonSettings {
        max_iterations: Some(0),
        ..default_settings()
    };
    let mut x = DVector::from_column_slice(&[1.0]);
    let result = box_constrained_newton(function, &mut x, Bounds::new(-1.0, 1.0), settings)
        .expect("Newton iterations must succeed");

    assert_eq!(result.iterations, 0);
    assert_eq!(result.termination, Termination::MaximumIterations);
    assert_eq!(x[0], 1.0);
}
