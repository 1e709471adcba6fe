use crate::calculus::DifferentiableVectorFunction;
use findpts_traits::Real;
use log::debug;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NewtonSettings<T> {
    pub max_iterations: Option<usize>,
    /// The iteration has converged if `|F(x)|_2 <= tolerance`.
    pub tolerance: T,
    /// The iteration is stopped if a step shorter than `step_tolerance` is taken.
    pub step_tolerance: T,
}

/// Uniform box constraints `lower <= x_i <= upper` applied to every component of `x`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Bounds<T> {
    pub lower: T,
    pub upper: T,
}

impl<T: Real> Bounds<T> {
    pub fn new(lower: T, upper: T) -> Self {
        assert!(lower <= upper, "lower bound must not exceed upper bound");
        Self { lower, upper }
    }

    pub fn clamp(&self, value: T) -> T {
        value.max(self.lower).min(self.upper)
    }
}

/// Why a constrained Newton iteration stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The residual dropped below the tolerance.
    ResidualTolerance,
    /// No step longer than the step tolerance reduces the residual. This is the expected
    /// outcome when the root lies outside the box or does not exist.
    StepTolerance,
    /// The maximum number of iterations was reached.
    MaximumIterations,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewtonResult<T>
where
    T: Scalar,
{
    pub iterations: usize,
    pub residual_norm: T,
    pub termination: Termination,
}

#[derive(Debug)]
pub enum NewtonError {
    /// The function produced a non-finite residual at the given iteration.
    NonFiniteResidual(usize),
    /// The least-squares solve for the step direction failed.
    JacobianError(Box<dyn Error>),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &NewtonError::NonFiniteResidual(iter) => {
                write!(f, "Non-finite residual encountered at iteration {}.", iter)
            }
            &NewtonError::JacobianError(ref err) => {
                write!(f, "Failed to solve for the Newton direction. Error: {}", err)
            }
        }
    }
}

impl Error for NewtonError {}

/// Attempts to solve the square non-linear system `F(x) = 0` subject to the box constraints
/// `bounds.lower <= x_i <= bounds.upper`.
///
/// Each iteration computes a Gauss-Newton direction restricted to the variables that are not
/// held at an active bound, followed by a projected backtracking line search on
/// `g(x) = |F(x)|^2 / 2`. If the root lies outside the box, the iteration converges to a
/// constrained minimizer of `|F(x)|` on the boundary and terminates with
/// [`Termination::StepTolerance`]; the caller decides what to make of the remaining residual.
///
/// The initial `x` is projected onto the box. On return, `x` holds the final iterate.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn box_constrained_newton<'a, T, F>(
    mut function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    bounds: Bounds<T>,
    settings: NewtonSettings<T>,
) -> Result<NewtonResult<T>, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    let mut x = x.into();
    let n = x.nrows();
    assert_eq!(function.dimension(), n, "Only square systems are supported");

    // Line search parameters
    let alpha_min = 1e-10;
    let c = 1e-4;

    for x_i in x.iter_mut() {
        *x_i = bounds.clamp(*x_i);
    }

    let mut f = DVector::zeros(n);
    let mut f_trial = DVector::zeros(n);
    let mut x_trial = DVector::zeros(n);
    let mut jacobian = DMatrix::zeros(n, n);
    let mut free = vec![true; n];

    function.eval_into(&mut DVectorViewMut::from(&mut f), &DVectorView::from(&x));
    let mut iter = 0;

    loop {
        let residual_norm = f.norm();
        if !residual_norm.is_finite() {
            return Err(NewtonError::NonFiniteResidual(iter));
        }

        let result = |termination| NewtonResult {
            iterations: iter,
            residual_norm,
            termination,
        };

        if residual_norm <= settings.tolerance {
            return Ok(result(Termination::ResidualTolerance));
        }
        if settings
            .max_iterations
            .map(|max_iter| iter >= max_iter)
            .unwrap_or(false)
        {
            return Ok(result(Termination::MaximumIterations));
        }

        function.jacobian_into(&mut DMatrixViewMut::from(&mut jacobian), &DVectorView::from(&x));

        free.iter_mut().for_each(|is_free| *is_free = true);
        let mut dx = solve_restricted_least_squares(&jacobian, &f, &free)?;

        // Variables sitting on a bound with the direction pointing out of the box are held
        // fixed, and the direction is recomputed for the remaining variables
        let mut num_active = 0;
        for i in 0..n {
            let pushes_below = x[i] <= bounds.lower && dx[i] < 0.0;
            let pushes_above = x[i] >= bounds.upper && dx[i] > 0.0;
            if pushes_below || pushes_above {
                free[i] = false;
                num_active += 1;
            }
        }
        if num_active == n {
            return Ok(result(Termination::StepTolerance));
        } else if num_active > 0 {
            dx = solve_restricted_least_squares(&jacobian, &f, &free)?;
        }

        if dx.norm() <= settings.step_tolerance {
            return Ok(result(Termination::StepTolerance));
        }

        // Projected backtracking line search with a sufficient decrease condition
        let g = 0.5 * residual_norm * residual_norm;
        let mut alpha = T::one();
        let accepted_step = loop {
            for i in 0..n {
                x_trial[i] = bounds.clamp(x[i] + alpha * dx[i]);
            }
            function.eval_into(
                &mut DVectorViewMut::from(&mut f_trial),
                &DVectorView::from(&x_trial),
            );
            let g_trial = 0.5 * f_trial.norm_squared();
            if g_trial.is_finite() && g_trial <= (1.0 - c * alpha) * g {
                break Some(alpha);
            } else if alpha < alpha_min {
                break None;
            }
            alpha *= 0.5;
        };

        let Some(alpha) = accepted_step else {
            debug!("Constrained Newton line search stalled at iteration {}", iter);
            return Ok(result(Termination::StepTolerance));
        };

        let step_length = (&x_trial - &x).norm();
        x.copy_from(&x_trial);
        f.copy_from(&f_trial);
        iter += 1;
        debug!(
            "Constrained Newton iteration {}: step length {}, alpha {}, residual {}",
            iter,
            step_length,
            alpha,
            f.norm()
        );

        if step_length <= settings.step_tolerance {
            let residual_norm = f.norm();
            let termination = if residual_norm <= settings.tolerance {
                Termination::ResidualTolerance
            } else {
                Termination::StepTolerance
            };
            return Ok(NewtonResult {
                iterations: iter,
                residual_norm,
                termination,
            });
        }
    }
}

/// Computes `dx` minimizing `|J dx + f|` with `dx_i = 0` for every variable that is not free.
///
/// Uses a pseudo-inverse, so rank-deficient Jacobians produce the minimum-norm direction
/// instead of failing.
fn solve_restricted_least_squares<T: Real>(
    jacobian: &DMatrix<T>,
    f: &DVector<T>,
    free: &[bool],
) -> Result<DVector<T>, NewtonError> {
    let n = jacobian.ncols();
    let free_indices: Vec<usize> = (0..n).filter(|&i| free[i]).collect();
    let reduced = DMatrix::from_fn(jacobian.nrows(), free_indices.len(), |r, c| {
        jacobian[(r, free_indices[c])]
    });
    let rhs = -f;

    let svd = reduced.svd(true, true);
    let max_singular_value = svd.singular_values.max();
    let eps = T::default_epsilon() * T::from_usize(n).unwrap() * max_singular_value;
    let reduced_dx = svd
        .solve(&rhs, eps)
        .map_err(|err| NewtonError::JacobianError(Box::from(err)))?;

    let mut dx = DVector::zeros(n);
    for (c, &i) in free_indices.iter().enumerate() {
        dx[i] = reduced_dx[c];
    }
    Ok(dx)
}
