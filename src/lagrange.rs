//! One-dimensional Lagrange bases and their tensor products.
//!
//! All bases in this module live on the interval `[-1, 1]`. Tensor-product quantities are
//! stored in *lexicographic* order: for a `d`-dimensional multi-index `(i_0, ..., i_{d-1})`
//! with `n` nodes per axis, the linear index is `i_0 + n * i_1 + n^2 * i_2`, i.e. the first
//! axis varies fastest.
use findpts_traits::Real;
use nalgebra::DMatrix;
use std::f64::consts::PI;

/// Recurrence relation for Legendre polynomials, keeping the two highest orders.
#[derive(Debug, Default)]
struct LegendreRecurrence {
    // p_n(x)
    p1: f64,
    // p_{n - 1}(x)
    p2: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) * x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        let mut p3;
        for m in 1..=n {
            let m = m as f64;
            p3 = p2;
            p2 = p1;
            p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
        }
        Self { p1, p2 }
    }
}

/// Gauss-Lobatto-Legendre points on `[-1, 1]` in ascending order.
///
/// The points are the endpoints `-1` and `1` together with the roots of `P'_{n - 1}`, the
/// derivative of the Legendre polynomial of order `n - 1`. They are the standard nodes of
/// spectral element methods.
///
/// # Panics
///
/// Panics if fewer than two points are requested.
pub fn gauss_lobatto_points(num_points: usize) -> Vec<f64> {
    assert!(num_points >= 2, "Gauss-Lobatto rules need at least two points");
    let n = num_points - 1;

    // Newton iteration on (1 - x^2) P'_n(x) = 0, written in terms of the recurrence as
    //  x <- x - (x P_n(x) - P_{n - 1}(x)) / ((n + 1) P_n(x))
    // Starting from the Chebyshev-Gauss-Lobatto points, which are already fairly accurate.
    // The update vanishes identically at x = +-1.
    let mut points: Vec<f64> = (0..=n)
        .map(|i| -(PI * i as f64 / n as f64).cos())
        .map(|mut x| {
            for _ in 0..100 {
                let LegendreRecurrence { p1, p2 } = LegendreRecurrence::evaluate(n, x);
                let dx = (x * p1 - p2) / ((n + 1) as f64 * p1);
                x -= dx;
                if dx.abs() <= 1e-16 {
                    break;
                }
            }
            x
        })
        .collect();

    // Enforce exact symmetry, which the iteration only provides up to round-off
    let m = num_points / 2;
    for i in 0..m {
        let mirror_idx = num_points - i - 1;
        let x = 0.5 * (points[mirror_idx] - points[i]);
        points[i] = -x;
        points[mirror_idx] = x;
    }
    if num_points % 2 == 1 {
        points[m] = 0.0;
    }
    points
}

/// A one-dimensional Lagrange basis on a set of distinct nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeBasis1d<T> {
    nodes: Vec<T>,
    // 1 / prod_{k != j} (x_j - x_k)
    weights: Vec<T>,
}

impl<T: Real> LagrangeBasis1d<T> {
    /// # Panics
    ///
    /// Panics if the nodes are not distinct or if there are no nodes.
    pub fn from_nodes(nodes: Vec<T>) -> Self {
        assert!(!nodes.is_empty(), "A Lagrange basis needs at least one node");
        let weights = (0..nodes.len())
            .map(|j| {
                let denominator = (0..nodes.len())
                    .filter(|&k| k != j)
                    .fold(T::one(), |acc, k| acc * (nodes[j] - nodes[k]));
                assert!(denominator != T::zero(), "Lagrange nodes must be distinct");
                T::one() / denominator
            })
            .collect();
        Self { nodes, weights }
    }

    /// The Lagrange basis on the Gauss-Lobatto-Legendre points with `num_nodes` nodes.
    pub fn gauss_lobatto(num_nodes: usize) -> Self {
        let nodes = gauss_lobatto_points(num_nodes)
            .into_iter()
            .map(|x| T::from_f64(x).expect("f64 must be convertible to T"))
            .collect();
        Self::from_nodes(nodes)
    }

    /// The Lagrange basis on `num_nodes` equispaced nodes in `[-1, 1]`.
    pub fn equispaced(num_nodes: usize) -> Self {
        assert!(num_nodes >= 2, "Equispaced bases need at least two nodes");
        let h = T::from_f64(2.0 / (num_nodes - 1) as f64).expect("f64 must be convertible to T");
        let nodes = (0..num_nodes)
            .map(|i| -T::one() + T::from_usize(i).expect("usize must be convertible to T") * h)
            .collect();
        Self::from_nodes(nodes)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[T] {
        &self.nodes
    }

    /// Evaluates all basis functions at `x`.
    pub fn populate_values(&self, values: &mut [T], x: T) {
        let n = self.num_nodes();
        assert_eq!(values.len(), n);
        for j in 0..n {
            let mut product = self.weights[j];
            for k in 0..n {
                if k != j {
                    product *= x - self.nodes[k];
                }
            }
            values[j] = product;
        }
    }

    /// Evaluates all basis functions and their derivatives at `x`.
    pub fn populate_values_and_derivatives(&self, values: &mut [T], derivatives: &mut [T], x: T) {
        let n = self.num_nodes();
        assert_eq!(values.len(), n);
        assert_eq!(derivatives.len(), n);
        self.populate_values(values, x);
        for j in 0..n {
            // d/dx prod_{k != j} (x - x_k) = sum_{m != j} prod_{k != j, m} (x - x_k)
            let mut sum = T::zero();
            for m in 0..n {
                if m == j {
                    continue;
                }
                let mut product = T::one();
                for k in 0..n {
                    if k != j && k != m {
                        product *= x - self.nodes[k];
                    }
                }
                sum += product;
            }
            derivatives[j] = self.weights[j] * sum;
        }
    }

    /// The matrix `B_{ij} = l_j(x_i)` of basis values at the given points, stored row-major.
    pub fn evaluation_matrix(&self, points: &[T]) -> Vec<T> {
        let n = self.num_nodes();
        let mut matrix = vec![T::zero(); points.len() * n];
        for (row, &x) in matrix.chunks_exact_mut(n).zip(points) {
            self.populate_values(row, x);
        }
        matrix
    }

    /// The row-major matrix taking nodal values to Bernstein coefficients of the same
    /// polynomial on `[-1, 1]`.
    ///
    /// The Bernstein basis of degree `p = n - 1` is `C(p, k) t^k (1 - t)^(p - k)` with
    /// `t = (x + 1) / 2`. The polynomial lies in the convex hull of its Bernstein
    /// coefficients, which gives guaranteed bounds on the range of an interpolant.
    pub fn bernstein_matrix(&self) -> Vec<T> {
        let n = self.num_nodes();
        let p = n - 1;
        let half = T::from_f64(0.5).expect("f64 must be convertible to T");
        let mut binomial = T::one();
        let mut binomials = Vec::with_capacity(n);
        for k in 0..n {
            binomials.push(binomial);
            let k_t = T::from_usize(k).expect("usize must be convertible to T");
            let p_t = T::from_usize(p).expect("usize must be convertible to T");
            binomial = binomial * (p_t - k_t) / (k_t + T::one());
        }

        let vandermonde = DMatrix::from_fn(n, n, |i, k| {
            let t = (self.nodes[i] + T::one()) * half;
            binomials[k] * t.powi(k as i32) * (T::one() - t).powi((p - k) as i32)
        });
        // Bernstein polynomials of degree p are a basis and the nodes are distinct
        let inverse = vandermonde
            .try_inverse()
            .expect("Bernstein-Vandermonde matrix on distinct nodes is invertible");
        let mut matrix = Vec::with_capacity(n * n);
        for row in inverse.row_iter() {
            matrix.extend(row.iter().copied());
        }
        matrix
    }
}

/// Converts a lexicographic linear index into its multi-index.
pub fn lexicographic_multi_index(mut index: usize, nodes_per_dim: usize, dim: usize) -> [usize; 3] {
    assert!(dim <= 3);
    let mut multi_index = [0; 3];
    for i in 0..dim {
        multi_index[i] = index % nodes_per_dim;
        index /= nodes_per_dim;
    }
    multi_index
}

/// Per-axis values and derivatives of a 1D basis at the coordinates of a single reference point.
///
/// This is the building block for evaluating tensor-product interpolants and their gradients
/// without ever forming the `n^d` tensor basis explicitly.
#[derive(Debug, Clone)]
pub struct TensorBasisEvaluation<T> {
    dim: usize,
    nodes_per_dim: usize,
    // values[axis * n + i] = l_i(xi_axis)
    values: Vec<T>,
    derivatives: Vec<T>,
}

impl<T: Real> TensorBasisEvaluation<T> {
    pub fn new(dim: usize, nodes_per_dim: usize) -> Self {
        assert!(dim >= 1 && dim <= 3, "Only dimensions 1, 2 and 3 are supported");
        Self {
            dim,
            nodes_per_dim,
            values: vec![T::zero(); dim * nodes_per_dim],
            derivatives: vec![T::zero(); dim * nodes_per_dim],
        }
    }

    /// Evaluates the basis at the given reference point.
    pub fn populate(&mut self, basis: &LagrangeBasis1d<T>, xi: &[T]) {
        let n = self.nodes_per_dim;
        assert_eq!(basis.num_nodes(), n);
        assert_eq!(xi.len(), self.dim);
        for axis in 0..self.dim {
            let range = axis * n..(axis + 1) * n;
            basis.populate_values_and_derivatives(
                &mut self.values[range.clone()],
                &mut self.derivatives[range],
                xi[axis],
            );
        }
    }

    fn basis_product(&self, multi_index: &[usize; 3], derivative_axis: Option<usize>) -> T {
        let n = self.nodes_per_dim;
        (0..self.dim).fold(T::one(), |acc, axis| {
            let idx = axis * n + multi_index[axis];
            if derivative_axis == Some(axis) {
                acc * self.derivatives[idx]
            } else {
                acc * self.values[idx]
            }
        })
    }

    /// Computes `sum_k phi_k(xi) u_k` for nodal values `u` in lexicographic order.
    pub fn interpolate(&self, nodal_values: &[T]) -> T {
        let n = self.nodes_per_dim;
        assert_eq!(nodal_values.len(), n.pow(self.dim as u32));
        nodal_values
            .iter()
            .enumerate()
            .fold(T::zero(), |acc, (lex, &u)| {
                let multi_index = lexicographic_multi_index(lex, n, self.dim);
                acc + self.basis_product(&multi_index, None) * u
            })
    }

    /// Computes the interpolated value together with its reference gradient.
    pub fn interpolate_with_gradient(&self, nodal_values: &[T], gradient: &mut [T]) -> T {
        let n = self.nodes_per_dim;
        assert_eq!(nodal_values.len(), n.pow(self.dim as u32));
        assert_eq!(gradient.len(), self.dim);
        gradient.iter_mut().for_each(|g| *g = T::zero());
        let mut value = T::zero();
        for (lex, &u) in nodal_values.iter().enumerate() {
            let multi_index = lexicographic_multi_index(lex, n, self.dim);
            value += self.basis_product(&multi_index, None) * u;
            for axis in 0..self.dim {
                gradient[axis] += self.basis_product(&multi_index, Some(axis)) * u;
            }
        }
        value
    }
}

/// Applies the row-major `m x n` matrix along every axis of a lexicographic `n^d` tensor,
/// producing a lexicographic `m^d` tensor.
///
/// With `matrix` the evaluation matrix of a 1D basis at `m` points, this evaluates a
/// tensor-product interpolant on the full `m^d` grid of those points by sum factorization.
pub fn apply_along_axes<T: Real>(input: &[T], nodes_per_dim: usize, dim: usize, matrix: &[T]) -> Vec<T> {
    let n = nodes_per_dim;
    assert_eq!(input.len(), n.pow(dim as u32));
    assert_eq!(matrix.len() % n, 0);
    let m = matrix.len() / n;

    let mut current = input.to_vec();
    let mut shape = vec![n; dim];
    for axis in 0..dim {
        let stride: usize = shape[..axis].iter().product();
        let outer: usize = shape[axis + 1..].iter().product();
        let mut output = vec![T::zero(); stride * m * outer];
        for o in 0..outer {
            for j in 0..m {
                for s in 0..stride {
                    let mut sum = T::zero();
                    for i in 0..n {
                        sum += matrix[j * n + i] * current[s + stride * (i + n * o)];
                    }
                    output[s + stride * (j + m * o)] = sum;
                }
            }
        }
        current = output;
        shape[axis] = m;
    }
    current
}
