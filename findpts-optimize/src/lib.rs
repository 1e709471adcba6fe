/// Calculus helper traits and numerical differentiation
pub mod calculus;
/// Box-constrained Newton iteration for square nonlinear systems
pub mod newton;
