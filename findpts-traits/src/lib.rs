use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used throughout `findpts`.
///
/// The search structure stores bounding volumes in `f64`, so every `Real` must be
/// convertible to and from `f64` through `to_subset`/`from_subset`.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Converts a scalar to `f64`, as used for bounding volumes and for data exchanged between
/// processes.
///
/// # Panics
///
/// Panics if the value is not representable as `f64`.
pub fn to_f64<T: Real>(x: T) -> f64 {
    x.to_subset()
        .expect("Scalar type must be representable as f64")
}

/// Converts an `f64` to the scalar type.
pub fn from_f64<T: Real>(x: f64) -> T {
    T::from_subset(&x)
}

pub mod allocators;
