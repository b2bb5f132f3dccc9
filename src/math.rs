use ndarray::Array2;
use num_traits::Float;

/// Generate the Vandermonde matrix of `degree` for observations `x`
///
/// The Vandermonde matrix is a (n x degree + 1) matrix. Each row of the matrix is a geometric
/// progression for an individual observation variable `x` from power `0` to `degree` inclusive.
///
/// # Panics
///
/// The generator panics in the event that `degree` cannot be converted to `i32`. As the maximum
/// value which can be represented by an `i32` is `2_147_483_647i32` this is unlikely to occur so
/// the error probably does not need to be gracefully handled.
pub(crate) fn vandermonde<T: Float>(x: &[T], degree: usize) -> Array2<T> {
    Array2::from_shape_fn((x.len(), degree + 1), |(ii, jj)| x[ii].powi(exponent(jj)))
}

fn exponent(power: usize) -> i32 {
    i32::try_from(power).unwrap_or_else(|_| panic!("power {power} doesn't fit in `i32`"))
}
