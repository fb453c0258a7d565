//! Orthonormal 2-D DCT-II on square matrices.
//!
//! Built as two matrix products with a precomputed cosine basis, which is
//! plenty fast for the 32x32 grids used by perceptual hashing.

use std::f64::consts::PI;

use ndarray::Array2;

/// Orthonormal DCT-II basis: `B[u][i] = c(u) * sqrt(2/N) * cos((2i+1)u*pi / 2N)`
/// with `c(0) = 1/sqrt(2)`, else 1.
pub fn dct_basis(n: usize) -> Array2<f64> {
    let scale = (2.0 / n as f64).sqrt();
    Array2::from_shape_fn((n, n), |(u, i)| {
        let cu = if u == 0 { 1.0 / 2f64.sqrt() } else { 1.0 };
        cu * scale * (((2 * i + 1) as f64 * u as f64 * PI) / (2.0 * n as f64)).cos()
    })
}

/// 2-D DCT-II of a square matrix: `B * X * B^T`.
///
/// Equivalent to `(2/N) c(u) c(v) sum_ij x[i][j] cos(..i..u) cos(..j..v)`.
pub fn dct_2d(input: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = input.dim();
    debug_assert_eq!(rows, cols, "dct_2d expects a square matrix");
    let basis = dct_basis(rows);
    basis.dot(input).dot(&basis.t())
}
