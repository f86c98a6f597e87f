//! Shared projection training for the quantization families.
//!
//! `itq`, `dbq` and `kdbq` all start from the same pipeline: stage the
//! dataset densely, take the leading eigenvectors of the (uncentered) Gram
//! matrix, then refine a random orthogonal rotation by alternating sign
//! quantization with an orthogonal Procrustes solve (Gong & Lazebnik's
//! iterative quantization).
use crate::data::Element;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use faer::{Mat, Side};
use ndarray::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Stage the whole dataset as a dense single-precision matrix.
pub(crate) fn stage<T: Element>(data: &Matrix<T>) -> Mat<f32> {
    Mat::from_fn(data.size(), data.dim(), |i, j| data.row(i as u32)[j].to_f32())
}

/// The top-`n` eigenvectors (largest eigenvalues) of the symmetric matrix
/// `cov`, one per row of the returned `n x d` array.
///
/// Columns are picked by explicitly sorting the eigenvalues, so the result
/// does not depend on the solver's ordering convention.
pub(crate) fn top_eigenvectors(cov: &Mat<f32>, n: usize) -> Result<Array2<f32>> {
    let dim = cov.nrows();
    let eig = cov
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| Error::Failed(format!("eigendecomposition failed: {:?}", e)))?;
    let u = eig.U();
    let values: Vec<f32> = eig.S().column_vector().iter().copied().collect();
    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order.truncate(n);
    Ok(Array2::from_shape_fn((n, dim), |(i, j)| u[(j, order[i])]))
}

/// Project every staged row onto the principal components: `x * pcs^T`.
pub(crate) fn project(x: &Mat<f32>, pcs: &Array2<f32>) -> Mat<f32> {
    let p = Mat::from_fn(pcs.nrows(), pcs.ncols(), |i, j| pcs[(i, j)]);
    x.as_ref() * p.transpose()
}

/// ITQ rotation refinement: a random orthogonal start, then `iters` rounds
/// of `B = sign(Xc R)` followed by the SVD of `B^T Xc` with
/// `R <- V U^T`. Returns the `n x n` rotation.
pub(crate) fn itq_rotation<R: Rng>(
    mat_c: &Mat<f32>,
    n: usize,
    iters: u32,
    rng: &mut R,
) -> Result<Mat<f32>> {
    let svd_err = |e| Error::Failed(format!("svd failed: {:?}", e));
    let gauss: Vec<f32> = (0..n * n).map(|_| StandardNormal.sample(rng)).collect();
    let start = Mat::from_fn(n, n, |i, j| gauss[i * n + j]);
    let mut r: Mat<f32> = start.thin_svd().map_err(svd_err)?.U().to_owned();
    for _ in 0..iters {
        let z = mat_c.as_ref() * r.as_ref();
        let b = Mat::from_fn(z.nrows(), z.ncols(), |i, j| {
            if z[(i, j)] > 0.0 {
                1.0f32
            } else {
                -1.0
            }
        });
        let svd = (b.transpose() * mat_c.as_ref()).svd().map_err(svd_err)?;
        r = svd.V() * svd.U().transpose();
    }
    Ok(r)
}
