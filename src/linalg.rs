//! Dense linear-algebra helpers shared by the SVD engines.
//!
//! Matrices live in `ndarray`; QR and the dense SVD are delegated to
//! `nalgebra` and converted back.

use crate::{Channel, ImsvdError, Matrix, Result, Vector};
use nalgebra::{DMatrix, SVD};
use ndarray::{ArrayView1, ArrayView2, Axis};
use std::cmp::Ordering;

/// Converts a pixel plane into a working-precision matrix, rejecting empty input.
pub fn to_float(matrix: &Channel) -> Result<Matrix> {
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return Err(ImsvdError::Numerical(format!(
            "cannot decompose a degenerate {}x{} matrix",
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    Ok(matrix.mapv(f64::from))
}

pub fn norm(x: &ArrayView1<f64>) -> f64 {
    x.dot(x).sqrt()
}

pub fn frobenius_norm(a: &ArrayView2<f64>) -> f64 {
    a.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// `u · vᵗ`
pub fn outer(u: &ArrayView1<f64>, v: &ArrayView1<f64>) -> Matrix {
    u.view().insert_axis(Axis(1)).dot(&v.view().insert_axis(Axis(0)))
}

fn to_dmatrix(a: &ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn from_dmatrix(m: &DMatrix<f64>) -> Matrix {
    Matrix::from_shape_fn(m.shape(), |(i, j)| m[(i, j)])
}

/// Thin QR: for an `m x n` input returns `Q` (`m x min(m,n)`) and `R` (`min(m,n) x n`).
pub fn qr(a: &ArrayView2<f64>) -> (Matrix, Matrix) {
    let qr = to_dmatrix(a).qr();
    (from_dmatrix(&qr.q()), from_dmatrix(&qr.r()))
}

/// Thin SVD with singular values sorted in descending order.
///
/// Returns `(U, S, Vh)` with shapes `m x r`, `r`, `r x n` where `r = min(m, n)`.
pub fn dense_svd(a: &ArrayView2<f64>) -> Result<(Matrix, Vector, Matrix)> {
    let svd = SVD::try_new(to_dmatrix(a), true, true, f64::EPSILON, 0)
        .ok_or_else(|| ImsvdError::Numerical("dense SVD failed to converge".to_string()))?;
    let (u, vt) = match (svd.u, svd.v_t) {
        (Some(u), Some(vt)) => (from_dmatrix(&u), from_dmatrix(&vt)),
        _ => return Err(ImsvdError::Numerical("dense SVD returned no singular vectors".to_string())),
    };
    let singular: Vec<f64> = svd.singular_values.iter().copied().collect();

    let mut order: Vec<usize> = (0..singular.len()).collect();
    order.sort_by(|&a, &b| singular[b].partial_cmp(&singular[a]).unwrap_or(Ordering::Equal));

    let s = Vector::from_iter(order.iter().map(|&i| singular[i]));
    let u = u.select(Axis(1), &order);
    let vt = vt.select(Axis(0), &order);
    Ok((u, s, vt))
}

pub fn singular_values(a: &ArrayView2<f64>) -> Result<Vector> {
    let svd = SVD::try_new(to_dmatrix(a), false, false, f64::EPSILON, 0)
        .ok_or_else(|| ImsvdError::Numerical("singular value computation failed to converge".to_string()))?;
    Ok(Vector::from_iter(svd.singular_values.iter().copied()))
}

/// Number of singular values above `σ_max · max(m, n) · ε`, and that cutoff.
pub fn rank_with_tolerance(a: &ArrayView2<f64>) -> Result<(usize, f64)> {
    let s = singular_values(a)?;
    let largest = s.iter().copied().fold(0.0, f64::max);
    let tolerance = largest * a.nrows().max(a.ncols()) as f64 * f64::EPSILON;
    Ok((s.iter().filter(|&&v| v > tolerance).count(), tolerance))
}

pub fn numerical_rank(a: &ArrayView2<f64>) -> Result<usize> {
    Ok(rank_with_tolerance(a)?.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_qr_reconstructs_input() {
        let a = array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]];
        let (q, r) = qr(&a.view());

        assert_eq!(q.shape(), &[3, 2]);
        assert_eq!(r.shape(), &[2, 2]);
        let qtq = q.t().dot(&q);
        assert_abs_diff_eq!(qtq, Matrix::eye(2), epsilon = 1e-10);
        assert_abs_diff_eq!(q.dot(&r), a, epsilon = 1e-10);
    }

    #[test]
    fn test_dense_svd_sorted_and_exact() {
        let a = array![[3.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]];
        let (u, s, vt) = dense_svd(&a.view()).unwrap();

        assert_abs_diff_eq!(s, array![5.0, 3.0, 1.0], epsilon = 1e-10);
        let rebuilt = (&u * &s).dot(&vt);
        assert_abs_diff_eq!(rebuilt, a, epsilon = 1e-10);
    }

    #[test]
    fn test_numerical_rank() {
        let a = array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [3.0, 6.0, 9.0]];
        assert_eq!(numerical_rank(&a.view()).unwrap(), 1);
        assert_eq!(numerical_rank(&Matrix::zeros((3, 2)).view()).unwrap(), 0);
        assert_eq!(numerical_rank(&Matrix::eye(4).view()).unwrap(), 4);
    }

    #[test]
    fn test_degenerate_channel_rejected() {
        let empty = Channel::zeros((0, 4));
        assert!(matches!(to_float(&empty), Err(ImsvdError::Numerical(_))));
    }

    #[test]
    fn test_norms_and_outer() {
        let u = array![1.0, 2.0];
        let v = array![3.0, 0.0, 4.0];
        assert_abs_diff_eq!(norm(&v.view()), 5.0);
        let o = outer(&u.view(), &v.view());
        assert_eq!(o, array![[3.0, 0.0, 4.0], [6.0, 0.0, 8.0]]);
        assert_abs_diff_eq!(frobenius_norm(&o.view()), 125f64.sqrt(), epsilon = 1e-12);
    }
}
