//! Small dense linear-algebra helpers over row-major `Vec<Vec<f64>>`.
//!
//! Matrices in this crate are tiny (one row per asset), so plain nested
//! vectors keep the serialized shape and the arithmetic in one place.

pub type Matrix = Vec<Vec<f64>>;

/// Dot product.
pub fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Matrix-vector multiplication.
pub fn mat_vec_multiply(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

/// Quadratic form w' * M * w.
pub fn quadratic_form(w: &[f64], mat: &[Vec<f64>]) -> f64 {
    vec_dot(w, &mat_vec_multiply(mat, w))
}

/// Elements of `v` at `indices`, in order.
pub fn select_vector(v: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| v[i]).collect()
}

/// Square sub-matrix of `mat` restricted to `indices` rows and columns.
pub fn select_submatrix(mat: &[Vec<f64>], indices: &[usize]) -> Matrix {
    indices
        .iter()
        .map(|&i| indices.iter().map(|&j| mat[i][j]).collect())
        .collect()
}

/// Every element multiplied by `factor`.
pub fn scale_matrix(mat: &[Vec<f64>], factor: f64) -> Matrix {
    mat.iter()
        .map(|row| row.iter().map(|x| x * factor).collect())
        .collect()
}

pub fn is_zero_matrix(mat: &[Vec<f64>]) -> bool {
    mat.iter().all(|row| row.iter().all(|&x| x == 0.0))
}

/// Cholesky decomposition of a symmetric positive-definite matrix.
///
/// Returns lower-triangular `L` with `A = L * L'`. A pivot at or below
/// `n * eps * max(diag(A))` means the matrix is not (numerically) positive
/// definite; the offending pivot is returned as the error.
#[allow(clippy::needless_range_loop)]
pub fn cholesky(mat: &[Vec<f64>]) -> Result<Matrix, f64> {
    let n = mat.len();
    let max_diag = (0..n).map(|i| mat[i][i]).fold(0.0_f64, f64::max);
    let tolerance = n as f64 * f64::EPSILON * max_diag;
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[i][k] * l[j][k];
            }

            if i == j {
                let pivot = mat[i][i] - sum;
                if !(pivot > tolerance) {
                    return Err(pivot);
                }
                l[i][j] = pivot.sqrt();
            } else {
                l[i][j] = (mat[i][j] - sum) / l[j][j];
            }
        }
    }

    Ok(l)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    #[test]
    fn test_quadratic_form() {
        let m = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        // [1, 2] * M * [1, 2]' = 2 + 2*2 + 3*4 = 18
        assert_close(quadratic_form(&[1.0, 2.0], &m), 18.0);
    }

    #[test]
    fn test_select_submatrix() {
        let m = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ];
        assert_eq!(
            select_submatrix(&m, &[0, 2]),
            vec![vec![1.0, 3.0], vec![7.0, 9.0]]
        );
        assert_eq!(select_vector(&[10.0, 20.0, 30.0], &[2, 0]), vec![30.0, 10.0]);
    }

    #[test]
    fn test_cholesky_reconstructs_matrix() {
        let a = vec![
            vec![4.0, 12.0, -16.0],
            vec![12.0, 37.0, -43.0],
            vec![-16.0, -43.0, 98.0],
        ];
        let l = cholesky(&a).unwrap();
        // Textbook factor: [[2,0,0],[6,1,0],[-8,5,3]]
        assert_close(l[0][0], 2.0);
        assert_close(l[1][0], 6.0);
        assert_close(l[1][1], 1.0);
        assert_close(l[2][0], -8.0);
        assert_close(l[2][1], 5.0);
        assert_close(l[2][2], 3.0);
        assert_close(l[0][1], 0.0);

        for i in 0..3 {
            for j in 0..3 {
                let v: f64 = (0..3).map(|k| l[i][k] * l[j][k]).sum();
                assert_close(v, a[i][j]);
            }
        }
    }

    #[test]
    fn test_cholesky_rejects_perfect_correlation() {
        // Two identical assets: rank one.
        let a = vec![vec![0.04, 0.04], vec![0.04, 0.04]];
        assert!(cholesky(&a).is_err());
    }

    #[test]
    fn test_cholesky_rejects_zero_and_negative() {
        assert!(cholesky(&[vec![0.0]]).is_err());
        assert!(cholesky(&[vec![-1.0]]).is_err());
        assert!(cholesky(&[vec![f64::NAN]]).is_err());
    }

    #[test]
    fn test_is_zero_matrix() {
        assert!(is_zero_matrix(&[vec![0.0, 0.0], vec![0.0, 0.0]]));
        assert!(!is_zero_matrix(&[vec![0.0, 1e-300]]));
        assert!(is_zero_matrix(&scale_matrix(&[vec![0.0]], 5.0)));
    }
}
