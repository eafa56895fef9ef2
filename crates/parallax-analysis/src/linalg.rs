//! Dense linear algebra kernels used by the calibrator.
//!
//! Everything here runs in `f64` over row-major `Vec<Vec<f64>>`
//! matrices. The batches involved are small (hundreds of rows, the
//! embedding dimension wide), so plain loops are fast enough and keep
//! the numerics easy to audit. All routines are deterministic: no
//! randomized initialization anywhere, so repeated fits over the same
//! batch agree bit for bit.

use crate::error::{AnalysisError, AnalysisResult};

/// Upper bound on Jacobi sweeps before declaring non-convergence.
/// Real covariance and cross-covariance matrices converge in well
/// under ten sweeps.
const MAX_JACOBI_SWEEPS: usize = 64;

/// Iterations for the power method. Convergence is geometric in the
/// eigenvalue gap; this is generous for the matrices we see.
const POWER_ITERATIONS: usize = 100;

/// Dot product of two equal-length slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn l2_norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Scale `v` to unit norm in place. Returns `false` (leaving `v`
/// untouched) when the norm is too small to divide by.
pub fn normalize_mut(v: &mut [f64]) -> bool {
    let norm = l2_norm(v);
    if norm <= 1e-12 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Column-wise mean of a non-empty set of equal-length rows.
pub fn mean_vector(rows: &[Vec<f64>]) -> Vec<f64> {
    let n = rows.len();
    let d = rows.first().map_or(0, Vec::len);
    let mut mean = vec![0.0; d];
    for row in rows {
        for (m, x) in mean.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    let inv = 1.0 / (n.max(1) as f64);
    for m in mean.iter_mut() {
        *m *= inv;
    }
    mean
}

/// Subtract `mean` from every row, producing a centered copy.
pub fn center_rows(rows: &[Vec<f64>], mean: &[f64]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| row.iter().zip(mean.iter()).map(|(x, m)| x - m).collect())
        .collect()
}

/// Unbiased sample covariance of already-centered rows.
///
/// With fewer than two rows there is no variance to estimate; the
/// result is the zero matrix and the caller is expected to floor its
/// eigenvalues.
pub fn covariance(centered: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = centered.len();
    let d = centered.first().map_or(0, Vec::len);
    let mut cov = vec![vec![0.0; d]; d];
    if n < 2 {
        return cov;
    }
    for row in centered {
        for i in 0..d {
            let ri = row[i];
            for j in i..d {
                cov[i][j] += ri * row[j];
            }
        }
    }
    let inv = 1.0 / ((n - 1) as f64);
    for i in 0..d {
        for j in i..d {
            cov[i][j] *= inv;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

/// Matrix-vector product `m · v`.
pub fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

/// Row-vector-matrix product `vᵀ · m`. This is how a transform is
/// applied to a single embedding stored as a row.
pub fn vec_mat(v: &[f64], m: &[Vec<f64>]) -> Vec<f64> {
    let d = m.first().map_or(0, Vec::len);
    let mut out = vec![0.0; d];
    for (vi, row) in v.iter().zip(m.iter()) {
        if *vi == 0.0 {
            continue;
        }
        for (o, x) in out.iter_mut().zip(row.iter()) {
            *o += vi * x;
        }
    }
    out
}

/// Matrix product `a · b`.
pub fn mat_mul(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = a.len();
    let inner = b.len();
    let cols = b.first().map_or(0, Vec::len);
    let mut out = vec![vec![0.0; cols]; rows];
    for (out_row, a_row) in out.iter_mut().zip(a.iter()) {
        for k in 0..inner {
            let aik = a_row[k];
            if aik == 0.0 {
                continue;
            }
            for (o, bkj) in out_row.iter_mut().zip(b[k].iter()) {
                *o += aik * bkj;
            }
        }
    }
    out
}

/// Transpose of a rectangular matrix.
pub fn transpose(m: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = m.len();
    let cols = m.first().map_or(0, Vec::len);
    let mut out = vec![vec![0.0; rows]; cols];
    for (i, row) in m.iter().enumerate() {
        for (j, x) in row.iter().enumerate() {
            out[j][i] = *x;
        }
    }
    out
}

/// The `n x n` identity matrix.
pub fn identity(n: usize) -> Vec<Vec<f64>> {
    let mut out = vec![vec![0.0; n]; n];
    for (i, row) in out.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    out
}

/// Eigendecomposition of a real symmetric matrix.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues in descending order.
    pub eigenvalues: Vec<f64>,
    /// Unit eigenvectors, index-aligned with `eigenvalues`.
    pub eigenvectors: Vec<Vec<f64>>,
}

/// Full eigendecomposition of a symmetric matrix via cyclic Jacobi
/// rotations.
///
/// Whitening needs the complete eigenbasis, not just the dominant
/// directions, which is why this exists alongside the power method.
/// Jacobi is slow in the asymptotic sense but unconditionally stable
/// on symmetric input, and the matrices here are at most a few hundred
/// wide.
pub fn symmetric_eigen(matrix: &[Vec<f64>]) -> AnalysisResult<SymmetricEigen> {
    let n = matrix.len();
    if n == 0 {
        return Err(AnalysisError::empty_batch(
            "eigendecomposition of an empty matrix",
        ));
    }
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut v = identity(n);

    let frobenius: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();
    let tolerance = (frobenius * 1e-12).max(f64::MIN_POSITIVE);

    let mut remaining = MAX_JACOBI_SWEEPS;
    while off_diagonal_norm(&a) > tolerance {
        if remaining == 0 {
            return Err(AnalysisError::EigenNonConvergence {
                sweeps: MAX_JACOBI_SWEEPS,
            });
        }
        remaining -= 1;
        for p in 0..n {
            for q in (p + 1)..n {
                jacobi_rotate(&mut a, &mut v, p, q);
            }
        }
    }

    let mut pairs: Vec<(f64, Vec<f64>)> = (0..n)
        .map(|j| (a[j][j], (0..n).map(|i| v[i][j]).collect()))
        .collect();
    pairs.sort_by(|x, y| y.0.total_cmp(&x.0));

    Ok(SymmetricEigen {
        eigenvalues: pairs.iter().map(|(val, _)| *val).collect(),
        eigenvectors: pairs.into_iter().map(|(_, vec)| vec).collect(),
    })
}

fn off_diagonal_norm(a: &[Vec<f64>]) -> f64 {
    let n = a.len();
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += a[i][j] * a[i][j];
        }
    }
    (2.0 * sum).sqrt()
}

/// One two-sided Jacobi rotation zeroing `a[p][q]`, accumulated into
/// the eigenvector matrix `v`.
fn jacobi_rotate(a: &mut [Vec<f64>], v: &mut [Vec<f64>], p: usize, q: usize) {
    let apq = a[p][q];
    if apq.abs() <= f64::MIN_POSITIVE {
        return;
    }
    let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;
    let n = a.len();
    // A ← A·J on columns p, q.
    for row in a.iter_mut() {
        let akp = row[p];
        let akq = row[q];
        row[p] = c * akp - s * akq;
        row[q] = s * akp + c * akq;
    }
    // A ← Jᵗ·A on rows p, q.
    for k in 0..n {
        let apk = a[p][k];
        let aqk = a[q][k];
        a[p][k] = c * apk - s * aqk;
        a[q][k] = s * apk + c * aqk;
    }
    // V ← V·J collects eigenvectors in the columns.
    for row in v.iter_mut() {
        let vkp = row[p];
        let vkq = row[q];
        row[p] = c * vkp - s * vkq;
        row[q] = s * vkp + c * vkq;
    }
}

/// Singular value decomposition of a square matrix.
#[derive(Debug, Clone)]
pub struct Svd {
    /// Left singular vectors, one per entry, index-aligned with
    /// `singular_values`. Each is a column of U.
    pub u: Vec<Vec<f64>>,
    /// Singular values in descending order.
    pub singular_values: Vec<f64>,
    /// Right singular vectors, one per entry. Each is a column of V in
    /// `m = U · Σ · Vᵗ`.
    pub v: Vec<Vec<f64>>,
}

impl Svd {
    /// Ratio of smallest to largest singular value; 0 when rank
    /// deficient, 1 for a perfectly conditioned (orthogonal) matrix.
    pub fn condition(&self) -> f64 {
        match (self.singular_values.first(), self.singular_values.last()) {
            (Some(max), Some(min)) if *max > 0.0 => min / max,
            _ => 0.0,
        }
    }
}

/// SVD of a square matrix via one-sided Jacobi.
///
/// Right rotations orthogonalize the columns of a working copy until
/// it equals `U · Σ`; the accumulated rotations are exactly V. Used on
/// the `d x d` cross-covariance matrix when fitting the rotation
/// between two embedding spaces.
pub fn svd(matrix: &[Vec<f64>]) -> AnalysisResult<Svd> {
    let n = matrix.len();
    if n == 0 {
        return Err(AnalysisError::empty_batch("svd of an empty matrix"));
    }
    let mut g: Vec<Vec<f64>> = matrix.to_vec();
    let mut v = identity(n);

    let mut remaining = MAX_JACOBI_SWEEPS;
    loop {
        let mut rotated = false;
        for p in 0..n {
            for q in (p + 1)..n {
                let mut alpha = 0.0;
                let mut beta = 0.0;
                let mut gamma = 0.0;
                for row in g.iter() {
                    alpha += row[p] * row[p];
                    beta += row[q] * row[q];
                    gamma += row[p] * row[q];
                }
                let scale = (alpha * beta).sqrt().max(f64::MIN_POSITIVE);
                if gamma.abs() <= 1e-14 * scale {
                    continue;
                }
                rotated = true;
                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = zeta.signum() / (zeta.abs() + (zeta * zeta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for row in g.iter_mut() {
                    let gkp = row[p];
                    let gkq = row[q];
                    row[p] = c * gkp - s * gkq;
                    row[q] = s * gkp + c * gkq;
                }
                for row in v.iter_mut() {
                    let vkp = row[p];
                    let vkq = row[q];
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
        if !rotated {
            break;
        }
        if remaining == 0 {
            return Err(AnalysisError::EigenNonConvergence {
                sweeps: MAX_JACOBI_SWEEPS,
            });
        }
        remaining -= 1;
    }

    let mut triples: Vec<(f64, Vec<f64>, Vec<f64>)> = Vec::with_capacity(n);
    for j in 0..n {
        let column: Vec<f64> = (0..n).map(|i| g[i][j]).collect();
        let sigma = l2_norm(&column);
        let u_col = if sigma > 1e-12 {
            column.iter().map(|x| x / sigma).collect()
        } else {
            // Rank-deficient direction; callers must check condition()
            // before trusting U here.
            vec![0.0; n]
        };
        let v_col: Vec<f64> = (0..n).map(|i| v[i][j]).collect();
        triples.push((sigma, u_col, v_col));
    }
    triples.sort_by(|x, y| y.0.total_cmp(&x.0));

    let mut u = Vec::with_capacity(n);
    let mut singular_values = Vec::with_capacity(n);
    let mut v_cols = Vec::with_capacity(n);
    for (sigma, u_col, v_col) in triples {
        singular_values.push(sigma);
        u.push(u_col);
        v_cols.push(v_col);
    }
    Ok(Svd {
        u,
        singular_values,
        v: v_cols,
    })
}

/// Top principal directions of a centered batch, by power iteration
/// with deflation.
///
/// Returns at most `count` unit vectors, fewer when the residual
/// variance runs out first. The start vector is fixed, so the output
/// is a pure function of the input batch.
pub fn top_principal_components(centered: &[Vec<f64>], count: usize) -> Vec<Vec<f64>> {
    if count == 0 || centered.is_empty() {
        return Vec::new();
    }
    let mut cov = covariance(centered);
    let d = cov.len();
    let mut components = Vec::with_capacity(count);
    for _ in 0..count {
        let Some((direction, variance)) = dominant_eigenpair(&cov) else {
            break;
        };
        if variance <= 1e-12 {
            break;
        }
        for i in 0..d {
            for j in 0..d {
                cov[i][j] -= variance * direction[i] * direction[j];
            }
        }
        components.push(direction);
    }
    components
}

fn dominant_eigenpair(matrix: &[Vec<f64>]) -> Option<(Vec<f64>, f64)> {
    let d = matrix.len();
    if d == 0 {
        return None;
    }
    let mut vector = vec![1.0 / (d as f64).sqrt(); d];
    for _ in 0..POWER_ITERATIONS {
        let mut next = mat_vec(matrix, &vector);
        if !normalize_mut(&mut next) {
            return None;
        }
        vector = next;
    }
    let rayleigh = dot(&vector, &mat_vec(matrix, &vector));
    Some((vector, rayleigh))
}
