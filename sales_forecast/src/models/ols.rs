//! Ridge-stabilised least squares on a dense design matrix

use crate::error::{ForecastError, Result};

/// Solve `(X'X + ridge * P) beta = X'y` where `P` penalises every column
/// except those listed in `unpenalized`.
///
/// `design` is row-major: one inner vector per observation.
pub fn ridge_fit(
    design: &[Vec<f64>],
    y: &[f64],
    ridge: f64,
    unpenalized: &[usize],
) -> Result<Vec<f64>> {
    let n = y.len();
    if design.len() != n {
        return Err(ForecastError::MathError(format!(
            "Design matrix has {} rows for {} observations",
            design.len(),
            n
        )));
    }
    let k = design.first().map(|row| row.len()).unwrap_or(0);
    if n == 0 || k == 0 {
        return Err(ForecastError::MathError("Empty design matrix".to_string()));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];

    for (row, &target) in design.iter().zip(y) {
        if row.len() != k {
            return Err(ForecastError::MathError(format!(
                "Ragged design matrix: expected {} columns, got {}",
                k,
                row.len()
            )));
        }
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in 0..=i {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
        // Tiny jitter keeps unpenalised columns positive definite
        xtx[i][i] += if unpenalized.contains(&i) { 1e-10 } else { ridge + 1e-10 };
    }

    solve_symmetric(&xtx, &xty).ok_or_else(|| {
        ForecastError::MathError("Normal equations are not positive definite".to_string())
    })
}

/// Solve symmetric positive definite system using Cholesky decomposition.
///
/// Solves A @ x = b where A is symmetric positive definite.
pub fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    // A = L @ L'
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // L @ y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // L' @ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}
