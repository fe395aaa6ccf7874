//! Dense ridge regression via Cholesky factorization of the normal equations

use std::time::Instant;

use super::ForecastError;

/// Pivots below this are treated as a rank-deficient system
const PIVOT_FLOOR: f64 = 1e-12;

/// Cooperative deadline checked inside long numeric loops
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub const fn new(at: Option<Instant>) -> Self {
        Self(at)
    }

    pub fn check(self) -> Result<(), ForecastError> {
        match self.0 {
            Some(at) if Instant::now() >= at => Err(ForecastError::Timeout),
            _ => Ok(()),
        }
    }
}

/// Solve `min ||Xβ - y||² + Σ λ_j β_j²` for β.
///
/// `rows` are the design-matrix rows; `penalties[j]` is λ_j (0 leaves a
/// coefficient unpenalized).
pub fn solve_ridge(
    rows: &[Vec<f64>],
    y: &[f64],
    penalties: &[f64],
    deadline: Deadline,
) -> Result<Vec<f64>, ForecastError> {
    let p = penalties.len();
    let mut ata = vec![vec![0.0; p]; p];
    let mut aty = vec![0.0; p];

    for (row, &target) in rows.iter().zip(y) {
        deadline.check()?;
        for i in 0..p {
            let ri = row[i];
            if ri == 0.0 {
                continue;
            }
            aty[i] += ri * target;
            for j in 0..=i {
                ata[i][j] += ri * row[j];
            }
        }
    }
    for i in 0..p {
        for j in 0..i {
            ata[j][i] = ata[i][j];
        }
        ata[i][i] += penalties[i];
    }

    let l = cholesky(&ata, deadline)?;
    Ok(back_substitute(&l, &forward_substitute(&l, &aty)))
}

/// Lower-triangular L with `L Lᵀ = A` for symmetric positive-definite A.
fn cholesky(a: &[Vec<f64>], deadline: Deadline) -> Result<Vec<Vec<f64>>, ForecastError> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        deadline.check()?;
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let pivot = a[i][i] - sum;
                if !pivot.is_finite() || pivot <= PIVOT_FLOOR {
                    return Err(ForecastError::SingularSystem);
                }
                l[i][j] = pivot.sqrt();
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }
    Ok(l)
}

/// Solve `L z = b`
fn forward_substitute(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut z = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|k| l[i][k] * z[k]).sum();
        z[i] = (b[i] - sum) / l[i][i];
    }
    z
}

/// Solve `Lᵀ x = z`
fn back_substitute(l: &[Vec<f64>], z: &[f64]) -> Vec<f64> {
    let n = z.len();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|k| l[k][i] * x[k]).sum();
        x[i] = (z[i] - sum) / l[i][i];
    }
    x
}
