use super::{Numeric, Precision};
use nalgebra::{DMatrix, DVector};

/// Largest absolute component, or zero for an empty vector.
pub fn max_norm<N: Numeric>(vector: &DVector<N>, precision: Precision) -> N {
    vector.iter().fold(N::zero(precision), |acc, value| {
        let magnitude = value.abs();
        if magnitude > acc { magnitude } else { acc }
    })
}

pub fn dot<N: Numeric>(a: &DVector<N>, b: &DVector<N>, precision: Precision) -> N {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .fold(N::zero(precision), |acc, (x, y)| acc + x.clone() * y.clone())
}

pub fn all_finite<N: Numeric>(vector: &DVector<N>) -> bool {
    vector.iter().all(Numeric::is_finite)
}

/// Solves `matrix * x = rhs` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot is exactly zero or any intermediate value is
/// non-finite.
pub fn solve_linear<N: Numeric>(mut matrix: DMatrix<N>, mut rhs: DVector<N>) -> Option<DVector<N>> {
    let n = rhs.len();
    if matrix.nrows() != n || matrix.ncols() != n {
        return None;
    }

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_magnitude = matrix[(col, col)].abs();
        for row in (col + 1)..n {
            let magnitude = matrix[(row, col)].abs();
            if magnitude > pivot_magnitude {
                pivot_row = row;
                pivot_magnitude = magnitude;
            }
        }
        if pivot_magnitude.is_zero() || !pivot_magnitude.is_finite() {
            return None;
        }
        if pivot_row != col {
            matrix.swap_rows(pivot_row, col);
            rhs.swap_rows(pivot_row, col);
        }

        let pivot = matrix[(col, col)].clone();
        for row in (col + 1)..n {
            if matrix[(row, col)].is_zero() {
                continue;
            }
            let factor = matrix[(row, col)].checked_div(&pivot)?;
            for k in col..n {
                let updated = matrix[(row, k)].clone() - factor.clone() * matrix[(col, k)].clone();
                matrix[(row, k)] = updated;
            }
            let updated = rhs[row].clone() - factor * rhs[col].clone();
            rhs[row] = updated;
        }
    }

    let mut solution = rhs.clone();
    for row in (0..n).rev() {
        let mut accumulator = rhs[row].clone();
        for k in (row + 1)..n {
            accumulator = accumulator - matrix[(row, k)].clone() * solution[k].clone();
        }
        solution[row] = accumulator.checked_div(&matrix[(row, row)])?;
    }

    all_finite(&solution).then_some(solution)
}
