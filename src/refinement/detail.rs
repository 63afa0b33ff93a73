//! Univariate refinement operators.
//!
//! Every operator maps the coefficients of a 1D B-spline basis to the coefficients of a refined
//! basis spanning a superset of functions: if `c` are the old coefficients, `T c` are the new
//! ones and represent the same function. Operators are returned as `(new knots, T)` with `T`
//! of size `new_number x old_number`.
use crate::error::IgaError;
use crate::space::knots::{basis_functions, KnotVector, KNOT_TOLERANCE};
use crate::util::dense_to_csr;
use itertools::Itertools;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use ordered_float::NotNan;

/// The dense matrix of a single knot insertion (Boehm's algorithm).
pub fn knot_insertion_matrix(knots: &KnotVector, order: usize, knot: f64) -> DMatrix<f64> {
    let n = knots.number_of_functions(order);
    let k = knots.find_span(knot, order);
    let p = order;
    let mut a = DMatrix::zeros(n + 1, n);
    for i in 0..=n {
        if i + p <= k {
            a[(i, i)] = 1.0;
        } else if i > k {
            a[(i, i - 1)] = 1.0;
        } else {
            let alpha = (knot - knots[i]) / (knots[i + p] - knots[i]);
            a[(i, i)] = alpha;
            a[(i, i - 1)] = 1.0 - alpha;
        }
    }
    a
}

/// Inserts all given knots and returns the refined knot vector with the composed operator.
///
/// Knots are validated before anything is computed: each must lie strictly inside the domain,
/// and no knot may end up with a multiplicity above `order + 1`. Knots within
/// [`KNOT_TOLERANCE`] of an existing knot are snapped to it.
pub fn knot_insertion_operator(
    knots: &KnotVector,
    order: usize,
    new_knots: &[f64],
) -> Result<(KnotVector, CsrMatrix<f64>), IgaError> {
    let (a, b) = knots.domain();
    let validated = new_knots
        .iter()
        .map(|&knot| {
            let not_nan = NotNan::new(knot).map_err(|_| IgaError::InvalidKnot {
                knot,
                reason: "the knot is not a number",
            })?;
            if knot > a + KNOT_TOLERANCE && knot < b - KNOT_TOLERANCE {
                Ok(not_nan)
            } else {
                Err(IgaError::InvalidKnot {
                    knot,
                    reason: "the knot is not strictly inside the domain",
                })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut refined = knots.clone();
    for knot in validated.into_iter().sorted() {
        let knot = refined.snap(knot.into_inner());
        if refined.multiplicity(knot) + 1 > order + 1 {
            return Err(IgaError::InvalidKnot {
                knot,
                reason: "the knot multiplicity would exceed order + 1",
            });
        }
        refined = refined.with_inserted(knot);
    }

    let mut t = DMatrix::identity(knots.number_of_functions(order), knots.number_of_functions(order));
    let mut current = knots.clone();
    for k in refined.as_slice() {
        // Walk the refined knots and insert whatever the current vector is missing.
        if current.multiplicity(*k) < refined.multiplicity(*k) {
            t = knot_insertion_matrix(&current, order, *k) * t;
            current = current.with_inserted(*k);
        }
    }
    Ok((refined, dense_to_csr(&t)))
}

/// Elevates the order by `increment` and returns the new knot vector with the operator.
///
/// Every distinct knot has its multiplicity raised by `increment`, which keeps the continuity
/// at each knot unchanged. The operator is found by collocating the old basis in the new one
/// at `order + increment + 1` points per non-empty span and solving the normal equations.
pub fn degree_elevation_operator(
    knots: &KnotVector,
    order: usize,
    increment: usize,
) -> Result<(KnotVector, CsrMatrix<f64>), IgaError> {
    let n_old = knots.number_of_functions(order);
    if increment == 0 {
        return Ok((knots.clone(), CsrMatrix::identity(n_old)));
    }
    let new_order = order + increment;
    let unique = knots.unique_knots();
    let elevated: Vec<f64> = unique
        .iter()
        .flat_map(|&(k, m)| std::iter::repeat(k).take(m + increment))
        .collect();
    let elevated = KnotVector::new(elevated)?;
    let n_new = elevated.number_of_functions(new_order);

    let points: Vec<f64> = unique
        .windows(2)
        .flat_map(|w| {
            let (lo, hi) = (w[0].0, w[1].0);
            (0..=new_order).map(move |j| lo + (hi - lo) * (j + 1) as f64 / (new_order + 2) as f64)
        })
        .collect();

    let mut new_basis = DMatrix::zeros(points.len(), n_new);
    let mut old_basis = DMatrix::zeros(points.len(), n_old);
    for (row, &u) in points.iter().enumerate() {
        let span = elevated.find_span(u, new_order);
        for (j, value) in basis_functions(&elevated, span, u, new_order).into_iter().enumerate() {
            new_basis[(row, span - new_order + j)] = value;
        }
        let span = knots.find_span(u, order);
        for (j, value) in basis_functions(knots, span, u, order).into_iter().enumerate() {
            old_basis[(row, span - order + j)] = value;
        }
    }

    let normal_matrix = new_basis.transpose() * &new_basis;
    let rhs = new_basis.transpose() * &old_basis;
    let cholesky = normal_matrix.cholesky().ok_or_else(|| {
        IgaError::InvalidKnotVector(format!(
            "collocation system for degree elevation of {:?} is singular",
            knots.as_slice()
        ))
    })?;
    let t = cholesky.solve(&rhs);
    Ok((elevated, dense_to_csr(&t)))
}

/// Splits the knot vector into Bezier segments.
///
/// Raises every interior knot to multiplicity `max(order, 1)` and returns the resulting knot
/// vector with the corresponding knot insertion operator.
pub fn bezier_decomposition(knots: &KnotVector, order: usize) -> Result<(KnotVector, CsrMatrix<f64>), IgaError> {
    let target = order.max(1);
    let unique = knots.unique_knots();
    let interior = unique.len().saturating_sub(1);
    let new_knots: Vec<f64> = unique
        .iter()
        .take(interior)
        .skip(1)
        .flat_map(|&(k, m)| std::iter::repeat(k).take(target.saturating_sub(m)))
        .collect();
    knot_insertion_operator(knots, order, &new_knots)
}
