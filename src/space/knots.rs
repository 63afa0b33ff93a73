//! Knot vectors and the univariate B-spline basis.
use crate::error::IgaError;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Absolute tolerance for comparing knot values.
pub const KNOT_TOLERANCE: f64 = 1e-10;

/// A non-decreasing sequence of knots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnotVector {
    knots: Vec<f64>,
}

impl KnotVector {
    pub fn new(knots: Vec<f64>) -> Result<Self, IgaError> {
        for &k in &knots {
            if !k.is_finite() {
                return Err(IgaError::InvalidKnotVector(format!("knot {k} is not finite")));
            }
        }
        if knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(IgaError::InvalidKnotVector(format!("knots are not non-decreasing: {knots:?}")));
        }
        Ok(Self { knots })
    }

    /// Open knot vector on `[0, 1]` with uniformly spaced interior knots, supporting
    /// `number` basis functions of the given order.
    pub fn uniform_open(number: usize, order: usize) -> Result<Self, IgaError> {
        if number < order + 1 {
            return Err(IgaError::InvalidOrder { order, number });
        }
        let num_spans = number - order;
        let mut knots = vec![0.0; order + 1];
        knots.extend((1..num_spans).map(|i| i as f64 / num_spans as f64));
        knots.extend(std::iter::repeat(1.0).take(order + 1));
        Ok(Self { knots })
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.knots
    }

    pub fn first(&self) -> Option<f64> {
        self.knots.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.knots.last().copied()
    }

    /// The interval spanned by the knots, `(first, last)`.
    ///
    /// # Panics
    ///
    /// Panics if the knot vector is empty.
    pub fn domain(&self) -> (f64, f64) {
        assert!(!self.is_empty(), "an empty knot vector has no domain");
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// Number of basis functions of the given order supported by this knot vector.
    pub fn number_of_functions(&self, order: usize) -> usize {
        self.knots.len().saturating_sub(order + 1)
    }

    /// Number of knots equal to `knot` up to [`KNOT_TOLERANCE`].
    pub fn multiplicity(&self, knot: f64) -> usize {
        self.knots
            .iter()
            .filter(|&&k| (k - knot).abs() <= KNOT_TOLERANCE)
            .count()
    }

    /// Distinct knot values together with their multiplicities.
    pub fn unique_knots(&self) -> Vec<(f64, usize)> {
        let mut unique: Vec<(f64, usize)> = Vec::new();
        for &k in &self.knots {
            match unique.last_mut() {
                Some((value, count)) if (k - *value).abs() <= KNOT_TOLERANCE => *count += 1,
                _ => unique.push((k, 1)),
            }
        }
        unique
    }

    /// Returns the existing knot within [`KNOT_TOLERANCE`] of `knot`, or `knot` itself.
    pub fn snap(&self, knot: f64) -> f64 {
        self.knots
            .iter()
            .copied()
            .find(|k| (k - knot).abs() <= KNOT_TOLERANCE)
            .unwrap_or(knot)
    }

    /// The knot vector mirrored within its own domain, `k -> first + last - k`.
    pub fn reversed(&self) -> Self {
        if self.is_empty() {
            return self.clone();
        }
        let (a, b) = self.domain();
        Self {
            knots: self.knots.iter().rev().map(|k| a + b - k).collect(),
        }
    }

    /// Mirrors a parameter value within the domain of this knot vector.
    pub fn reverse_parameter(&self, u: f64) -> f64 {
        let (a, b) = self.domain();
        self.snap(a + b - u)
    }

    /// Whether the first and last knots both have multiplicity at least `order + 1`.
    pub fn is_open(&self, order: usize) -> bool {
        let n = self.knots.len();
        n >= 2 * (order + 1)
            && self.knots[..=order].iter().all(|&k| k == self.knots[0])
            && self.knots[n - order - 1..].iter().all(|&k| k == self.knots[n - 1])
    }

    /// Index `k` of the knot span `[t_k, t_{k+1})` containing `u`, restricted to the spans that
    /// carry basis functions of the given order. The parameter is clamped to the domain.
    pub fn find_span(&self, u: f64, order: usize) -> usize {
        let n = self.number_of_functions(order);
        assert!(n > 0, "knot vector supports no basis functions of order {order}");
        let span = self.knots.partition_point(|&k| k <= u).saturating_sub(1);
        span.clamp(order, n - 1)
    }

    /// Returns a copy with `knot` inserted at its sorted position.
    pub(crate) fn with_inserted(&self, knot: f64) -> Self {
        let position = self.knots.partition_point(|&k| k <= knot);
        let mut knots = self.knots.clone();
        knots.insert(position, knot);
        Self { knots }
    }

    /// Approximate equality up to [`KNOT_TOLERANCE`].
    pub fn approx_eq(&self, other: &KnotVector) -> bool {
        self.len() == other.len()
            && self
                .knots
                .iter()
                .zip(&other.knots)
                .all(|(a, b)| (a - b).abs() <= KNOT_TOLERANCE)
    }
}

impl Index<usize> for KnotVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.knots[index]
    }
}

/// Values of all non-zero basis functions of degree `0..=order` at `u` in the given span.
///
/// Entry `q` holds the `q + 1` functions of degree `q` with indices `span - q ..= span`.
fn basis_table(knots: &[f64], span: usize, u: f64, order: usize) -> Vec<Vec<f64>> {
    let mut table = Vec::with_capacity(order + 1);
    let mut left = vec![0.0; order + 1];
    let mut right = vec![0.0; order + 1];
    table.push(vec![1.0]);
    for j in 1..=order {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let previous = &table[j - 1];
        let mut current = vec![0.0; j + 1];
        let mut saved = 0.0;
        for r in 0..j {
            let denominator = right[r + 1] + left[j - r];
            let temp = if denominator != 0.0 { previous[r] / denominator } else { 0.0 };
            current[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        current[j] = saved;
        table.push(current);
    }
    table
}

/// The `order + 1` basis functions that are non-zero on `span`, evaluated at `u`.
pub fn basis_functions(knots: &KnotVector, span: usize, u: f64, order: usize) -> Vec<f64> {
    basis_table(knots.as_slice(), span, u, order)
        .pop()
        .unwrap_or_default()
}

/// Like [`basis_functions`], but also returns the first derivatives.
pub fn basis_functions_and_derivatives(
    knots: &KnotVector,
    span: usize,
    u: f64,
    order: usize,
) -> (Vec<f64>, Vec<f64>) {
    let t = knots.as_slice();
    let mut table = basis_table(t, span, u, order);
    let values = table.pop().unwrap_or_default();
    let mut derivatives = vec![0.0; order + 1];
    if let Some(lower) = table.last().filter(|_| order > 0) {
        let p = order as f64;
        for (j, derivative) in derivatives.iter_mut().enumerate() {
            let i = span + j - order;
            let mut d = 0.0;
            if j >= 1 {
                let denominator = t[i + order] - t[i];
                if denominator != 0.0 {
                    d += lower[j - 1] / denominator;
                }
            }
            if j < order {
                let denominator = t[i + order + 1] - t[i + 1];
                if denominator != 0.0 {
                    d -= lower[j] / denominator;
                }
            }
            *derivative = p * d;
        }
    }
    (values, derivatives)
}
