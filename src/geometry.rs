//! Geometry of analysis entities built from Bezier cells.
use crate::error::IgaError;
use crate::util::multi_indices;
use nalgebra_sparse::CsrMatrix;

/// Bezier extraction representation of one NURBS cell.
///
/// `bounds` are the parametric intervals of the cell, `weights` the control weights of the
/// supported functions in local order, and `extraction_operator` the matrix `C` with
/// `N_a = sum_b C[a, b] B_b` (see [`crate::cells`]).
#[derive(Debug, Clone, PartialEq)]
pub struct BezierGeometryData {
    pub bounds: Vec<(f64, f64)>,
    pub weights: Vec<f64>,
    pub extraction_operator: CsrMatrix<f64>,
    pub orders: Vec<usize>,
    pub num_integration_methods: usize,
}

/// A geometry whose shape functions are defined through Bezier extraction.
///
/// Local coordinates refer to the reference cell `[0, 1]^D`. Evaluating shape functions
/// before geometry data has been assigned is a programming error and panics.
pub trait IsogeometricGeometry {
    fn assign_geometry_data(&mut self, data: BezierGeometryData) -> Result<(), IgaError>;

    /// Values of all shape functions at the local coordinate `xi`.
    fn shape_function_values(&self, xi: &[f64]) -> Vec<f64>;

    /// Gradients of all shape functions with respect to the local coordinates at `xi`.
    fn shape_function_local_gradients(&self, xi: &[f64]) -> Vec<Vec<f64>>;
}

/// Bernstein polynomials of degree `order` and their derivatives at `t`.
pub fn bernstein_basis(order: usize, t: f64) -> (Vec<f64>, Vec<f64>) {
    let mut values = vec![1.0];
    let mut lower = Vec::new();
    for q in 1..=order {
        let mut next = vec![0.0; q + 1];
        for (i, &b) in values.iter().enumerate() {
            next[i] += (1.0 - t) * b;
            next[i + 1] += t * b;
        }
        lower = std::mem::replace(&mut values, next);
    }
    let p = order as f64;
    let derivatives = (0..=order)
        .map(|i| {
            if order == 0 {
                return 0.0;
            }
            let left = if i > 0 { lower[i - 1] } else { 0.0 };
            let right = if i < order { lower[i] } else { 0.0 };
            p * (left - right)
        })
        .collect();
    (values, derivatives)
}

/// Rational shape functions of a Bezier cell.
#[derive(Debug, Clone, Default)]
pub struct BezierGeometry {
    data: Option<BezierGeometryData>,
}

impl BezierGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> Option<&BezierGeometryData> {
        self.data.as_ref()
    }

    pub fn number_of_shape_functions(&self) -> usize {
        self.data.as_ref().map_or(0, |data| data.weights.len())
    }

    fn data_or_panic(&self) -> &BezierGeometryData {
        self.data
            .as_ref()
            .expect("geometry data must be assigned before evaluating shape functions")
    }

    /// Tensor Bernstein values and gradients at `xi`, first direction fastest.
    fn bernstein(&self, xi: &[f64]) -> (Vec<f64>, Vec<Vec<f64>>) {
        let data = self.data_or_panic();
        assert_eq!(xi.len(), data.orders.len(), "local point has wrong dimension");
        let univariate: Vec<_> = data
            .orders
            .iter()
            .zip(xi)
            .map(|(&p, &t)| bernstein_basis(p, t))
            .collect();
        let shape: Vec<usize> = data.orders.iter().map(|p| p + 1).collect();
        let dim = shape.len();
        multi_indices(&shape)
            .map(|index| {
                let value = (0..dim).map(|d| univariate[d].0[index[d]]).product::<f64>();
                let gradient = (0..dim)
                    .map(|k| {
                        (0..dim)
                            .map(|d| {
                                if d == k {
                                    univariate[d].1[index[d]]
                                } else {
                                    univariate[d].0[index[d]]
                                }
                            })
                            .product::<f64>()
                    })
                    .collect::<Vec<f64>>();
                (value, gradient)
            })
            .unzip()
    }

    /// Applies the extraction operator to a quantity given per Bernstein function.
    fn extract(&self, bernstein: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let components = bernstein.first().map_or(0, Vec::len);
        self.data_or_panic()
            .extraction_operator
            .row_iter()
            .map(|row| {
                let mut result = vec![0.0; components];
                for (&b, &c) in row.col_indices().iter().zip(row.values()) {
                    for (r, &v) in result.iter_mut().zip(&bernstein[b]) {
                        *r += c * v;
                    }
                }
                result
            })
            .collect()
    }

    /// B-spline values on the cell, before weighting.
    fn spline_values(&self, bernstein_values: Vec<f64>) -> Vec<f64> {
        let columns: Vec<Vec<f64>> = bernstein_values.into_iter().map(|v| vec![v]).collect();
        self.extract(&columns).into_iter().map(|v| v[0]).collect()
    }
}

impl IsogeometricGeometry for BezierGeometry {
    fn assign_geometry_data(&mut self, data: BezierGeometryData) -> Result<(), IgaError> {
        let num_bernstein: usize = data.orders.iter().map(|p| p + 1).product();
        let checks = [
            (data.orders.len(), data.bounds.len()),
            (data.weights.len(), data.extraction_operator.nrows()),
            (num_bernstein, data.extraction_operator.ncols()),
        ];
        for (expected, found) in checks {
            if expected != found {
                return Err(IgaError::DimensionMismatch { expected, found });
            }
        }
        self.data = Some(data);
        Ok(())
    }

    fn shape_function_values(&self, xi: &[f64]) -> Vec<f64> {
        let (values, _) = self.bernstein(xi);
        let n = self.spline_values(values);
        let weights = &self.data_or_panic().weights;
        let w: f64 = n.iter().zip(weights).map(|(n, w)| n * w).sum();
        n.iter()
            .zip(weights)
            .map(|(n, weight)| n * weight / w)
            .collect()
    }

    fn shape_function_local_gradients(&self, xi: &[f64]) -> Vec<Vec<f64>> {
        let dim = xi.len();
        let (values, gradients) = self.bernstein(xi);
        let n = self.spline_values(values);
        let dn = self.extract(&gradients);

        let weights = &self.data_or_panic().weights;
        let w: f64 = n.iter().zip(weights).map(|(n, w)| n * w).sum();
        let dw: Vec<f64> = (0..dim)
            .map(|k| dn.iter().zip(weights).map(|(dn, w)| dn[k] * w).sum())
            .collect();
        n.iter()
            .zip(&dn)
            .zip(weights)
            .map(|((&n_a, dn_a), &w_a)| {
                (0..dim)
                    .map(|k| w_a * (dn_a[k] * w - n_a * dw[k]) / (w * w))
                    .collect()
            })
            .collect()
    }
}
