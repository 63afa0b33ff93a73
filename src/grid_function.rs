//! Fields over function spaces.
//!
//! A patch stores its control grids in a single name-keyed map of [`ControlGridData`], which
//! tags each grid with the type of its values. Typed access goes through [`GridValue`].
//! A [`GridFunction`] pairs one of these grids with the patch's function space for evaluation.
use crate::control::{ControlGrid, ControlPoint, ControlValue};
use crate::space::FunctionSpace;
use nalgebra::{DVector, DimName, Vector3};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

/// Name of the mandatory control point grid of every patch.
pub const CONTROL_POINT: &str = "CONTROL_POINT";

/// A field over a function space, evaluated as `value(xi) = sum_i R_i(xi) * c_i`.
///
/// If weights are given, `R_i` are the rational basis functions `N_i w_i / sum_j N_j w_j`;
/// otherwise they are the plain basis functions of the space.
#[derive(Debug, Clone)]
pub struct GridFunction<'a, D: DimName, T> {
    space: &'a dyn FunctionSpace<D>,
    weights: Option<Vec<f64>>,
    grid: &'a ControlGrid<T>,
}

impl<'a, D: DimName, T: ControlValue> GridFunction<'a, D, T> {
    /// # Panics
    ///
    /// Panics if the grid size differs from the number of functions in the space.
    pub fn new(space: &'a dyn FunctionSpace<D>, grid: &'a ControlGrid<T>) -> Self {
        assert_eq!(space.total_number(), grid.len(), "grid does not match space");
        Self {
            space,
            weights: None,
            grid,
        }
    }

    /// # Panics
    ///
    /// Panics if the grid size or the number of weights differs from the number of functions
    /// in the space.
    pub fn weighted(space: &'a dyn FunctionSpace<D>, weights: Vec<f64>, grid: &'a ControlGrid<T>) -> Self {
        assert_eq!(space.total_number(), grid.len(), "grid does not match space");
        assert_eq!(space.total_number(), weights.len(), "weights do not match space");
        Self {
            space,
            weights: Some(weights),
            grid,
        }
    }

    pub fn space(&self) -> &'a dyn FunctionSpace<D> {
        self.space
    }

    pub fn control_grid(&self) -> &'a ControlGrid<T> {
        self.grid
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// The non-zero (possibly rational) basis values at `xi`.
    pub fn basis_values(&self, xi: &[f64]) -> Vec<(usize, f64)> {
        let values = self.space.basis_values(xi);
        match &self.weights {
            None => values,
            Some(weights) => {
                let denominator: f64 = values.iter().map(|&(i, n)| n * weights[i]).sum();
                values
                    .into_iter()
                    .map(|(i, n)| (i, n * weights[i] / denominator))
                    .collect()
            }
        }
    }

    pub fn evaluate(&self, xi: &[f64]) -> T {
        let values = self.grid.values();
        let mut result = values[0].zero_like();
        for (i, r) in self.basis_values(xi) {
            result.add_scaled(r, &values[i]);
        }
        result
    }

    /// Parametric derivatives of the field at `xi`, one per parametric direction.
    pub fn gradient(&self, xi: &[f64]) -> Vec<T> {
        let values = self.grid.values();
        let zero = values[0].zero_like();
        let mut gradient = vec![zero; D::dim()];
        let basis = self.space.basis_gradients(xi);
        match &self.weights {
            None => {
                for (i, _, dn) in basis {
                    for (g, &dn_k) in gradient.iter_mut().zip(&dn) {
                        g.add_scaled(dn_k, &values[i]);
                    }
                }
            }
            Some(weights) => {
                let w: f64 = basis.iter().map(|(i, n, _)| n * weights[*i]).sum();
                let dw: Vec<f64> = (0..D::dim())
                    .map(|k| basis.iter().map(|(i, _, dn)| dn[k] * weights[*i]).sum())
                    .collect();
                for (i, n, dn) in &basis {
                    for (k, g) in gradient.iter_mut().enumerate() {
                        let dr = weights[*i] * (dn[k] * w - n * dw[k]) / (w * w);
                        g.add_scaled(dr, &values[*i]);
                    }
                }
            }
        }
        gradient
    }
}

/// A control grid tagged with the type of its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlGridData {
    Double(ControlGrid<f64>),
    Array3(ControlGrid<Vector3<f64>>),
    Vector(ControlGrid<DVector<f64>>),
    ControlPoint(ControlGrid<ControlPoint>),
}

macro_rules! dispatch {
    ($data:expr, $grid:ident => $body:expr) => {
        match $data {
            ControlGridData::Double($grid) => $body,
            ControlGridData::Array3($grid) => $body,
            ControlGridData::Vector($grid) => $body,
            ControlGridData::ControlPoint($grid) => $body,
        }
    };
}

macro_rules! dispatch_map {
    ($data:expr, $grid:ident => $body:expr) => {
        match $data {
            ControlGridData::Double($grid) => ControlGridData::Double($body),
            ControlGridData::Array3($grid) => ControlGridData::Array3($body),
            ControlGridData::Vector($grid) => ControlGridData::Vector($body),
            ControlGridData::ControlPoint($grid) => ControlGridData::ControlPoint($body),
        }
    };
}

impl ControlGridData {
    pub fn name(&self) -> &str {
        dispatch!(self, grid => grid.name())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, grid => grid.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_structured(&self) -> bool {
        dispatch!(self, grid => grid.is_structured())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Double(_) => <f64 as GridValue>::TYPE_NAME,
            Self::Array3(_) => <Vector3<f64> as GridValue>::TYPE_NAME,
            Self::Vector(_) => <DVector<f64> as GridValue>::TYPE_NAME,
            Self::ControlPoint(_) => <ControlPoint as GridValue>::TYPE_NAME,
        }
    }

    pub fn reverse(&mut self, axis: usize) -> Result<(), crate::error::IgaError> {
        dispatch!(self, grid => grid.reverse(axis))
    }

    /// Transforms the grid for a refined space.
    ///
    /// Control points are transformed directly in homogeneous coordinates. All other fields
    /// are transformed in weighted form with the old and new control weights.
    pub fn refine(
        &self,
        t: &CsrMatrix<f64>,
        old_weights: &[f64],
        new_weights: &[f64],
        shape: Option<Vec<usize>>,
    ) -> Self {
        match self {
            Self::ControlPoint(grid) => Self::ControlPoint(grid.transform(t, shape)),
            other => dispatch_map!(other, grid => grid.transform_weighted(t, old_weights, new_weights, shape.clone())),
        }
    }

    pub fn sub_grid(&self, local_ids: &[usize], shape: Option<Vec<usize>>) -> Self {
        dispatch_map!(self, grid => grid.sub_grid(local_ids, shape.clone()))
    }
}

/// Value types that may be stored in a patch's grid-function map.
pub trait GridValue: ControlValue + Sized + 'static {
    const TYPE_NAME: &'static str;

    fn grid(data: &ControlGridData) -> Option<&ControlGrid<Self>>;

    fn grid_mut(data: &mut ControlGridData) -> Option<&mut ControlGrid<Self>>;

    fn wrap(grid: ControlGrid<Self>) -> ControlGridData;
}

macro_rules! impl_grid_value {
    ($type:ty, $variant:ident, $name:expr) => {
        impl GridValue for $type {
            const TYPE_NAME: &'static str = $name;

            fn grid(data: &ControlGridData) -> Option<&ControlGrid<Self>> {
                match data {
                    ControlGridData::$variant(grid) => Some(grid),
                    _ => None,
                }
            }

            fn grid_mut(data: &mut ControlGridData) -> Option<&mut ControlGrid<Self>> {
                match data {
                    ControlGridData::$variant(grid) => Some(grid),
                    _ => None,
                }
            }

            fn wrap(grid: ControlGrid<Self>) -> ControlGridData {
                ControlGridData::$variant(grid)
            }
        }
    };
}

impl_grid_value!(f64, Double, "double");
impl_grid_value!(Vector3<f64>, Array3, "array_1d<double, 3>");
impl_grid_value!(DVector<f64>, Vector, "vector");
impl_grid_value!(ControlPoint, ControlPoint, "control point");
