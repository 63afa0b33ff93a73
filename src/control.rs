//! Control points and control grids.
use crate::error::IgaError;
use crate::util::reverse_along_axis;
use nalgebra::{DVector, Isometry3, Point3, Vector3, Vector4};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A NURBS control point stored in homogeneous coordinates `(w x, w y, w z, w)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    homogeneous: Vector4<f64>,
}

impl ControlPoint {
    /// Creates a control point from cartesian coordinates and a weight.
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self {
            homogeneous: Vector4::new(w * x, w * y, w * z, w),
        }
    }

    pub fn from_homogeneous(wx: f64, wy: f64, wz: f64, w: f64) -> Self {
        Self {
            homogeneous: Vector4::new(wx, wy, wz, w),
        }
    }

    pub fn from_point(point: &Point3<f64>, w: f64) -> Self {
        Self::new(point.x, point.y, point.z, w)
    }

    pub fn homogeneous(&self) -> &Vector4<f64> {
        &self.homogeneous
    }

    pub fn x(&self) -> f64 {
        self.homogeneous.x / self.homogeneous.w
    }

    pub fn y(&self) -> f64 {
        self.homogeneous.y / self.homogeneous.w
    }

    pub fn z(&self) -> f64 {
        self.homogeneous.z / self.homogeneous.w
    }

    pub fn w(&self) -> f64 {
        self.homogeneous.w
    }

    /// The cartesian position of the point.
    pub fn point(&self) -> Point3<f64> {
        Point3::new(self.x(), self.y(), self.z())
    }

    /// Moves the cartesian position by a rigid transformation, keeping the weight.
    pub fn apply_transformation(&mut self, transformation: &Isometry3<f64>) {
        let p = transformation * self.point();
        *self = Self::from_point(&p, self.w());
    }
}

/// Values that can be stored in a control grid and combined linearly by basis functions.
pub trait ControlValue: Clone + Debug + PartialEq + Send + Sync {
    /// A zero value with the same shape as `self`.
    fn zero_like(&self) -> Self;

    /// `self += alpha * other`
    fn add_scaled(&mut self, alpha: f64, other: &Self);

    fn scale(&mut self, alpha: f64);
}

impl ControlValue for f64 {
    fn zero_like(&self) -> Self {
        0.0
    }

    fn add_scaled(&mut self, alpha: f64, other: &Self) {
        *self += alpha * other;
    }

    fn scale(&mut self, alpha: f64) {
        *self *= alpha;
    }
}

impl ControlValue for Vector3<f64> {
    fn zero_like(&self) -> Self {
        Vector3::zeros()
    }

    fn add_scaled(&mut self, alpha: f64, other: &Self) {
        *self += alpha * other;
    }

    fn scale(&mut self, alpha: f64) {
        *self *= alpha;
    }
}

impl ControlValue for DVector<f64> {
    fn zero_like(&self) -> Self {
        DVector::zeros(self.len())
    }

    fn add_scaled(&mut self, alpha: f64, other: &Self) {
        self.axpy(alpha, other, 1.0);
    }

    fn scale(&mut self, alpha: f64) {
        *self *= alpha;
    }
}

/// Control points combine linearly in homogeneous space.
impl ControlValue for ControlPoint {
    fn zero_like(&self) -> Self {
        Self::from_homogeneous(0.0, 0.0, 0.0, 0.0)
    }

    fn add_scaled(&mut self, alpha: f64, other: &Self) {
        self.homogeneous += alpha * other.homogeneous;
    }

    fn scale(&mut self, alpha: f64) {
        self.homogeneous *= alpha;
    }
}

/// A named sequence of control values, indexed by local function id.
///
/// A structured grid also records its per-direction shape (first direction varying fastest),
/// which allows it to be reordered along a parametric axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlGrid<T> {
    name: String,
    values: Vec<T>,
    shape: Option<Vec<usize>>,
}

impl<T: ControlValue> ControlGrid<T> {
    pub fn structured(name: impl Into<String>, shape: Vec<usize>, values: Vec<T>) -> Result<Self, IgaError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(IgaError::InvalidArgument(format!(
                "a structured grid of shape {shape:?} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            values,
            shape: Some(shape),
        })
    }

    pub fn unstructured(name: impl Into<String>, values: Vec<T>) -> Self {
        Self {
            name: name.into(),
            values,
            shape: None,
        }
    }

    /// Structured grid with every entry set to `value`.
    pub fn filled(name: impl Into<String>, shape: Vec<usize>, value: T) -> Self {
        let n = shape.iter().product();
        Self {
            name: name.into(),
            values: vec![value; n],
            shape: Some(shape),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) {
        self.values[index] = value;
    }

    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    pub fn is_structured(&self) -> bool {
        self.shape.is_some()
    }

    /// Reverses the grid along a parametric axis.
    pub fn reverse(&mut self, axis: usize) -> Result<(), IgaError> {
        let shape = self
            .shape
            .as_ref()
            .ok_or_else(|| IgaError::UnstructuredGrid(self.name.clone()))?;
        if axis >= shape.len() {
            return Err(IgaError::DimensionMismatch {
                expected: shape.len(),
                found: axis + 1,
            });
        }
        reverse_along_axis(&mut self.values, shape, axis);
        Ok(())
    }

    /// Applies the linear transformation `new[i] = sum_j t[i, j] * old[j]`.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns of `t` differs from the grid size.
    pub fn transform(&self, t: &CsrMatrix<f64>, shape: Option<Vec<usize>>) -> Self {
        assert_eq!(t.ncols(), self.len(), "transformation does not match grid size");
        let values = match self.values.first() {
            Some(first) => {
                let zero = first.zero_like();
                t.row_iter()
                    .map(|row| {
                        let mut value = zero.clone();
                        for (&j, &t_ij) in row.col_indices().iter().zip(row.values()) {
                            value.add_scaled(t_ij, &self.values[j]);
                        }
                        value
                    })
                    .collect()
            }
            None => {
                assert_eq!(t.nrows(), 0, "cannot transform an empty grid into a non-empty one");
                Vec::new()
            }
        };
        Self {
            name: self.name.clone(),
            values,
            shape,
        }
    }

    /// Transforms the grid in weighted form: the old values are multiplied by `old_weights`,
    /// transformed, and divided by `new_weights`.
    ///
    /// This keeps a rational field unchanged under refinements that are exact for its
    /// homogeneous representation.
    pub fn transform_weighted(
        &self,
        t: &CsrMatrix<f64>,
        old_weights: &[f64],
        new_weights: &[f64],
        shape: Option<Vec<usize>>,
    ) -> Self {
        assert_eq!(old_weights.len(), self.len());
        assert_eq!(new_weights.len(), t.nrows());
        let weighted = Self {
            name: self.name.clone(),
            values: self
                .values
                .iter()
                .zip(old_weights)
                .map(|(v, &w)| {
                    let mut v = v.clone();
                    v.scale(w);
                    v
                })
                .collect(),
            shape: self.shape.clone(),
        };
        let mut result = weighted.transform(t, shape);
        for (v, &w) in result.values.iter_mut().zip(new_weights) {
            v.scale(1.0 / w);
        }
        result
    }

    /// The grid restricted to the given local ids, in the given order.
    pub fn sub_grid(&self, local_ids: &[usize], shape: Option<Vec<usize>>) -> Self {
        Self {
            name: self.name.clone(),
            values: local_ids
                .iter()
                .map(|&i| self.values[i].clone())
                .collect(),
            shape,
        }
    }
}

impl ControlGrid<ControlPoint> {
    /// `n` unit-weight control points evenly spaced on the segment from `start` to `end`.
    pub fn linear_control_points(start: &Point3<f64>, n: usize, end: &Point3<f64>) -> Self {
        let values = (0..n)
            .map(|i| {
                let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
                ControlPoint::from_point(&(start + (end - start) * t), 1.0)
            })
            .collect();
        Self {
            name: crate::grid_function::CONTROL_POINT.to_string(),
            values,
            shape: Some(vec![n]),
        }
    }

    pub fn weights(&self) -> Vec<f64> {
        self.values.iter().map(ControlPoint::w).collect()
    }

    pub fn points(&self) -> Vec<Point3<f64>> {
        self.values.iter().map(ControlPoint::point).collect()
    }
}
