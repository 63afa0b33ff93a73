//! Function spaces over parametric patches.
//!
//! A function space describes the basis functions living on a patch: how many there are, how
//! they are numbered globally, and how they are evaluated at a parametric point. It owns no
//! coefficients; those live in control grids (see [`crate::control`]).
use crate::error::IgaError;
use nalgebra::DimName;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

mod bsplines;
pub mod knots;

pub use bsplines::BSplinesFESpace;

/// One of the `2 * D` boundary sides of a `D`-dimensional parametric box.
///
/// `U0` is the side where the first parameter takes its minimum value, `U1` where it takes its
/// maximum, and so on for `V` (second parameter) and `W` (third parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoundarySide {
    U0,
    U1,
    V0,
    V1,
    W0,
    W1,
}

impl BoundarySide {
    /// The parametric axis that is held fixed on this side.
    pub fn axis(&self) -> usize {
        match self {
            Self::U0 | Self::U1 => 0,
            Self::V0 | Self::V1 => 1,
            Self::W0 | Self::W1 => 2,
        }
    }

    /// Whether the side lies at the maximum of its axis.
    pub fn is_max(&self) -> bool {
        matches!(self, Self::U1 | Self::V1 | Self::W1)
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::U0 => Self::U1,
            Self::U1 => Self::U0,
            Self::V0 => Self::V1,
            Self::V1 => Self::V0,
            Self::W0 => Self::W1,
            Self::W1 => Self::W0,
        }
    }

    pub fn from_axis(axis: usize, is_max: bool) -> Option<Self> {
        match (axis, is_max) {
            (0, false) => Some(Self::U0),
            (0, true) => Some(Self::U1),
            (1, false) => Some(Self::V0),
            (1, true) => Some(Self::V1),
            (2, false) => Some(Self::W0),
            (2, true) => Some(Self::W1),
            _ => None,
        }
    }

    /// All sides of a `dim`-dimensional patch.
    pub fn all(dim: usize) -> impl Iterator<Item = Self> {
        (0..dim.min(3)).flat_map(|axis| [false, true].into_iter().filter_map(move |m| Self::from_axis(axis, m)))
    }

    /// The parametric axes that run along this side, in increasing order.
    ///
    /// These become the axes of the boundary space restricted to the side.
    pub fn tangential_axes(&self, dim: usize) -> Vec<usize> {
        (0..dim).filter(|&a| a != self.axis()).collect()
    }

    pub(crate) fn check_dim(&self, dim: usize) -> Result<(), IgaError> {
        if self.axis() < dim {
            Ok(())
        } else {
            Err(IgaError::InvalidSide { side: *self, dim })
        }
    }
}

/// Relative orientation of a boundary axis as seen from the two patches sharing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryDirection {
    Forward,
    Reversed,
}

impl BoundaryDirection {
    pub fn flipped(&self) -> Self {
        match self {
            Self::Forward => Self::Reversed,
            Self::Reversed => Self::Forward,
        }
    }

    pub fn is_reversed(&self) -> bool {
        *self == Self::Reversed
    }
}

/// A function space over a `D`-dimensional parametric patch.
///
/// Patches hold their space behind this trait, so that operations that only make sense for a
/// particular kind of space (e.g. compatibility-preserving knot insertion for tensor-product
/// B-splines) can check the kind at runtime through [`as_bsplines`](Self::as_bsplines).
pub trait FunctionSpace<D: DimName>: Debug + Send + Sync {
    /// A short name of the space kind, used in error messages.
    fn space_type(&self) -> &'static str;

    /// Total number of basis functions.
    fn total_number(&self) -> usize;

    /// Global function index of each local basis function.
    fn function_indices(&self) -> &[usize];

    /// Replaces the global function indices.
    ///
    /// Fails if the number of indices differs from [`total_number`](Self::total_number).
    fn set_function_indices(&mut self, indices: Vec<usize>) -> Result<(), IgaError>;

    /// Values of the basis functions that are non-zero at `xi`, as `(local id, value)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if `xi.len() != D::dim()`.
    fn basis_values(&self, xi: &[f64]) -> Vec<(usize, f64)>;

    /// Parametric gradients of the basis functions that are non-zero at `xi`,
    /// as `(local id, value, gradient)` triplets.
    ///
    /// # Panics
    ///
    /// Panics if `xi.len() != D::dim()`.
    fn basis_gradients(&self, xi: &[f64]) -> Vec<(usize, f64, Vec<f64>)>;

    fn clone_box(&self) -> Box<dyn FunctionSpace<D>>;

    fn as_bsplines(&self) -> Option<&BSplinesFESpace<D>> {
        None
    }

    fn as_bsplines_mut(&mut self) -> Option<&mut BSplinesFESpace<D>> {
        None
    }
}

impl<D: DimName> Clone for Box<dyn FunctionSpace<D>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
