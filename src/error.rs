//! Error type shared by the patch, multipatch and refinement routines.
use crate::patch::PatchId;
use crate::space::BoundarySide;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Errors produced by operations on patches and multipatches.
///
/// Every variant describes a model-authoring or configuration error. None of them is
/// transient, so no operation in this crate retries or recovers from them.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum IgaError {
    /// The patch carries a function space other than the one the operation requires.
    UnsupportedSpace {
        patch: PatchId,
        expected: &'static str,
        found: &'static str,
    },
    DimensionMismatch {
        expected: usize,
        found: usize,
    },
    NonConformingBoundaries {
        patch1: PatchId,
        side1: BoundarySide,
        patch2: PatchId,
        side2: BoundarySide,
    },
    MissingControlPoints {
        patch: PatchId,
    },
    GridSizeMismatch {
        grid: String,
        grid_size: usize,
        expected: usize,
        patch: PatchId,
    },
    InvalidKnot {
        knot: f64,
        reason: &'static str,
    },
    InvalidKnotVector(String),
    InvalidOrder {
        order: usize,
        number: usize,
    },
    /// The operation is not available for the given configuration.
    Unsupported(String),
    PatchNotFound(PatchId),
    DuplicatePatch(PatchId),
    InvalidSide {
        side: BoundarySide,
        dim: usize,
    },
    UnstructuredGrid(String),
    IncompatiblePatches {
        reference: PatchId,
        patch: PatchId,
    },
    NotEnumerated,
    InvalidArgument(String),
}

impl Display for IgaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedSpace { patch, expected, found } => write!(
                f,
                "patch {patch} has a function space of type {found}, but {expected} is required"
            ),
            Self::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Self::NonConformingBoundaries {
                patch1,
                side1,
                patch2,
                side2,
            } => write!(
                f,
                "the boundaries are not conformed: side {side1:?} of patch {patch1} \
                 and side {side2:?} of patch {patch2}"
            ),
            Self::MissingControlPoints { patch } => {
                write!(f, "patch {patch} has no control point grid function")
            }
            Self::GridSizeMismatch {
                grid,
                grid_size,
                expected,
                patch,
            } => write!(
                f,
                "the size of grid function {grid} ({grid_size}) is not compatible with \
                 the current number of control values ({expected}) of patch {patch}"
            ),
            Self::InvalidKnot { knot, reason } => write!(f, "cannot insert knot {knot}: {reason}"),
            Self::InvalidKnotVector(reason) => write!(f, "invalid knot vector: {reason}"),
            Self::InvalidOrder { order, number } => write!(
                f,
                "order {order} requires at least {} basis functions, got {number}",
                order + 1
            ),
            Self::Unsupported(what) => write!(f, "unsupported operation: {what}"),
            Self::PatchNotFound(id) => write!(f, "patch {id} does not exist in the multipatch"),
            Self::DuplicatePatch(id) => write!(f, "a patch with id {id} already exists in the multipatch"),
            Self::InvalidSide { side, dim } => {
                write!(f, "boundary side {side:?} does not exist for a {dim}-dimensional patch")
            }
            Self::UnstructuredGrid(name) => {
                write!(f, "control grid {name} is unstructured and cannot be reordered along an axis")
            }
            Self::IncompatiblePatches { reference, patch } => write!(
                f,
                "patch {patch} is not compatible with the reference patch {reference}"
            ),
            Self::NotEnumerated => write!(f, "the multipatch is not enumerated"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl Error for IgaError {}
