//! Multi-patch B-spline and NURBS patches for isogeometric analysis.
//!
//! Patches ([`patch::Patch`]) carry a tensor-product B-spline space, rational control points and
//! any number of fields over the same space. A [`multipatch::MultiPatch`] joins patches through
//! mirrored interfaces and assigns a conforming global numbering to their basis functions.
//! Knot insertion and degree elevation ([`refinement`]) propagate through the interface graph so
//! that shared boundaries stay conforming. Analysis entities are produced through Bezier
//! extraction ([`cells`], [`geometry`], [`model_part`]).
pub mod cells;
pub mod control;
pub mod error;
pub mod geometry;
pub mod grid_function;
pub mod interface;
pub mod model_part;
pub mod multipatch;
pub mod patch;
pub mod patch_utility;
pub mod procedural;
pub mod refinement;
pub mod space;
pub mod util;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
