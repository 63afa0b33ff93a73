//! Refinement of B-spline patches that keeps neighboring patches conforming.
//!
//! Refining a patch in a multipatch refines every patch reachable from it through interfaces,
//! with the refinement carried across each interface by the interface orientation. A single
//! set of refined patch ids is shared by the whole pass, so every patch in the connected
//! component is refined exactly once even if the interface graph has cycles.
//!
//! Refinement never modifies a patch in place. A rebuilt patch with the same id, the refined
//! space and transformed grids replaces the old one in the multipatch. Interfaces are keyed by
//! patch id and carry over unchanged. A failure part way through a pass leaves the patches
//! refined so far in their refined state.
use crate::error::IgaError;
use crate::grid_function::{ControlGridData, CONTROL_POINT};
use crate::interface::PatchInterface;
use crate::multipatch::MultiPatch;
use crate::patch::{Patch, PatchId};
use crate::space::BSplinesFESpace;
use crate::util::tensor_product;
use log::debug;
use nalgebra::DimName;
use nalgebra_sparse::CsrMatrix;
use std::collections::{BTreeMap, BTreeSet};

pub mod detail;

/// Transformation matrix used for each refined patch, keyed by patch id.
///
/// The matrix of a patch maps its old control values to its new ones. It can be used to
/// re-express nodal data that lives outside the patch in the refined basis.
pub type TransformationMap = BTreeMap<PatchId, CsrMatrix<f64>>;

/// A refinement that can be applied to a single patch and carried across an interface.
trait Refinement: Sized {
    const NAME: &'static str;

    fn check_dim(&self, dim: usize) -> Result<(), IgaError>;

    /// The refined space and the control value transformation for the given space.
    fn refine_space<D: DimName>(
        &self,
        space: &BSplinesFESpace<D>,
    ) -> Result<(BSplinesFESpace<D>, CsrMatrix<f64>), IgaError>;

    /// The refinement to apply to `interface.patch2()` so that the shared boundary stays
    /// conforming.
    fn transport<D: DimName>(&self, interface: &PatchInterface, neighbor: &Patch<D>) -> Result<Self, IgaError>;
}

struct KnotInsertion(Vec<Vec<f64>>);

struct DegreeElevation(Vec<usize>);

impl Refinement for KnotInsertion {
    const NAME: &'static str = "knot insertion";

    fn check_dim(&self, dim: usize) -> Result<(), IgaError> {
        check_len(dim, self.0.len())
    }

    fn refine_space<D: DimName>(
        &self,
        space: &BSplinesFESpace<D>,
    ) -> Result<(BSplinesFESpace<D>, CsrMatrix<f64>), IgaError> {
        let mut knot_vectors = Vec::with_capacity(D::dim());
        let mut operators = Vec::with_capacity(D::dim());
        for (d, knots) in self.0.iter().enumerate() {
            let (refined, operator) = detail::knot_insertion_operator(space.knot_vector(d), space.order(d), knots)?;
            knot_vectors.push(refined);
            operators.push(operator);
        }
        let refined = BSplinesFESpace::new(knot_vectors, space.orders().to_vec())?;
        Ok((refined, tensor_product(&operators)))
    }

    fn transport<D: DimName>(&self, interface: &PatchInterface, neighbor: &Patch<D>) -> Result<Self, IgaError> {
        let neighbor_space = neighbor.bsplines_space()?;
        let mut knots = vec![Vec::new(); D::dim()];
        for (axis, own_knots) in self.0.iter().enumerate() {
            if let Some((neighbor_axis, direction)) = interface.transport_axis(axis) {
                let neighbor_knots = neighbor_space.knot_vector(neighbor_axis);
                knots[neighbor_axis] = if direction.is_reversed() {
                    own_knots
                        .iter()
                        .map(|&k| neighbor_knots.reverse_parameter(k))
                        .collect()
                } else {
                    own_knots.clone()
                };
            }
        }
        Ok(Self(knots))
    }
}

impl Refinement for DegreeElevation {
    const NAME: &'static str = "degree elevation";

    fn check_dim(&self, dim: usize) -> Result<(), IgaError> {
        check_len(dim, self.0.len())
    }

    fn refine_space<D: DimName>(
        &self,
        space: &BSplinesFESpace<D>,
    ) -> Result<(BSplinesFESpace<D>, CsrMatrix<f64>), IgaError> {
        let mut knot_vectors = Vec::with_capacity(D::dim());
        let mut orders = Vec::with_capacity(D::dim());
        let mut operators = Vec::with_capacity(D::dim());
        for (d, &increment) in self.0.iter().enumerate() {
            let (elevated, operator) =
                detail::degree_elevation_operator(space.knot_vector(d), space.order(d), increment)?;
            knot_vectors.push(elevated);
            orders.push(space.order(d) + increment);
            operators.push(operator);
        }
        let refined = BSplinesFESpace::new(knot_vectors, orders)?;
        Ok((refined, tensor_product(&operators)))
    }

    fn transport<D: DimName>(&self, interface: &PatchInterface, _neighbor: &Patch<D>) -> Result<Self, IgaError> {
        let mut increments = vec![0; D::dim()];
        for (axis, &increment) in self.0.iter().enumerate() {
            if let Some((neighbor_axis, _)) = interface.transport_axis(axis) {
                increments[neighbor_axis] = increment;
            }
        }
        Ok(Self(increments))
    }
}

fn check_len(dim: usize, len: usize) -> Result<(), IgaError> {
    if len == dim {
        Ok(())
    } else {
        Err(IgaError::DimensionMismatch {
            expected: dim,
            found: len,
        })
    }
}

/// Builds the refined version of a patch without touching the original.
fn refine_patch<D: DimName, R: Refinement>(
    patch: &Patch<D>,
    refinement: &R,
) -> Result<(Patch<D>, CsrMatrix<f64>), IgaError> {
    refinement.check_dim(D::dim())?;
    let (space, t) = refinement.refine_space(patch.bsplines_space()?)?;
    let shape = Some(space.numbers());

    let control_points = patch.control_points()?;
    let old_weights = control_points.weights();
    let new_control_points = control_points.transform(&t, shape.clone());
    let new_weights = new_control_points.weights();

    let mut grids: BTreeMap<String, ControlGridData> = patch
        .grids()
        .iter()
        .filter(|(name, _)| name.as_str() != CONTROL_POINT)
        .map(|(name, grid)| (name.clone(), grid.refine(&t, &old_weights, &new_weights, shape.clone())))
        .collect();
    grids.insert(CONTROL_POINT.to_string(), ControlGridData::ControlPoint(new_control_points));

    let mut refined = Patch::new(patch.id(), space);
    refined.set_prefix(patch.prefix());
    refined.replace_grids(grids);
    for interface in patch.interfaces() {
        refined.add_interface(interface.clone());
    }
    debug!(
        "Patch {}: {} maps {} control values to {}",
        patch.id(),
        R::NAME,
        t.ncols(),
        t.nrows()
    );
    Ok((refined, t))
}

fn refine_recursively<D: DimName, R: Refinement>(
    multipatch: &mut MultiPatch<D>,
    id: PatchId,
    refinement: &R,
    refined_patches: &mut BTreeSet<PatchId>,
    transformations: &mut TransformationMap,
) -> Result<(), IgaError> {
    if refined_patches.contains(&id) {
        return Ok(());
    }
    let (new_patch, t) = refine_patch(multipatch.patch(id)?, refinement)?;
    let interfaces = new_patch.interfaces().to_vec();
    multipatch.replace_patch(new_patch)?;
    refined_patches.insert(id);
    transformations.insert(id, t);

    for interface in &interfaces {
        let neighbor_id = interface.patch2();
        if refined_patches.contains(&neighbor_id) {
            continue;
        }
        let neighbor_refinement = refinement.transport(interface, multipatch.patch(neighbor_id)?)?;
        refine_recursively(
            multipatch,
            neighbor_id,
            &neighbor_refinement,
            refined_patches,
            transformations,
        )?;
    }
    Ok(())
}

fn refine_multipatch<D: DimName, R: Refinement>(
    multipatch: &mut MultiPatch<D>,
    id: PatchId,
    refinement: &R,
) -> Result<(BTreeSet<PatchId>, TransformationMap), IgaError> {
    let patch = multipatch.patch(id)?;
    refinement.check_dim(D::dim())?;
    if D::dim() >= 3 && patch.number_of_interfaces() > 0 {
        return Err(IgaError::Unsupported(format!(
            "{} across the interfaces of 3D patch {id}",
            R::NAME
        )));
    }
    let mut refined_patches = BTreeSet::new();
    let mut transformations = TransformationMap::new();
    refine_recursively(multipatch, id, refinement, &mut refined_patches, &mut transformations)?;
    Ok((refined_patches, transformations))
}

fn refine_standalone<D: DimName, R: Refinement>(
    patch: &mut Patch<D>,
    refinement: &R,
) -> Result<CsrMatrix<f64>, IgaError> {
    if patch.number_of_interfaces() > 0 || patch.parent_multipatch().is_some() {
        return Err(IgaError::InvalidArgument(format!(
            "patch {} belongs to a multipatch and must be refined through it",
            patch.id()
        )));
    }
    let (refined, t) = refine_patch(patch, refinement)?;
    *patch = refined;
    Ok(t)
}

/// Inserts knots into a patch and all patches connected to it.
///
/// `knots[d]` lists the knots to insert in parametric direction `d`, in any order. Returns the
/// ids of all refined patches.
///
/// # Errors
///
/// Fails if the patch is not a B-splines patch, if a knot is not strictly inside the domain
/// or would exceed multiplicity `order + 1`, or if the patch is a 3D patch with interfaces.
pub fn insert_knots<D: DimName>(
    multipatch: &mut MultiPatch<D>,
    id: PatchId,
    knots: &[Vec<f64>],
) -> Result<BTreeSet<PatchId>, IgaError> {
    let (refined, _) = refine_multipatch(multipatch, id, &KnotInsertion(knots.to_vec()))?;
    Ok(refined)
}

/// Like [`insert_knots`], but returns the transformation matrix of every refined patch.
pub fn insert_knots_with_transformations<D: DimName>(
    multipatch: &mut MultiPatch<D>,
    id: PatchId,
    knots: &[Vec<f64>],
) -> Result<TransformationMap, IgaError> {
    let (_, transformations) = refine_multipatch(multipatch, id, &KnotInsertion(knots.to_vec()))?;
    Ok(transformations)
}

/// Raises the order of a patch and all patches connected to it.
///
/// `increments[d]` is the order increment in parametric direction `d`. Neighbors receive the
/// increments of the axes along the shared boundary.
pub fn degree_elevate<D: DimName>(
    multipatch: &mut MultiPatch<D>,
    id: PatchId,
    increments: &[usize],
) -> Result<BTreeSet<PatchId>, IgaError> {
    let (refined, _) = refine_multipatch(multipatch, id, &DegreeElevation(increments.to_vec()))?;
    Ok(refined)
}

pub fn degree_elevate_with_transformations<D: DimName>(
    multipatch: &mut MultiPatch<D>,
    id: PatchId,
    increments: &[usize],
) -> Result<TransformationMap, IgaError> {
    let (_, transformations) = refine_multipatch(multipatch, id, &DegreeElevation(increments.to_vec()))?;
    Ok(transformations)
}

/// Inserts knots into a patch that does not belong to a multipatch.
pub fn insert_knots_standalone<D: DimName>(
    patch: &mut Patch<D>,
    knots: &[Vec<f64>],
) -> Result<CsrMatrix<f64>, IgaError> {
    refine_standalone(patch, &KnotInsertion(knots.to_vec()))
}

/// Raises the order of a patch that does not belong to a multipatch.
pub fn degree_elevate_standalone<D: DimName>(
    patch: &mut Patch<D>,
    increments: &[usize],
) -> Result<CsrMatrix<f64>, IgaError> {
    refine_standalone(patch, &DegreeElevation(increments.to_vec()))
}

