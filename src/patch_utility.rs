//! Construction and maintenance of B-spline multipatch topology.
use crate::control::ControlGrid;
use crate::error::IgaError;
use crate::grid_function::CONTROL_POINT;
use crate::interface::PatchInterface;
use crate::multipatch::{check_conformity, MultiPatch};
use crate::patch::{Patch, PatchId};
use crate::space::knots::KnotVector;
use crate::space::{BSplinesFESpace, BoundaryDirection, BoundarySide};
use log::{debug, warn};
use nalgebra::{DimName, DimNameAdd, DimNameSum, U1, U2, U3};
use std::collections::BTreeSet;

/// Joins two patches of a multipatch along the sides named by the interface.
///
/// The boundaries of both patches, oriented as the interface describes, must carry the same
/// knot vectors and orders. The interface is stored on `interface.patch1()` and its mirror on
/// `interface.patch2()`. Re-creating an existing interface is a no-op.
///
/// # Errors
///
/// Fails without touching either patch if the patches are 1D, are not B-splines patches, if
/// the interface does not fit the dimension, or if the boundaries do not conform.
pub fn make_interface<D: DimName>(multipatch: &mut MultiPatch<D>, interface: PatchInterface) -> Result<(), IgaError> {
    if D::dim() < 2 {
        return Err(IgaError::Unsupported(format!(
            "interfaces between {}D patches",
            D::dim()
        )));
    }
    if interface.patch_dim() != D::dim() {
        return Err(IgaError::DimensionMismatch {
            expected: D::dim(),
            found: interface.patch_dim(),
        });
    }
    interface.side1().check_dim(D::dim())?;
    interface.side2().check_dim(D::dim())?;

    let patch1 = multipatch.patch(interface.patch1())?;
    let patch2 = multipatch.patch(interface.patch2())?;
    check_conformity(patch1, patch2, &interface)?;
    if patch1.interfaces().contains(&interface) {
        warn!(
            "Patch {} already has an interface to patch {} on side {:?}",
            interface.patch1(),
            interface.patch2(),
            interface.side1()
        );
        return Ok(());
    }
    debug!(
        "Interface between patch {} ({:?}) and patch {} ({:?})",
        interface.patch1(),
        interface.side1(),
        interface.patch2(),
        interface.side2()
    );
    multipatch.add_interface_pair(interface)
}

/// Joins two 2D patches along a shared edge.
pub fn make_interface_2d(
    multipatch: &mut MultiPatch<U2>,
    patch1: PatchId,
    side1: BoundarySide,
    patch2: PatchId,
    side2: BoundarySide,
    direction: BoundaryDirection,
) -> Result<(), IgaError> {
    make_interface(multipatch, PatchInterface::new_2d(patch1, side1, patch2, side2, direction))
}

/// Joins two 3D patches along a shared face.
///
/// If `uv_or_vu` is false the two face axes are swapped between the patches. `direction1` and
/// `direction2` give the orientation of the first and second face axis of `side1`.
#[allow(clippy::too_many_arguments)]
pub fn make_interface_3d(
    multipatch: &mut MultiPatch<U3>,
    patch1: PatchId,
    side1: BoundarySide,
    patch2: PatchId,
    side2: BoundarySide,
    uv_or_vu: bool,
    direction1: BoundaryDirection,
    direction2: BoundaryDirection,
) -> Result<(), IgaError> {
    let interface = PatchInterface::new_3d(patch1, side1, patch2, side2, uv_or_vu, direction1, direction2);
    make_interface(multipatch, interface)
}

/// Stacks compatible patches as the control layers of a patch of one dimension higher.
///
/// The first `D` directions of the new patch copy the space of `patches[0]`. The new last
/// direction has a uniform open knot vector of the given order with one function per input
/// patch. Control points are concatenated in input order. The new patch has id 0.
pub fn create_loft_patch<D>(patches: &[&Patch<D>], order: usize) -> Result<Patch<DimNameSum<D, U1>>, IgaError>
where
    D: DimName + DimNameAdd<U1>,
{
    let reference = patches
        .first()
        .ok_or_else(|| IgaError::InvalidArgument("cannot loft an empty list of patches".to_string()))?;
    let reference_space = reference.bsplines_space()?;
    let layer_size = reference.control_points()?.len();

    let mut values = Vec::with_capacity(layer_size * patches.len());
    for patch in patches {
        patch.bsplines_space()?;
        if !patch.is_compatible(reference) {
            return Err(IgaError::IncompatiblePatches {
                reference: reference.id(),
                patch: patch.id(),
            });
        }
        let control_points = patch.control_points()?;
        if control_points.len() != layer_size {
            return Err(IgaError::GridSizeMismatch {
                grid: CONTROL_POINT.to_string(),
                grid_size: control_points.len(),
                expected: layer_size,
                patch: patch.id(),
            });
        }
        values.extend_from_slice(control_points.values());
    }

    let mut knot_vectors = reference_space.knot_vectors().to_vec();
    knot_vectors.push(KnotVector::uniform_open(patches.len(), order)?);
    let mut orders = reference_space.orders().to_vec();
    orders.push(order);
    let space = BSplinesFESpace::<DimNameSum<D, U1>>::new(knot_vectors, orders)?;
    let grid = ControlGrid::structured(CONTROL_POINT, space.numbers(), values)?;

    let mut loft = Patch::new(0, space);
    loft.create_control_point_grid_function(grid)?;
    Ok(loft)
}

/// Linear loft between two patches.
pub fn create_loft_patch_from_pair<D>(first: &Patch<D>, second: &Patch<D>) -> Result<Patch<DimNameSum<D, U1>>, IgaError>
where
    D: DimName + DimNameAdd<U1>,
{
    create_loft_patch(&[first, second], 1)
}

fn check_axis<D: DimName>(axis: usize) -> Result<(), IgaError> {
    if axis < D::dim() {
        Ok(())
    } else {
        Err(IgaError::InvalidArgument(format!(
            "axis {axis} does not exist on a {}D patch",
            D::dim()
        )))
    }
}

/// Reverses the space and every grid of a patch along a parametric axis.
fn reverse_patch_data<D: DimName>(patch: &mut Patch<D>, axis: usize) -> Result<(), IgaError> {
    check_axis::<D>(axis)?;
    if let Some(grid) = patch.grid_data().find(|grid| !grid.is_structured()) {
        return Err(IgaError::UnstructuredGrid(grid.name().to_string()));
    }
    patch.bsplines_space_mut()?.reverse(axis);
    for grid in patch.grids_mut() {
        grid.reverse(axis)?;
    }
    Ok(())
}

/// Reverses a patch that has no interfaces along a parametric axis.
pub fn reverse_patch<D: DimName>(patch: &mut Patch<D>, axis: usize) -> Result<(), IgaError> {
    if patch.number_of_interfaces() > 0 {
        return Err(IgaError::InvalidArgument(format!(
            "patch {} has interfaces and must be reversed through its multipatch",
            patch.id()
        )));
    }
    reverse_patch_data(patch, axis)
}

/// Reverses a patch of a multipatch along a parametric axis, keeping its interfaces
/// consistent.
///
/// Neighbors sharing a boundary that runs along `axis` are reversed along the matching axis.
/// For an interface on a side normal to `axis`, the side moves to the opposite end of the
/// axis, so the interface and its mirror record the opposite side instead. Returns the ids of
/// all reversed patches.
pub fn reverse<D: DimName>(
    multipatch: &mut MultiPatch<D>,
    id: PatchId,
    axis: usize,
) -> Result<BTreeSet<PatchId>, IgaError> {
    check_axis::<D>(axis)?;
    let mut reversed_patches = BTreeSet::new();
    reverse_recursively(multipatch, id, axis, &mut reversed_patches)?;
    multipatch.invalidate_enumeration();
    Ok(reversed_patches)
}

fn reverse_recursively<D: DimName>(
    multipatch: &mut MultiPatch<D>,
    id: PatchId,
    axis: usize,
    reversed_patches: &mut BTreeSet<PatchId>,
) -> Result<(), IgaError> {
    if reversed_patches.contains(&id) {
        return Ok(());
    }
    reverse_patch_data(multipatch.patch_mut(id)?, axis)?;
    reversed_patches.insert(id);
    debug!("Patch {id} is reversed along axis {axis}");

    let num_interfaces = multipatch.patch(id)?.number_of_interfaces();
    for i in 0..num_interfaces {
        // Neighbors reversed further down may have moved the far side of this interface
        let interface = multipatch.patch(id)?.interfaces()[i].clone();
        match interface.transport_axis(axis) {
            Some((neighbor_axis, _)) => {
                reverse_recursively(multipatch, interface.patch2(), neighbor_axis, reversed_patches)?;
            }
            None => {
                let mirror = interface.mirror();
                let neighbor_interface = multipatch
                    .patch_mut(interface.patch2())?
                    .interfaces_mut()
                    .iter_mut()
                    .find(|other| **other == mirror)
                    .ok_or_else(|| {
                        IgaError::InvalidArgument(format!(
                            "interface from patch {} ({:?}) to patch {} ({:?}) has no mirror",
                            interface.patch1(),
                            interface.side1(),
                            interface.patch2(),
                            interface.side2()
                        ))
                    })?;
                neighbor_interface.flip_side2();
                multipatch.patch_mut(id)?.interfaces_mut()[i].flip_side1();
            }
        }
    }
    Ok(())
}
