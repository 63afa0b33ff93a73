//! Parametric patches.
use crate::control::{ControlGrid, ControlPoint};
use crate::error::IgaError;
use crate::grid_function::{ControlGridData, GridFunction, GridValue, CONTROL_POINT};
use crate::interface::PatchInterface;
use crate::multipatch::MultiPatchTag;
use crate::space::{BSplinesFESpace, BoundarySide, FunctionSpace};
use nalgebra::{DimName, DimNameDiff, DimNameSub, Isometry3, Point3, U1};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Identifier of a patch, unique within a multipatch.
pub type PatchId = usize;

/// A single parametric domain with its function space, fields and interfaces.
///
/// The control point grid ([`CONTROL_POINT`]) is mandatory for most operations. Additional
/// fields of any [`GridValue`] type can be attached by name; their values are interpreted in
/// the rational basis defined by the control point weights.
#[derive(Debug, Clone)]
pub struct Patch<D: DimName> {
    id: PatchId,
    prefix: String,
    space: Box<dyn FunctionSpace<D>>,
    grids: BTreeMap<String, ControlGridData>,
    interfaces: Vec<PatchInterface>,
    parent: Weak<MultiPatchTag>,
}

impl<D: DimName> Patch<D> {
    pub fn new<S>(id: PatchId, space: S) -> Self
    where
        S: FunctionSpace<D> + 'static,
    {
        Self::from_boxed_space(id, Box::new(space))
    }

    pub fn from_boxed_space(id: PatchId, space: Box<dyn FunctionSpace<D>>) -> Self {
        Self {
            id,
            prefix: "Patch".to_string(),
            space,
            grids: BTreeMap::new(),
            interfaces: Vec::new(),
            parent: Weak::new(),
        }
    }

    pub fn id(&self) -> PatchId {
        self.id
    }

    pub fn with_id(mut self, id: PatchId) -> Self {
        self.id = id;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    /// `<prefix>_<id>`, e.g. `Patch_3`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.prefix, self.id)
    }

    pub fn dim(&self) -> usize {
        D::dim()
    }

    pub fn space(&self) -> &dyn FunctionSpace<D> {
        &*self.space
    }

    pub(crate) fn space_mut(&mut self) -> &mut dyn FunctionSpace<D> {
        &mut *self.space
    }

    /// The function space as a B-splines space, or an error naming this patch.
    pub fn bsplines_space(&self) -> Result<&BSplinesFESpace<D>, IgaError> {
        self.space
            .as_bsplines()
            .ok_or_else(|| IgaError::UnsupportedSpace {
                patch: self.id,
                expected: "BSplinesFESpace",
                found: self.space.space_type(),
            })
    }

    pub(crate) fn bsplines_space_mut(&mut self) -> Result<&mut BSplinesFESpace<D>, IgaError> {
        let (id, found) = (self.id, self.space.space_type());
        self.space
            .as_bsplines_mut()
            .ok_or(IgaError::UnsupportedSpace {
                patch: id,
                expected: "BSplinesFESpace",
                found,
            })
    }

    pub fn total_number(&self) -> usize {
        self.space.total_number()
    }

    fn check_grid_size(&self, name: &str, size: usize) -> Result<(), IgaError> {
        if size == self.total_number() {
            Ok(())
        } else {
            Err(IgaError::GridSizeMismatch {
                grid: name.to_string(),
                grid_size: size,
                expected: self.total_number(),
                patch: self.id,
            })
        }
    }

    /// Attaches the control points of the patch, replacing any existing ones.
    pub fn create_control_point_grid_function(&mut self, mut grid: ControlGrid<ControlPoint>) -> Result<(), IgaError> {
        self.check_grid_size(CONTROL_POINT, grid.len())?;
        grid.set_name(CONTROL_POINT);
        self.grids
            .insert(CONTROL_POINT.to_string(), ControlGridData::ControlPoint(grid));
        Ok(())
    }

    /// Attaches a named field, replacing any existing field of the same name.
    pub fn create_grid_function<T: GridValue>(
        &mut self,
        name: impl Into<String>,
        mut grid: ControlGrid<T>,
    ) -> Result<(), IgaError> {
        let name = name.into();
        if name == CONTROL_POINT {
            return Err(IgaError::InvalidArgument(format!(
                "{CONTROL_POINT} is reserved for the control points of the patch"
            )));
        }
        self.check_grid_size(&name, grid.len())?;
        grid.set_name(name.clone());
        self.grids.insert(name, T::wrap(grid));
        Ok(())
    }

    /// Removes a named field. The control points cannot be removed.
    pub fn remove_grid_function(&mut self, name: &str) -> Option<ControlGridData> {
        if name == CONTROL_POINT {
            return None;
        }
        self.grids.remove(name)
    }

    pub fn has_grid_function<T: GridValue>(&self, name: &str) -> bool {
        self.control_grid::<T>(name).is_some()
    }

    pub fn grid_function_names(&self) -> impl Iterator<Item = &str> {
        self.grids.keys().map(String::as_str)
    }

    pub fn grid_data(&self) -> impl Iterator<Item = &ControlGridData> {
        self.grids.values()
    }

    pub fn control_grid<T: GridValue>(&self, name: &str) -> Option<&ControlGrid<T>> {
        self.grids.get(name).and_then(T::grid)
    }

    pub fn control_grid_mut<T: GridValue>(&mut self, name: &str) -> Option<&mut ControlGrid<T>> {
        self.grids.get_mut(name).and_then(T::grid_mut)
    }

    /// The named field as a function over the patch.
    ///
    /// Fields other than the control points are weighted by the control point weights, if the
    /// patch has control points.
    pub fn grid_function<T: GridValue>(&self, name: &str) -> Option<GridFunction<'_, D, T>> {
        let grid = self.control_grid::<T>(name)?;
        if name == CONTROL_POINT {
            return Some(GridFunction::new(self.space(), grid));
        }
        Some(match self.control_points() {
            Ok(points) => GridFunction::weighted(self.space(), points.weights(), grid),
            Err(_) => GridFunction::new(self.space(), grid),
        })
    }

    pub fn control_points(&self) -> Result<&ControlGrid<ControlPoint>, IgaError> {
        self.control_grid::<ControlPoint>(CONTROL_POINT)
            .ok_or(IgaError::MissingControlPoints { patch: self.id })
    }

    pub fn control_points_mut(&mut self) -> Result<&mut ControlGrid<ControlPoint>, IgaError> {
        let id = self.id;
        self.control_grid_mut::<ControlPoint>(CONTROL_POINT)
            .ok_or(IgaError::MissingControlPoints { patch: id })
    }

    pub fn control_point_grid_function(&self) -> Result<GridFunction<'_, D, ControlPoint>, IgaError> {
        Ok(GridFunction::new(self.space(), self.control_points()?))
    }

    pub fn control_weights(&self) -> Result<Vec<f64>, IgaError> {
        Ok(self.control_points()?.weights())
    }

    /// Position of the geometric map at the parametric point `xi`.
    pub fn evaluate_point(&self, xi: &[f64]) -> Result<Point3<f64>, IgaError> {
        Ok(self.control_point_grid_function()?.evaluate(xi).point())
    }

    /// Moves all control points by a rigid transformation.
    pub fn apply_transformation(&mut self, transformation: &Isometry3<f64>) -> Result<(), IgaError> {
        for point in self.control_points_mut()?.values_mut() {
            point.apply_transformation(transformation);
        }
        Ok(())
    }

    /// Axis-aligned box `(min, max)` containing all control points, and hence the patch.
    pub fn bounding_box(&self) -> Result<(Point3<f64>, Point3<f64>), IgaError> {
        let points = self.control_points()?.points();
        let first = points
            .first()
            .ok_or(IgaError::MissingControlPoints { patch: self.id })?;
        Ok(points
            .iter()
            .fold((*first, *first), |(min, max), p| (min.inf(p), max.sup(p))))
    }

    /// Checks that the control points exist and that every field matches the function space.
    pub fn validate(&self) -> Result<(), IgaError> {
        self.control_points()?;
        for grid in self.grids.values() {
            self.check_grid_size(grid.name(), grid.len())?;
        }
        if let Some(interface) = self.interfaces.iter().find(|i| i.patch1() != self.id) {
            return Err(IgaError::InvalidArgument(format!(
                "patch {} holds an interface that starts at patch {}",
                self.id,
                interface.patch1()
            )));
        }
        Ok(())
    }

    /// Whether both patches are B-splines patches with the same knot vectors and orders.
    pub fn is_compatible(&self, other: &Patch<D>) -> bool {
        match (self.space.as_bsplines(), other.space.as_bsplines()) {
            (Some(a), Some(b)) => a.is_compatible(b),
            _ => false,
        }
    }

    /// Whether both patches are compatible and have the same control points.
    pub fn is_equivalent(&self, other: &Patch<D>) -> bool {
        self.is_compatible(other)
            && match (self.control_points(), other.control_points()) {
                (Ok(a), Ok(b)) => a
                    .values()
                    .iter()
                    .zip(b.values())
                    .all(|(p, q)| (p.homogeneous() - q.homogeneous()).amax() <= 1e-12),
                _ => false,
            }
    }

    /// The restriction of the patch to one of its sides.
    ///
    /// The boundary patch keeps the id of this patch, the global function indices of the
    /// functions on the side, and every field restricted to the side.
    pub fn construct_boundary_patch(&self, side: BoundarySide) -> Result<Patch<DimNameDiff<D, U1>>, IgaError>
    where
        D: DimNameSub<U1>,
    {
        let space = self.bsplines_space()?;
        let boundary_space = space.construct_boundary_fespace(side)?;
        let local_ids = space.boundary_local_ids(side)?;
        let shape = boundary_space.numbers();
        let mut boundary = Patch::new(self.id, boundary_space);
        boundary.set_prefix(format!("{}_{:?}", self.prefix, side));
        boundary.grids = self
            .grids
            .iter()
            .map(|(name, grid)| (name.clone(), grid.sub_grid(&local_ids, Some(shape.clone()))))
            .collect();
        Ok(boundary)
    }

    pub fn interfaces(&self) -> &[PatchInterface] {
        &self.interfaces
    }

    pub(crate) fn interfaces_mut(&mut self) -> &mut Vec<PatchInterface> {
        &mut self.interfaces
    }

    pub fn number_of_interfaces(&self) -> usize {
        self.interfaces.len()
    }

    pub fn interface(&self, i: usize) -> Option<&PatchInterface> {
        self.interfaces.get(i)
    }

    pub(crate) fn add_interface(&mut self, interface: PatchInterface) {
        self.interfaces.push(interface);
    }

    pub(crate) fn remove_interface(&mut self, interface: &PatchInterface) -> bool {
        let before = self.interfaces.len();
        self.interfaces.retain(|i| i != interface);
        self.interfaces.len() != before
    }

    pub(crate) fn clear_interfaces(&mut self) {
        self.interfaces.clear();
    }

    /// The patch adjacent to the given side, if any.
    pub fn neighbor(&self, side: BoundarySide) -> Option<PatchId> {
        self.interfaces
            .iter()
            .find(|i| i.side1() == side)
            .map(PatchInterface::patch2)
    }

    /// The side of this patch shared with `other`, if any.
    pub fn find_boundary_side(&self, other: PatchId) -> Option<BoundarySide> {
        self.interfaces
            .iter()
            .find(|i| i.patch2() == other)
            .map(PatchInterface::side1)
    }

    /// The multipatch this patch belongs to, if it still exists.
    pub fn parent_multipatch(&self) -> Option<Arc<MultiPatchTag>> {
        self.parent.upgrade()
    }

    pub(crate) fn set_parent(&mut self, parent: Weak<MultiPatchTag>) {
        self.parent = parent;
    }

    pub(crate) fn replace_grids(&mut self, grids: BTreeMap<String, ControlGridData>) {
        self.grids = grids;
    }

    pub(crate) fn grids(&self) -> &BTreeMap<String, ControlGridData> {
        &self.grids
    }

    pub(crate) fn grids_mut(&mut self) -> impl Iterator<Item = &mut ControlGridData> {
        self.grids.values_mut()
    }
}
