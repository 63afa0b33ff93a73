//! A minimal host entity container and the adapter that fills it from a multipatch.
//!
//! [`ModelPart`] stands in for the host finite element framework: it stores nodes, elements,
//! conditions and properties by id. [`MultiPatchModelPart`] turns an enumerated multipatch into
//! nodes (one per equation id) and Bezier-extracted elements and conditions, and moves nodal
//! values between the nodes and the grid functions of the patches.
use crate::cells::{BezierCellManager, Cell};
use crate::control::ControlGrid;
use crate::geometry::{BezierGeometry, BezierGeometryData, IsogeometricGeometry};
use crate::grid_function::GridValue;
use crate::multipatch::MultiPatch;
use crate::patch::{Patch, PatchId};
use crate::space::{BoundarySide, FunctionSpace};
use eyre::{bail, eyre};
use log::info;
use nalgebra::{DimName, DimNameSub, Point3, Vector3, U1};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

/// Number of integration rules every isogeometric entity prepares.
pub const NUM_IGA_INTEGRATION_METHOD: &str = "NUM_IGA_INTEGRATION_METHOD";

/// Nodal scalar holding the NURBS weight of the control point behind the node.
pub const NURBS_WEIGHT: &str = "NURBS_WEIGHT";

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: usize,
    coordinates: Point3<f64>,
    scalars: FxHashMap<String, f64>,
    vectors: FxHashMap<String, Vector3<f64>>,
}

impl Node {
    pub fn new(id: usize, coordinates: Point3<f64>) -> Self {
        Self {
            id,
            coordinates,
            scalars: FxHashMap::default(),
            vectors: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn coordinates(&self) -> &Point3<f64> {
        &self.coordinates
    }

    pub fn value<T: NodalValue>(&self, name: &str) -> Option<T> {
        T::get(self, name)
    }

    pub fn set_value<T: NodalValue>(&mut self, name: impl Into<String>, value: T) {
        T::set(self, name.into(), value)
    }
}

/// Values that can be stored on nodes.
pub trait NodalValue: GridValue + Copy {
    fn get(node: &Node, name: &str) -> Option<Self>;

    fn set(node: &mut Node, name: String, value: Self);
}

impl NodalValue for f64 {
    fn get(node: &Node, name: &str) -> Option<Self> {
        node.scalars.get(name).copied()
    }

    fn set(node: &mut Node, name: String, value: Self) {
        node.scalars.insert(name, value);
    }
}

impl NodalValue for Vector3<f64> {
    fn get(node: &Node, name: &str) -> Option<Self> {
        node.vectors.get(name).copied()
    }

    fn set(node: &mut Node, name: String, value: Self) {
        node.vectors.insert(name, value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Integer(i64),
    Real(f64),
}

/// A bag of named values shared by entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Properties {
    id: usize,
    values: FxHashMap<String, PropertyValue>,
}

impl Properties {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            values: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn set(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        self.values.get(name).copied()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropertyValue::Integer(value) => Some(value),
            PropertyValue::Real(_) => None,
        }
    }
}

/// An element or condition: a named entity over a set of nodes with its own geometry.
#[derive(Debug, Clone)]
pub struct Entity {
    id: usize,
    name: String,
    node_ids: Vec<usize>,
    properties_id: usize,
    geometry: BezierGeometry,
}

impl Entity {
    pub fn new(
        id: usize,
        name: impl Into<String>,
        node_ids: Vec<usize>,
        properties_id: usize,
        geometry: BezierGeometry,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            node_ids,
            properties_id,
            geometry,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_ids(&self) -> &[usize] {
        &self.node_ids
    }

    pub fn properties_id(&self) -> usize {
        self.properties_id
    }

    pub fn geometry(&self) -> &BezierGeometry {
        &self.geometry
    }
}

#[derive(Debug, Clone)]
pub struct ModelPart {
    name: String,
    registered_names: BTreeSet<String>,
    nodes: BTreeMap<usize, Node>,
    elements: BTreeMap<usize, Entity>,
    conditions: BTreeMap<usize, Entity>,
    properties: BTreeMap<usize, Properties>,
}

impl ModelPart {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registered_names: BTreeSet::new(),
            nodes: BTreeMap::new(),
            elements: BTreeMap::new(),
            conditions: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Makes an element or condition name available for creation.
    pub fn register_entity(&mut self, name: impl Into<String>) {
        self.registered_names.insert(name.into());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered_names.contains(name)
    }

    pub fn create_node(&mut self, id: usize, coordinates: Point3<f64>) -> eyre::Result<&mut Node> {
        if self.nodes.contains_key(&id) {
            bail!("node {id} already exists in model part {}", self.name);
        }
        Ok(self.nodes.entry(id).or_insert(Node::new(id, coordinates)))
    }

    pub fn node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: usize) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_properties(&mut self, properties: Properties) {
        self.properties.insert(properties.id(), properties);
    }

    pub fn properties(&self, id: usize) -> Option<&Properties> {
        self.properties.get(&id)
    }

    fn add_entity(entities: &mut BTreeMap<usize, Entity>, entity: Entity) -> eyre::Result<()> {
        if entities.contains_key(&entity.id) {
            bail!("an entity with id {} already exists", entity.id);
        }
        entities.insert(entity.id, entity);
        Ok(())
    }

    pub fn add_element(&mut self, element: Entity) -> eyre::Result<()> {
        Self::add_entity(&mut self.elements, element)
    }

    pub fn add_condition(&mut self, condition: Entity) -> eyre::Result<()> {
        Self::add_entity(&mut self.conditions, condition)
    }

    pub fn element(&self, id: usize) -> Option<&Entity> {
        self.elements.get(&id)
    }

    pub fn condition(&self, id: usize) -> Option<&Entity> {
        self.conditions.get(&id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Entity> {
        self.elements.values()
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Entity> {
        self.conditions.values()
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn number_of_conditions(&self) -> usize {
        self.conditions.len()
    }

    fn clear_entities(&mut self) {
        self.nodes.clear();
        self.elements.clear();
        self.conditions.clear();
    }
}

/// Fills a [`ModelPart`] from a multipatch.
///
/// The expected sequence is [`begin_model_part`](Self::begin_model_part),
/// [`create_nodes`](Self::create_nodes), any number of `add_*` calls, and
/// [`end_model_part`](Self::end_model_part). Node ids are equation ids plus one.
#[derive(Debug)]
pub struct MultiPatchModelPart<D: DimName> {
    multipatch: MultiPatch<D>,
    model_part: ModelPart,
    echo_level: usize,
    is_ready: bool,
}

impl<D: DimName> MultiPatchModelPart<D> {
    pub fn new(multipatch: MultiPatch<D>, model_part: ModelPart) -> Self {
        Self {
            multipatch,
            model_part,
            echo_level: 0,
            is_ready: false,
        }
    }

    pub fn with_echo_level(mut self, echo_level: usize) -> Self {
        self.echo_level = echo_level;
        self
    }

    pub fn echo_level(&self) -> usize {
        self.echo_level
    }

    pub fn multipatch(&self) -> &MultiPatch<D> {
        &self.multipatch
    }

    pub fn multipatch_mut(&mut self) -> &mut MultiPatch<D> {
        &mut self.multipatch
    }

    pub fn model_part(&self) -> &ModelPart {
        &self.model_part
    }

    pub fn model_part_mut(&mut self) -> &mut ModelPart {
        &mut self.model_part
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    fn check_not_ready(&self) -> eyre::Result<()> {
        if self.is_ready {
            bail!("model part {} is already finalized", self.model_part.name());
        }
        Ok(())
    }

    /// The function indices of the patches are node ids minus one only while the enumeration
    /// of [`begin_model_part`](Self::begin_model_part) is current.
    fn check_enumerated(&self) -> eyre::Result<()> {
        if !self.multipatch.is_enumerated() {
            bail!(
                "the multipatch of model part {} is not enumerated; it was modified after \
                 begin_model_part or begin_model_part was not called",
                self.model_part.name()
            );
        }
        Ok(())
    }

    /// Enumerates the multipatch and clears previously created nodes and entities.
    pub fn begin_model_part(&mut self) -> eyre::Result<()> {
        self.is_ready = false;
        let size = self.multipatch.enumerate()?;
        self.model_part.clear_entities();
        if self.echo_level > 0 {
            info!(
                "Model part {} begins with {} equations over {} patches",
                self.model_part.name(),
                size,
                self.multipatch.len()
            );
        }
        Ok(())
    }

    /// Creates one node per equation id at the position of its control point.
    pub fn create_nodes(&mut self) -> eyre::Result<()> {
        self.check_not_ready()?;
        self.check_enumerated()?;
        for equation_id in 0..self.multipatch.equation_system_size() {
            let (patch_id, local_id) = self.multipatch.equation_id_location(equation_id)?;
            let control_point = *self
                .multipatch
                .patch(patch_id)?
                .control_points()?
                .get(local_id)
                .ok_or_else(|| eyre!("patch {patch_id} has no control point {local_id}"))?;
            let node = self
                .model_part
                .create_node(equation_id + 1, control_point.point())?;
            node.set_value(NURBS_WEIGHT, control_point.w());
        }
        if self.echo_level > 0 {
            info!(
                "{} nodes are created in model part {}",
                self.model_part.number_of_nodes(),
                self.model_part.name()
            );
        }
        Ok(())
    }

    fn check_entity_setup(&self, name: &str, properties_id: usize) -> eyre::Result<usize> {
        self.check_not_ready()?;
        self.check_enumerated()?;
        if !self.model_part.is_registered(name) {
            bail!("entity {name} is not registered");
        }
        let properties = self
            .model_part
            .properties(properties_id)
            .ok_or_else(|| eyre!("properties {properties_id} do not exist"))?;
        let num_integration_methods = properties
            .integer(NUM_IGA_INTEGRATION_METHOD)
            .ok_or_else(|| eyre!("properties {properties_id} do not define {NUM_IGA_INTEGRATION_METHOD}"))?;
        Ok(usize::try_from(num_integration_methods)?)
    }

    /// Creates one element per Bezier cell of a patch, with ids from `starting_id` on.
    ///
    /// Returns the ids of the new elements.
    pub fn add_elements(
        &mut self,
        patch_id: PatchId,
        name: &str,
        starting_id: usize,
        properties_id: usize,
    ) -> eyre::Result<Vec<usize>> {
        let entities = self.patch_entities(self.multipatch.patch(patch_id)?, name, starting_id, properties_id)?;
        let ids: Vec<usize> = entities.iter().map(Entity::id).collect();
        for entity in entities {
            self.model_part.add_element(entity)?;
        }
        self.report("elements", name, patch_id, &ids);
        Ok(ids)
    }

    /// Creates one condition per Bezier cell of a patch.
    pub fn add_conditions(
        &mut self,
        patch_id: PatchId,
        name: &str,
        starting_id: usize,
        properties_id: usize,
    ) -> eyre::Result<Vec<usize>> {
        let entities = self.patch_entities(self.multipatch.patch(patch_id)?, name, starting_id, properties_id)?;
        let ids: Vec<usize> = entities.iter().map(Entity::id).collect();
        for entity in entities {
            self.model_part.add_condition(entity)?;
        }
        self.report("conditions", name, patch_id, &ids);
        Ok(ids)
    }

    /// Creates one condition per Bezier cell of a side of a patch.
    pub fn add_boundary_conditions(
        &mut self,
        patch_id: PatchId,
        side: BoundarySide,
        name: &str,
        starting_id: usize,
        properties_id: usize,
    ) -> eyre::Result<Vec<usize>>
    where
        D: DimNameSub<U1>,
    {
        let boundary = self.multipatch.patch(patch_id)?.construct_boundary_patch(side)?;
        let entities = self.patch_entities(&boundary, name, starting_id, properties_id)?;
        let ids: Vec<usize> = entities.iter().map(Entity::id).collect();
        for entity in entities {
            self.model_part.add_condition(entity)?;
        }
        self.report("boundary conditions", name, patch_id, &ids);
        Ok(ids)
    }

    fn patch_entities<E: DimName>(
        &self,
        patch: &Patch<E>,
        name: &str,
        starting_id: usize,
        properties_id: usize,
    ) -> eyre::Result<Vec<Entity>> {
        let num_integration_methods = self.check_entity_setup(name, properties_id)?;
        let weights = patch.control_weights()?;
        let cells = BezierCellManager::new(patch.bsplines_space()?)?;
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| -> eyre::Result<Entity> {
                let geometry = cell_geometry(cell, &weights, num_integration_methods)?;
                Ok(Entity {
                    id: starting_id + i,
                    name: name.to_string(),
                    node_ids: cell.supported_anchors().iter().map(|&a| a + 1).collect(),
                    properties_id,
                    geometry,
                })
            })
            .collect()
    }

    fn report(&self, kind: &str, name: &str, patch_id: PatchId, ids: &[usize]) {
        if self.echo_level > 0 {
            info!(
                "{} {kind} {name} are added to model part {} from patch {patch_id}",
                ids.len(),
                self.model_part.name()
            );
        }
    }

    /// Finalizes the model part. No nodes or entities can be added afterwards.
    pub fn end_model_part(&mut self) -> eyre::Result<()> {
        self.check_not_ready()?;
        self.check_enumerated()?;
        self.is_ready = true;
        if self.echo_level > 0 {
            info!(
                "Model part {} is ready with {} nodes, {} elements and {} conditions",
                self.model_part.name(),
                self.model_part.number_of_nodes(),
                self.model_part.number_of_elements(),
                self.model_part.number_of_conditions()
            );
        }
        Ok(())
    }

    fn check_ready(&self) -> eyre::Result<()> {
        if !self.is_ready {
            bail!("model part {} is not finalized", self.model_part.name());
        }
        self.check_enumerated()
    }

    /// Copies the values of a grid function of every patch to the nodes.
    ///
    /// Patches without the grid function are skipped.
    pub fn synchronize_forward<T: NodalValue>(&mut self, name: &str) -> eyre::Result<()> {
        self.check_ready()?;
        for patch in self.multipatch.iter() {
            let Some(grid) = patch.control_grid::<T>(name) else {
                continue;
            };
            for (&equation_id, value) in patch.space().function_indices().iter().zip(grid.values()) {
                let node = self
                    .model_part
                    .node_mut(equation_id + 1)
                    .ok_or_else(|| eyre!("node {} does not exist", equation_id + 1))?;
                node.set_value(name, *value);
            }
        }
        Ok(())
    }

    /// Copies nodal values back into a grid function of every patch, creating the grid
    /// function where it is missing.
    pub fn synchronize_backward<T: NodalValue>(&mut self, name: &str) -> eyre::Result<()> {
        self.check_ready()?;
        for patch_id in self.multipatch.patch_ids() {
            let patch = self.multipatch.patch(patch_id)?;
            let values = patch
                .space()
                .function_indices()
                .iter()
                .map(|&equation_id| {
                    let node = self
                        .model_part
                        .node(equation_id + 1)
                        .ok_or_else(|| eyre!("node {} does not exist", equation_id + 1))?;
                    node.value::<T>(name)
                        .ok_or_else(|| eyre!("node {} has no value {name}", equation_id + 1))
                })
                .collect::<eyre::Result<Vec<T>>>()?;
            let shape = patch.bsplines_space()?.numbers();

            let patch = self.multipatch.patch_mut(patch_id)?;
            match patch.control_grid_mut::<T>(name) {
                Some(grid) => grid.values_mut().copy_from_slice(&values),
                None => patch.create_grid_function(name, ControlGrid::structured(name, shape, values)?)?,
            }
        }
        Ok(())
    }
}

fn cell_geometry(cell: &Cell, weights: &[f64], num_integration_methods: usize) -> eyre::Result<BezierGeometry> {
    let mut geometry = BezierGeometry::new();
    geometry.assign_geometry_data(BezierGeometryData {
        bounds: cell.bounds().to_vec(),
        weights: cell.local_ids().iter().map(|&i| weights[i]).collect(),
        extraction_operator: cell.extraction_operator().clone(),
        orders: cell.orders().to_vec(),
        num_integration_methods,
    })?;
    Ok(geometry)
}
