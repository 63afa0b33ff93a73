//! Collections of patches joined by interfaces.
use crate::error::IgaError;
use crate::interface::PatchInterface;
use crate::patch::{Patch, PatchId};
use log::{debug, warn};
use nalgebra::DimName;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_MULTIPATCH_TAG: AtomicUsize = AtomicUsize::new(0);

/// Identity token of a multipatch.
///
/// Patches hold a weak reference to the token of the multipatch they belong to, which lets a
/// patch tell whether it is owned by a (still living) multipatch without keeping it alive.
#[derive(Debug, PartialEq, Eq)]
pub struct MultiPatchTag {
    id: usize,
}

impl MultiPatchTag {
    pub fn id(&self) -> usize {
        self.id
    }
}

/// A set of patches with a single global enumeration of their basis functions.
///
/// Patches are keyed by their id and visited in increasing id order. Interfaces between patches
/// refer to their endpoints by id, so replacing a patch (as refinement does) never leaves an
/// interface pointing at a stale object.
#[derive(Debug)]
pub struct MultiPatch<D: DimName> {
    patches: BTreeMap<PatchId, Patch<D>>,
    equation_locations: Vec<(PatchId, usize)>,
    enumerated: bool,
    tag: Arc<MultiPatchTag>,
}

impl<D: DimName> Default for MultiPatch<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DimName> MultiPatch<D> {
    pub fn new() -> Self {
        Self {
            patches: BTreeMap::new(),
            equation_locations: Vec::new(),
            enumerated: false,
            tag: Arc::new(MultiPatchTag {
                id: NEXT_MULTIPATCH_TAG.fetch_add(1, Ordering::Relaxed),
            }),
        }
    }

    pub fn tag(&self) -> &Arc<MultiPatchTag> {
        &self.tag
    }

    /// Whether the patch refers to this multipatch as its parent.
    pub fn owns(&self, patch: &Patch<D>) -> bool {
        patch
            .parent_multipatch()
            .map_or(false, |tag| Arc::ptr_eq(&tag, &self.tag))
    }

    /// Adds a patch and returns its id.
    ///
    /// The patch must not carry interfaces; interfaces are created between patches that
    /// already belong to the multipatch.
    pub fn add_patch(&mut self, mut patch: Patch<D>) -> Result<PatchId, IgaError> {
        let id = patch.id();
        if self.patches.contains_key(&id) {
            return Err(IgaError::DuplicatePatch(id));
        }
        if patch.number_of_interfaces() > 0 {
            return Err(IgaError::InvalidArgument(format!(
                "patch {id} carries interfaces to patches outside the multipatch"
            )));
        }
        if self.owns(&patch) {
            warn!("Patch {id} is a copy of a patch of this multipatch");
        }
        patch.set_parent(Arc::downgrade(&self.tag));
        self.patches.insert(id, patch);
        self.enumerated = false;
        Ok(id)
    }

    /// Removes a patch, detaching every interface that touches it.
    pub fn remove_patch(&mut self, id: PatchId) -> Result<Patch<D>, IgaError> {
        let mut patch = self
            .patches
            .remove(&id)
            .ok_or(IgaError::PatchNotFound(id))?;
        for interface in patch.interfaces() {
            if let Some(neighbor) = self.patches.get_mut(&interface.patch2()) {
                neighbor.remove_interface(&interface.mirror());
            }
        }
        patch.clear_interfaces();
        patch.set_parent(Default::default());
        self.enumerated = false;
        Ok(patch)
    }

    pub fn patch(&self, id: PatchId) -> Result<&Patch<D>, IgaError> {
        self.patches.get(&id).ok_or(IgaError::PatchNotFound(id))
    }

    /// Mutable access to a patch.
    ///
    /// The function space and interfaces of the patch can only be changed through the
    /// operations of this crate, which keep the multipatch consistent.
    pub fn patch_mut(&mut self, id: PatchId) -> Result<&mut Patch<D>, IgaError> {
        self.patches.get_mut(&id).ok_or(IgaError::PatchNotFound(id))
    }

    pub fn contains(&self, id: PatchId) -> bool {
        self.patches.contains_key(&id)
    }

    pub fn patch_ids(&self) -> Vec<PatchId> {
        self.patches.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Patch<D>> {
        self.patches.values()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Swaps in a rebuilt version of an existing patch under the same id.
    pub(crate) fn replace_patch(&mut self, mut patch: Patch<D>) -> Result<(), IgaError> {
        let id = patch.id();
        let slot = self
            .patches
            .get_mut(&id)
            .ok_or(IgaError::PatchNotFound(id))?;
        patch.set_parent(Arc::downgrade(&self.tag));
        *slot = patch;
        self.enumerated = false;
        debug!("Patch {id} is replaced by its rebuilt version");
        Ok(())
    }

    /// Registers an interface on `patch1` and its mirror on `patch2`.
    pub(crate) fn add_interface_pair(&mut self, interface: PatchInterface) -> Result<(), IgaError> {
        let mirror = interface.mirror();
        self.patch(mirror.patch1())?;
        self.patch_mut(interface.patch1())?.add_interface(interface);
        self.patch_mut(mirror.patch1())?.add_interface(mirror);
        self.enumerated = false;
        Ok(())
    }

    pub(crate) fn invalidate_enumeration(&mut self) {
        self.enumerated = false;
    }

    /// Assigns global equation ids to all basis functions and returns the number of ids.
    ///
    /// Functions that coincide across an interface, directly or through a chain of interfaces,
    /// form one class and share a single equation id. Classes are numbered in the order of
    /// their first function, visiting patches in increasing id order and functions in local
    /// order, so the owner of each id is the lowest patch that carries the function.
    pub fn enumerate(&mut self) -> Result<usize, IgaError> {
        let mut offsets = FxHashMap::default();
        let mut total = 0;
        for (&id, patch) in &self.patches {
            offsets.insert(id, total);
            total += patch.total_number();
        }

        let mut classes = FunctionClasses::new(total);
        for (&id, patch) in &self.patches {
            for interface in patch.interfaces() {
                let neighbor_id = interface.patch2();
                let own_ids = patch.bsplines_space()?.boundary_local_ids(interface.side1())?;
                let neighbor_ids = self.patch(neighbor_id)?.bsplines_space()?.boundary_local_ids_oriented(
                    interface.side2(),
                    interface.local_parameter_map(),
                    interface.directions(),
                )?;
                if own_ids.len() != neighbor_ids.len() {
                    return Err(IgaError::NonConformingBoundaries {
                        patch1: id,
                        side1: interface.side1(),
                        patch2: neighbor_id,
                        side2: interface.side2(),
                    });
                }
                for (&own, &other) in own_ids.iter().zip(&neighbor_ids) {
                    classes.join(offsets[&id] + own, offsets[&neighbor_id] + other);
                }
            }
        }

        let mut class_ids = FxHashMap::default();
        let mut locations = Vec::new();
        let mut assigned = Vec::with_capacity(self.patches.len());
        for (&id, patch) in &self.patches {
            let indices: Vec<usize> = (0..patch.total_number())
                .map(|local| {
                    let class = classes.find(offsets[&id] + local);
                    *class_ids.entry(class).or_insert_with(|| {
                        locations.push((id, local));
                        locations.len() - 1
                    })
                })
                .collect();
            assigned.push((id, indices));
        }

        for (id, indices) in assigned {
            self.patch_mut(id)?
                .space_mut()
                .set_function_indices(indices)?;
        }
        debug!(
            "Enumerated {} patches with {} equations",
            self.patches.len(),
            locations.len()
        );
        self.equation_locations = locations;
        self.enumerated = true;
        Ok(self.equation_locations.len())
    }

    pub fn is_enumerated(&self) -> bool {
        self.enumerated
    }

    /// Number of equation ids assigned by the last enumeration.
    pub fn equation_system_size(&self) -> usize {
        if self.enumerated {
            self.equation_locations.len()
        } else {
            0
        }
    }

    /// The `(patch id, local id)` of the function that owns the given equation id.
    pub fn equation_id_location(&self, equation_id: usize) -> Result<(PatchId, usize), IgaError> {
        if !self.enumerated {
            return Err(IgaError::NotEnumerated);
        }
        self.equation_locations
            .get(equation_id)
            .copied()
            .ok_or_else(|| {
                IgaError::InvalidArgument(format!(
                    "equation id {equation_id} exceeds the system size {}",
                    self.equation_locations.len()
                ))
            })
    }

    /// Checks every patch and the pairing and conformity of every interface.
    pub fn validate(&self) -> Result<(), IgaError> {
        for patch in self.patches.values() {
            patch.validate()?;
            for interface in patch.interfaces() {
                let neighbor = self.patch(interface.patch2())?;
                if !neighbor
                    .interfaces()
                    .iter()
                    .any(|other| other.is_mirror_of(interface))
                {
                    return Err(IgaError::InvalidArgument(format!(
                        "interface from patch {} ({:?}) to patch {} ({:?}) has no mirror",
                        interface.patch1(),
                        interface.side1(),
                        interface.patch2(),
                        interface.side2()
                    )));
                }
                check_conformity(patch, neighbor, interface)?;
            }
        }
        Ok(())
    }
}

/// Fails unless the two boundaries joined by the interface carry the same knot vectors and
/// orders under the interface orientation.
pub(crate) fn check_conformity<D: DimName>(
    patch1: &Patch<D>,
    patch2: &Patch<D>,
    interface: &PatchInterface,
) -> Result<(), IgaError> {
    let space1 = patch1.bsplines_space()?;
    let space2 = patch2.bsplines_space()?;
    let n = interface.local_parameter_map().len();
    let identity: Vec<usize> = (0..n).collect();
    let forward = vec![crate::space::BoundaryDirection::Forward; n];
    let (knots1, orders1) = space1.boundary_knot_vectors_oriented(interface.side1(), &identity, &forward)?;
    let (knots2, orders2) = space2.boundary_knot_vectors_oriented(
        interface.side2(),
        interface.local_parameter_map(),
        interface.directions(),
    )?;
    let conforming = orders1 == orders2
        && knots1.len() == knots2.len()
        && knots1.iter().zip(&knots2).all(|(a, b)| a.approx_eq(b));
    if conforming {
        Ok(())
    } else {
        Err(IgaError::NonConformingBoundaries {
            patch1: interface.patch1(),
            side1: interface.side1(),
            patch2: interface.patch2(),
            side2: interface.side2(),
        })
    }
}

/// Disjoint sets over the functions of all patches, flattened in patch id order.
///
/// The root of every set is its smallest member.
struct FunctionClasses {
    parent: Vec<usize>,
}

impl FunctionClasses {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn join(&mut self, x: usize, y: usize) {
        let (rx, ry) = (self.find(x), self.find(y));
        if rx < ry {
            self.parent[ry] = rx;
        } else if ry < rx {
            self.parent[rx] = ry;
        }
    }
}
