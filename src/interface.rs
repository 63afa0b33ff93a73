use crate::patch::PatchId;
use crate::space::{BoundaryDirection, BoundarySide};
use serde::{Deserialize, Serialize};

/// Directed edge between two patches sharing a boundary.
///
/// The interface states that side `side1` of `patch1` coincides with side `side2` of `patch2`.
/// Axis `i` of the boundary of `patch1` (the `i`-th tangential axis of `side1`) runs along
/// tangential axis `local_parameter_map[i]` of `side2`, in the same sense if `directions[i]`
/// is [`BoundaryDirection::Forward`] and in the opposite sense otherwise.
///
/// Interfaces always come in mirrored pairs: the patch on the other side stores
/// [`mirror`](Self::mirror) of this interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchInterface {
    patch1: PatchId,
    side1: BoundarySide,
    patch2: PatchId,
    side2: BoundarySide,
    local_parameter_map: Vec<usize>,
    directions: Vec<BoundaryDirection>,
}

impl PatchInterface {
    pub fn new(
        patch1: PatchId,
        side1: BoundarySide,
        patch2: PatchId,
        side2: BoundarySide,
        local_parameter_map: Vec<usize>,
        directions: Vec<BoundaryDirection>,
    ) -> Self {
        assert_eq!(local_parameter_map.len(), directions.len());
        Self {
            patch1,
            side1,
            patch2,
            side2,
            local_parameter_map,
            directions,
        }
    }

    /// Interface between two 2D patches, whose shared edge has a single axis.
    pub fn new_2d(
        patch1: PatchId,
        side1: BoundarySide,
        patch2: PatchId,
        side2: BoundarySide,
        direction: BoundaryDirection,
    ) -> Self {
        Self::new(patch1, side1, patch2, side2, vec![0], vec![direction])
    }

    /// Interface between two 3D patches.
    ///
    /// If `uv_or_vu` is true the two boundary axes of `side1` map to the two boundary axes of
    /// `side2` in order, otherwise they are swapped. `direction1` and `direction2` refer to the
    /// first and second boundary axes of `side1`.
    pub fn new_3d(
        patch1: PatchId,
        side1: BoundarySide,
        patch2: PatchId,
        side2: BoundarySide,
        uv_or_vu: bool,
        direction1: BoundaryDirection,
        direction2: BoundaryDirection,
    ) -> Self {
        let map = if uv_or_vu { vec![0, 1] } else { vec![1, 0] };
        Self::new(patch1, side1, patch2, side2, map, vec![direction1, direction2])
    }

    pub fn patch1(&self) -> PatchId {
        self.patch1
    }

    pub fn side1(&self) -> BoundarySide {
        self.side1
    }

    pub fn patch2(&self) -> PatchId {
        self.patch2
    }

    pub fn side2(&self) -> BoundarySide {
        self.side2
    }

    pub fn local_parameter_map(&self) -> &[usize] {
        &self.local_parameter_map
    }

    pub fn directions(&self) -> &[BoundaryDirection] {
        &self.directions
    }

    pub fn direction(&self, i: usize) -> BoundaryDirection {
        self.directions[i]
    }

    /// Parametric dimension of the two patches joined by this interface.
    pub fn patch_dim(&self) -> usize {
        self.local_parameter_map.len() + 1
    }

    /// The interface as seen from `patch2`.
    pub fn mirror(&self) -> Self {
        let n = self.local_parameter_map.len();
        let mut map = vec![0; n];
        let mut directions = vec![BoundaryDirection::Forward; n];
        for (i, &m) in self.local_parameter_map.iter().enumerate() {
            map[m] = i;
            directions[m] = self.directions[i];
        }
        Self::new(self.patch2, self.side2, self.patch1, self.side1, map, directions)
    }

    pub fn is_mirror_of(&self, other: &PatchInterface) -> bool {
        *self == other.mirror()
    }

    /// Replaces `side1` by its opposite side.
    pub fn flip_side1(&mut self) {
        self.side1 = self.side1.opposite();
    }

    /// Replaces `side2` by its opposite side.
    pub fn flip_side2(&mut self) {
        self.side2 = self.side2.opposite();
    }

    /// Maps a parametric axis of `patch1` to the corresponding axis of `patch2`.
    ///
    /// Returns `None` for the axis normal to `side1`, which has no counterpart along the
    /// shared boundary. Also returns the relative direction of the two axes.
    pub fn transport_axis(&self, axis1: usize) -> Option<(usize, BoundaryDirection)> {
        let dim = self.patch_dim();
        let tangential1 = self.side1.tangential_axes(dim);
        let tangential2 = self.side2.tangential_axes(dim);
        let i = tangential1.iter().position(|&a| a == axis1)?;
        Some((tangential2[self.local_parameter_map[i]], self.directions[i]))
    }
}
