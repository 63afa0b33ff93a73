use crate::error::IgaError;
use crate::space::knots::{basis_functions, basis_functions_and_derivatives, KnotVector};
use crate::space::{BoundaryDirection, BoundarySide, FunctionSpace};
use crate::util::{flat_index, multi_index, multi_indices, reverse_along_axis};
use nalgebra::{DimName, DimNameDiff, DimNameSub, U1};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Tensor-product B-spline space over a `D`-dimensional parametric box.
///
/// Local basis functions are numbered with the first parametric direction varying fastest.
/// Every knot vector is open, i.e. its end knots are repeated `order + 1` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct BSplinesFESpace<D> {
    knot_vectors: Vec<KnotVector>,
    orders: Vec<usize>,
    function_indices: Vec<usize>,
    #[serde(skip)]
    marker: PhantomData<D>,
}

impl<D: DimName> BSplinesFESpace<D> {
    pub fn new(knot_vectors: Vec<KnotVector>, orders: Vec<usize>) -> Result<Self, IgaError> {
        for len in [knot_vectors.len(), orders.len()] {
            if len != D::dim() {
                return Err(IgaError::DimensionMismatch {
                    expected: D::dim(),
                    found: len,
                });
            }
        }
        for (knots, &order) in knot_vectors.iter().zip(&orders) {
            let number = knots.number_of_functions(order);
            if number < order + 1 {
                return Err(IgaError::InvalidOrder { order, number });
            }
            if !knots.is_open(order) {
                return Err(IgaError::InvalidKnotVector(format!(
                    "knot vector {:?} is not open for order {order}",
                    knots.as_slice()
                )));
            }
            let (a, b) = knots.domain();
            if !(b > a) {
                return Err(IgaError::InvalidKnotVector(format!(
                    "knot vector {:?} spans an empty domain",
                    knots.as_slice()
                )));
            }
        }
        let total = knot_vectors
            .iter()
            .zip(&orders)
            .map(|(knots, &order)| knots.number_of_functions(order))
            .product();
        Ok(Self {
            knot_vectors,
            orders,
            function_indices: (0..total).collect(),
            marker: PhantomData,
        })
    }

    /// The lowest-resolution space of the given orders: a single Bezier cell on `[0, 1]^D`.
    pub fn primitive(orders: &[usize]) -> Result<Self, IgaError> {
        let numbers: Vec<_> = orders.iter().map(|p| p + 1).collect();
        Self::uniform(&numbers, orders)
    }

    /// Space on `[0, 1]^D` with uniform open knot vectors and the given number of functions.
    pub fn uniform(numbers: &[usize], orders: &[usize]) -> Result<Self, IgaError> {
        if numbers.len() != orders.len() {
            return Err(IgaError::DimensionMismatch {
                expected: orders.len(),
                found: numbers.len(),
            });
        }
        let knot_vectors = numbers
            .iter()
            .zip(orders)
            .map(|(&n, &p)| KnotVector::uniform_open(n, p))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(knot_vectors, orders.to_vec())
    }

    pub fn dim(&self) -> usize {
        D::dim()
    }

    pub fn knot_vector(&self, dim: usize) -> &KnotVector {
        &self.knot_vectors[dim]
    }

    pub fn knot_vectors(&self) -> &[KnotVector] {
        &self.knot_vectors
    }

    pub fn order(&self, dim: usize) -> usize {
        self.orders[dim]
    }

    pub fn orders(&self) -> &[usize] {
        &self.orders
    }

    /// Number of basis functions in the given parametric direction.
    pub fn number(&self, dim: usize) -> usize {
        self.knot_vectors[dim].number_of_functions(self.orders[dim])
    }

    pub fn numbers(&self) -> Vec<usize> {
        (0..D::dim()).map(|d| self.number(d)).collect()
    }

    /// Resets the global function indices to the local numbering `0..total_number`.
    pub fn reset_function_indices(&mut self) {
        self.function_indices = (0..self.function_indices.len()).collect();
    }

    /// Assigns consecutive global indices starting at `start` and returns the next free index.
    pub fn enumerate(&mut self, start: usize) -> usize {
        let n = self.function_indices.len();
        self.function_indices = (start..start + n).collect();
        start + n
    }

    /// The local id of the function with the given global index, if any.
    pub fn local_id(&self, global_index: usize) -> Option<usize> {
        self.function_indices
            .iter()
            .position(|&i| i == global_index)
    }

    pub fn flat_index(&self, multi_index: &[usize]) -> usize {
        flat_index(multi_index, &self.numbers())
    }

    pub fn multi_index(&self, local_id: usize) -> Vec<usize> {
        multi_index(local_id, &self.numbers())
    }

    /// Local ids of the functions on the given side, in the natural order of the boundary space.
    pub fn boundary_local_ids(&self, side: BoundarySide) -> Result<Vec<usize>, IgaError> {
        let tangential = side.tangential_axes(D::dim());
        let map: Vec<usize> = (0..tangential.len()).collect();
        let directions = vec![BoundaryDirection::Forward; tangential.len()];
        self.boundary_local_ids_oriented(side, &map, &directions)
    }

    /// Local ids of the functions on the given side, ordered as seen from a neighbor.
    ///
    /// Axis `i` of the neighbor's boundary corresponds to tangential axis
    /// `local_parameter_map[i]` of this side, running backwards if `directions[i]` is
    /// [`BoundaryDirection::Reversed`]. The first neighbor axis varies fastest.
    pub fn boundary_local_ids_oriented(
        &self,
        side: BoundarySide,
        local_parameter_map: &[usize],
        directions: &[BoundaryDirection],
    ) -> Result<Vec<usize>, IgaError> {
        side.check_dim(D::dim())?;
        let tangential = side.tangential_axes(D::dim());
        check_orientation(tangential.len(), local_parameter_map, directions)?;
        let numbers = self.numbers();
        let fixed = if side.is_max() { numbers[side.axis()] - 1 } else { 0 };
        let boundary_shape: Vec<usize> = local_parameter_map
            .iter()
            .map(|&m| numbers[tangential[m]])
            .collect();

        let ids = multi_indices(&boundary_shape)
            .map(|boundary_index| {
                let mut index = vec![0; D::dim()];
                index[side.axis()] = fixed;
                for (i, &b) in boundary_index.iter().enumerate() {
                    let axis = tangential[local_parameter_map[i]];
                    index[axis] = if directions[i].is_reversed() {
                        numbers[axis] - 1 - b
                    } else {
                        b
                    };
                }
                flat_index(&index, &numbers)
            })
            .collect();
        Ok(ids)
    }

    /// Knot vectors and orders of the side, arranged and oriented as seen from a neighbor.
    ///
    /// See [`boundary_local_ids_oriented`](Self::boundary_local_ids_oriented) for the meaning
    /// of the orientation arguments.
    pub fn boundary_knot_vectors_oriented(
        &self,
        side: BoundarySide,
        local_parameter_map: &[usize],
        directions: &[BoundaryDirection],
    ) -> Result<(Vec<KnotVector>, Vec<usize>), IgaError> {
        side.check_dim(D::dim())?;
        let tangential = side.tangential_axes(D::dim());
        check_orientation(tangential.len(), local_parameter_map, directions)?;
        let mut knot_vectors = Vec::with_capacity(tangential.len());
        let mut orders = Vec::with_capacity(tangential.len());
        for (&m, direction) in local_parameter_map.iter().zip(directions) {
            let axis = tangential[m];
            let knots = &self.knot_vectors[axis];
            knot_vectors.push(if direction.is_reversed() {
                knots.reversed()
            } else {
                knots.clone()
            });
            orders.push(self.orders[axis]);
        }
        Ok((knot_vectors, orders))
    }

    /// The restriction of this space to the given side.
    ///
    /// The boundary space keeps the global function indices of the functions on the side.
    pub fn construct_boundary_fespace(
        &self,
        side: BoundarySide,
    ) -> Result<BSplinesFESpace<DimNameDiff<D, U1>>, IgaError>
    where
        D: DimNameSub<U1>,
    {
        let tangential = side.tangential_axes(D::dim());
        let map: Vec<usize> = (0..tangential.len()).collect();
        let directions = vec![BoundaryDirection::Forward; tangential.len()];
        self.construct_boundary_fespace_oriented(side, &map, &directions)
    }

    /// The restriction of this space to the given side, arranged as seen from a neighbor.
    pub fn construct_boundary_fespace_oriented(
        &self,
        side: BoundarySide,
        local_parameter_map: &[usize],
        directions: &[BoundaryDirection],
    ) -> Result<BSplinesFESpace<DimNameDiff<D, U1>>, IgaError>
    where
        D: DimNameSub<U1>,
    {
        let (knot_vectors, orders) = self.boundary_knot_vectors_oriented(side, local_parameter_map, directions)?;
        let local_ids = self.boundary_local_ids_oriented(side, local_parameter_map, directions)?;
        let mut boundary = BSplinesFESpace::new(knot_vectors, orders)?;
        boundary.function_indices = local_ids
            .iter()
            .map(|&i| self.function_indices[i])
            .collect();
        Ok(boundary)
    }

    /// Whether both spaces have the same knot vectors (up to tolerance) and orders.
    ///
    /// Global function indices are not compared.
    pub fn is_compatible<E: DimName>(&self, other: &BSplinesFESpace<E>) -> bool {
        self.orders == other.orders
            && self.knot_vectors.len() == other.knot_vectors.len()
            && self
                .knot_vectors
                .iter()
                .zip(&other.knot_vectors)
                .all(|(a, b)| a.approx_eq(b))
    }

    /// Mirrors the space along the given axis, reordering the function indices accordingly.
    pub fn reverse(&mut self, axis: usize) {
        assert!(axis < D::dim(), "axis {axis} out of bounds");
        self.knot_vectors[axis] = self.knot_vectors[axis].reversed();
        let numbers = self.numbers();
        reverse_along_axis(&mut self.function_indices, &numbers, axis);
    }

    /// Per-direction spans and basis values at `xi`.
    fn univariate_values(&self, xi: &[f64]) -> Vec<(usize, Vec<f64>)> {
        assert_eq!(xi.len(), D::dim(), "parametric point has wrong dimension");
        xi.iter()
            .enumerate()
            .map(|(d, &u)| {
                let span = self.knot_vectors[d].find_span(u, self.orders[d]);
                (span, basis_functions(&self.knot_vectors[d], span, u, self.orders[d]))
            })
            .collect()
    }

    /// Local id of the tensor function with per-direction offsets `offsets` into the spans.
    fn tensor_local_id(&self, spans: &[usize], offsets: &[usize], numbers: &[usize]) -> usize {
        let index: Vec<usize> = (0..D::dim())
            .map(|d| spans[d] - self.orders[d] + offsets[d])
            .collect();
        flat_index(&index, numbers)
    }
}

fn check_orientation(
    num_tangential: usize,
    local_parameter_map: &[usize],
    directions: &[BoundaryDirection],
) -> Result<(), IgaError> {
    for len in [local_parameter_map.len(), directions.len()] {
        if len != num_tangential {
            return Err(IgaError::DimensionMismatch {
                expected: num_tangential,
                found: len,
            });
        }
    }
    let mut seen = vec![false; num_tangential];
    for &m in local_parameter_map {
        if m >= num_tangential || seen[m] {
            return Err(IgaError::InvalidArgument(format!(
                "{local_parameter_map:?} is not a permutation of the boundary axes"
            )));
        }
        seen[m] = true;
    }
    Ok(())
}

impl<D: DimName> FunctionSpace<D> for BSplinesFESpace<D> {
    fn space_type(&self) -> &'static str {
        "BSplinesFESpace"
    }

    fn total_number(&self) -> usize {
        self.function_indices.len()
    }

    fn function_indices(&self) -> &[usize] {
        &self.function_indices
    }

    fn set_function_indices(&mut self, indices: Vec<usize>) -> Result<(), IgaError> {
        if indices.len() != self.function_indices.len() {
            return Err(IgaError::DimensionMismatch {
                expected: self.function_indices.len(),
                found: indices.len(),
            });
        }
        self.function_indices = indices;
        Ok(())
    }

    fn basis_values(&self, xi: &[f64]) -> Vec<(usize, f64)> {
        let univariate = self.univariate_values(xi);
        let spans: Vec<usize> = univariate.iter().map(|(span, _)| *span).collect();
        let local_shape: Vec<usize> = self.orders.iter().map(|p| p + 1).collect();
        let numbers = self.numbers();
        multi_indices(&local_shape)
            .map(|offsets| {
                let value = offsets
                    .iter()
                    .enumerate()
                    .map(|(d, &o)| univariate[d].1[o])
                    .product::<f64>();
                (self.tensor_local_id(&spans, &offsets, &numbers), value)
            })
            .collect()
    }

    fn basis_gradients(&self, xi: &[f64]) -> Vec<(usize, f64, Vec<f64>)> {
        assert_eq!(xi.len(), D::dim(), "parametric point has wrong dimension");
        let mut spans = Vec::with_capacity(D::dim());
        let mut values = Vec::with_capacity(D::dim());
        let mut derivatives = Vec::with_capacity(D::dim());
        for (d, &u) in xi.iter().enumerate() {
            let span = self.knot_vectors[d].find_span(u, self.orders[d]);
            let (n, dn) = basis_functions_and_derivatives(&self.knot_vectors[d], span, u, self.orders[d]);
            spans.push(span);
            values.push(n);
            derivatives.push(dn);
        }
        let local_shape: Vec<usize> = self.orders.iter().map(|p| p + 1).collect();
        let numbers = self.numbers();
        multi_indices(&local_shape)
            .map(|offsets| {
                let value = (0..D::dim()).map(|d| values[d][offsets[d]]).product::<f64>();
                let gradient = (0..D::dim())
                    .map(|k| {
                        (0..D::dim())
                            .map(|d| {
                                if d == k {
                                    derivatives[d][offsets[d]]
                                } else {
                                    values[d][offsets[d]]
                                }
                            })
                            .product::<f64>()
                    })
                    .collect::<Vec<_>>();
                (self.tensor_local_id(&spans, &offsets, &numbers), value, gradient)
            })
            .collect()
    }

    fn clone_box(&self) -> Box<dyn FunctionSpace<D>> {
        Box::new(self.clone())
    }

    fn as_bsplines(&self) -> Option<&BSplinesFESpace<D>> {
        Some(self)
    }

    fn as_bsplines_mut(&mut self) -> Option<&mut BSplinesFESpace<D>> {
        Some(self)
    }
}
