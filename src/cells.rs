//! Bezier cells of a tensor-product B-spline space.
//!
//! Every non-empty knot span product of a [`BSplinesFESpace`] is a cell. On a cell the B-spline
//! basis is a linear combination of the Bernstein polynomials of the same orders,
//! `N_a = sum_b C[a, b] B_b`, where the rows of the extraction operator `C` follow the local ids
//! of the supported functions and the columns follow the tensor-product Bernstein basis, both
//! with the first direction varying fastest.
use crate::error::IgaError;
use crate::refinement::detail::bezier_decomposition;
use crate::space::knots::KnotVector;
use crate::space::{BSplinesFESpace, FunctionSpace};
use crate::util::{dense_to_csr, flat_index, multi_index, multi_indices};
use nalgebra::{DMatrix, DimName};
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;

/// A single Bezier cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    id: usize,
    bounds: Vec<(f64, f64)>,
    orders: Vec<usize>,
    local_ids: Vec<usize>,
    anchors: Vec<usize>,
    extraction_operator: CsrMatrix<f64>,
}

impl Cell {
    /// Position of the cell in the flat ordering of cells, first direction fastest.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Parametric interval covered by the cell in each direction.
    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    pub fn orders(&self) -> &[usize] {
        &self.orders
    }

    /// Local ids of the functions that are supported on the cell.
    pub fn local_ids(&self) -> &[usize] {
        &self.local_ids
    }

    /// Global function indices of the functions supported on the cell.
    pub fn supported_anchors(&self) -> &[usize] {
        &self.anchors
    }

    pub fn extraction_operator(&self) -> &CsrMatrix<f64> {
        &self.extraction_operator
    }

    /// Maps a point of the reference cell `[0, 1]^D` to the parametric domain.
    pub fn map_to_parametric(&self, local: &[f64]) -> Vec<f64> {
        self.bounds
            .iter()
            .zip(local)
            .map(|(&(a, b), &t)| a + (b - a) * t)
            .collect()
    }
}

/// Extraction data of one knot span in one direction.
#[derive(Debug, Clone)]
struct SpanExtraction {
    bounds: (f64, f64),
    first_function: usize,
    operator: DMatrix<f64>,
}

fn univariate_extraction(space_knots: &KnotVector, order: usize) -> Result<Vec<SpanExtraction>, IgaError> {
    let (bezier_knots, t) = bezier_decomposition(space_knots, order)?;
    let t = DMatrix::from(&t);
    let bezier = bezier_knots.as_slice();
    let n_bezier = bezier_knots.number_of_functions(order);
    let mut spans = Vec::new();
    for k in order..n_bezier {
        let (lo, hi) = (bezier[k], bezier[k + 1]);
        if !(hi > lo) {
            continue;
        }
        let span = space_knots.find_span(0.5 * (lo + hi), order);
        let operator = DMatrix::from_fn(order + 1, order + 1, |a, b| t[(k - order + b, span - order + a)]);
        spans.push(SpanExtraction {
            bounds: (lo, hi),
            first_function: span - order,
            operator,
        });
    }
    Ok(spans)
}

/// The Bezier cells of a B-spline space.
#[derive(Debug, Clone)]
pub struct BezierCellManager {
    cells: Vec<Cell>,
}

impl BezierCellManager {
    pub fn new<D: DimName>(space: &BSplinesFESpace<D>) -> Result<Self, IgaError> {
        let per_direction = (0..D::dim())
            .map(|d| univariate_extraction(space.knot_vector(d), space.order(d)))
            .collect::<Result<Vec<_>, _>>()?;
        let cell_shape: Vec<usize> = per_direction.iter().map(Vec::len).collect();
        let numbers = space.numbers();
        let orders = space.orders().to_vec();
        let function_indices = space.function_indices();
        let local_shape: Vec<usize> = orders.iter().map(|p| p + 1).collect();
        let num_cells: usize = cell_shape.iter().product();

        let cells = (0..num_cells)
            .into_par_iter()
            .map(|id| {
                let span_index = multi_index(id, &cell_shape);
                let spans: Vec<&SpanExtraction> = span_index
                    .iter()
                    .enumerate()
                    .map(|(d, &s)| &per_direction[d][s])
                    .collect();
                let local_ids: Vec<usize> = multi_indices(&local_shape)
                    .map(|offsets| {
                        let index: Vec<usize> = offsets
                            .iter()
                            .zip(&spans)
                            .map(|(&o, span)| span.first_function + o)
                            .collect();
                        flat_index(&index, &numbers)
                    })
                    .collect();
                let operator = spans
                    .iter()
                    .fold(DMatrix::identity(1, 1), |acc, span| span.operator.kronecker(&acc));
                Cell {
                    id,
                    bounds: spans.iter().map(|span| span.bounds).collect(),
                    orders: orders.clone(),
                    anchors: local_ids.iter().map(|&i| function_indices[i]).collect(),
                    local_ids,
                    extraction_operator: dense_to_csr(&operator),
                }
            })
            .collect();
        Ok(Self { cells })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }
}
