//! Index and sparse-matrix helpers shared by the tensor-product routines.
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Entries with smaller magnitude are dropped when converting computed operators to sparse form.
pub(crate) const DROP_TOLERANCE: f64 = 1e-13;

/// Flattens a multi-index into a linear index, with the first index varying fastest.
pub fn flat_index(multi_index: &[usize], shape: &[usize]) -> usize {
    assert_eq!(multi_index.len(), shape.len());
    multi_index
        .iter()
        .zip(shape)
        .rev()
        .fold(0, |acc, (&i, &n)| {
            debug_assert!(i < n);
            acc * n + i
        })
}

/// Inverse of [`flat_index`].
pub fn multi_index(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(shape.len());
    for &n in shape {
        result.push(flat % n);
        flat /= n;
    }
    result
}

/// All multi-indices of the given shape, in flat order.
///
/// An empty shape has exactly one (empty) multi-index.
pub fn multi_indices(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> + '_ {
    let count: usize = shape.iter().product();
    (0..count).map(move |flat| multi_index(flat, shape))
}

/// Reverses the order of `values` along `axis` of a structured grid with the given shape.
pub fn reverse_along_axis<T>(values: &mut [T], shape: &[usize], axis: usize) {
    assert!(axis < shape.len());
    assert_eq!(values.len(), shape.iter().product::<usize>());
    let n = shape[axis];
    for flat in 0..values.len() {
        let mut index = multi_index(flat, shape);
        if 2 * index[axis] + 1 < n {
            index[axis] = n - 1 - index[axis];
            values.swap(flat, flat_index(&index, shape));
        }
    }
}

/// Kronecker product `a ⊗ b` of two sparse matrices.
pub fn kronecker(a: &CsrMatrix<f64>, b: &CsrMatrix<f64>) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(a.nrows() * b.nrows(), a.ncols() * b.ncols());
    for (ia, ja, va) in a.triplet_iter() {
        for (ib, jb, vb) in b.triplet_iter() {
            coo.push(ia * b.nrows() + ib, ja * b.ncols() + jb, va * vb);
        }
    }
    CsrMatrix::from(&coo)
}

/// Tensor-product operator of per-direction operators, first direction varying fastest.
///
/// Computes `ops[D-1] ⊗ ... ⊗ ops[0]`. An empty list gives the 1x1 identity.
pub fn tensor_product(ops: &[CsrMatrix<f64>]) -> CsrMatrix<f64> {
    ops.iter()
        .fold(CsrMatrix::identity(1), |acc, op| kronecker(op, &acc))
}

/// Converts a dense matrix to CSR, dropping entries below [`DROP_TOLERANCE`].
pub fn dense_to_csr(matrix: &DMatrix<f64>) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(matrix.nrows(), matrix.ncols());
    for j in 0..matrix.ncols() {
        for i in 0..matrix.nrows() {
            let v = matrix[(i, j)];
            if v.abs() > DROP_TOLERANCE {
                coo.push(i, j, v);
            }
        }
    }
    CsrMatrix::from(&coo)
}
