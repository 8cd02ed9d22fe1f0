//! Dense matrices on aligned storage, and borrowed strided views.

use std::fmt;
use std::ops::{Index, IndexMut};

use ndarray::Array2;
use rand::Rng;

use crate::error::{parameter_error, Result};
use crate::precision::Scalar;
use crate::utils::{alignment_for, AlignedVec};

/// Storage order of a [`Matrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageOrder {
    #[default]
    RowMajor,
    ColumnMajor,
}

impl StorageOrder {
    pub fn transposed(self) -> Self {
        match self {
            StorageOrder::RowMajor => StorageOrder::ColumnMajor,
            StorageOrder::ColumnMajor => StorageOrder::RowMajor,
        }
    }
}

/// A read-only strided view: element `(i, j)` lives at
/// `data[i * row_stride + j * col_stride]`.
///
/// Views are not validated; indexing outside the underlying slice panics.
pub struct MatRef<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
    row_stride: usize,
    col_stride: usize,
}

impl<T> Clone for MatRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MatRef<'_, T> {}

impl<'a, T> MatRef<'a, T> {
    pub fn new(data: &'a [T], rows: usize, cols: usize, row_stride: usize, col_stride: usize) -> Self {
        MatRef {
            data,
            rows,
            cols,
            row_stride,
            col_stride,
        }
    }

    /// Contiguous row-major view with leading dimension `cols`.
    pub fn row_major(data: &'a [T], rows: usize, cols: usize) -> Self {
        Self::new(data, rows, cols, cols, 1)
    }

    /// Contiguous column-major view with leading dimension `rows`.
    pub fn col_major(data: &'a [T], rows: usize, cols: usize) -> Self {
        Self::new(data, rows, cols, 1, rows)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The transposed view of the same storage.
    pub fn t(self) -> Self {
        Self::new(self.data, self.cols, self.rows, self.col_stride, self.row_stride)
    }

    #[inline(always)]
    pub fn at(&self, i: usize, j: usize) -> &'a T {
        &self.data[i * self.row_stride + j * self.col_stride]
    }
}

/// An owned dense matrix whose storage is aligned to
/// [`alignment_for::<T>()`](alignment_for).
#[derive(Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    order: StorageOrder,
    data: AlignedVec<T>,
}

impl<T: Scalar> Matrix<T> {
    /// Builds a matrix with element `(i, j)` set to `f(i, j)`.
    pub fn from_fn(
        rows: usize,
        cols: usize,
        order: StorageOrder,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| parameter_error(format!("{rows}x{cols} matrix is too large")))?;
        let data = AlignedVec::from_fn(len, alignment_for::<T>(), |k| match order {
            StorageOrder::RowMajor => f(k / cols, k % cols),
            StorageOrder::ColumnMajor => f(k % rows, k / rows),
        })?;
        Ok(Matrix {
            rows,
            cols,
            order,
            data,
        })
    }

    pub fn zeros(rows: usize, cols: usize, order: StorageOrder) -> Result<Self> {
        Self::from_fn(rows, cols, order, |_, _| T::zero())
    }

    pub fn identity(n: usize, order: StorageOrder) -> Result<Self> {
        Self::from_fn(n, n, order, |i, j| if i == j { T::one() } else { T::zero() })
    }

    /// Wraps `values`, laid out in `order`.
    ///
    /// # Errors
    ///
    /// [`ParameterError`](crate::KernelError::ParameterError) if
    /// `values.len() != rows * cols`.
    pub fn from_slice(rows: usize, cols: usize, order: StorageOrder, values: &[T]) -> Result<Self> {
        if rows.checked_mul(cols) != Some(values.len()) {
            return Err(parameter_error(format!(
                "{} values cannot fill a {rows}x{cols} matrix",
                values.len()
            )));
        }
        let data = AlignedVec::from_slice(values, alignment_for::<T>())?;
        Ok(Matrix {
            rows,
            cols,
            order,
            data,
        })
    }

    /// Uniform entries in `[-1, 1)`.
    pub fn random<R: Rng>(
        rows: usize,
        cols: usize,
        order: StorageOrder,
        rng: &mut R,
    ) -> Result<Self> {
        Self::from_fn(rows, cols, order, |_, _| T::from_f64(rng.random_range(-1.0..1.0)))
    }

    /// Converts every entry to `U` through `f64`.
    pub fn cast<U: Scalar>(&self) -> Result<Matrix<U>> {
        let data = AlignedVec::from_fn(self.data.len(), alignment_for::<U>(), |k| {
            U::from_f64(self.data[k].to_f64())
        })?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            order: self.order,
            data,
        })
    }

    /// The same matrix stored in `order`.
    pub fn to_order(&self, order: StorageOrder) -> Result<Self> {
        if order == self.order {
            return Ok(self.clone());
        }
        let view = self.view();
        Self::from_fn(self.rows, self.cols, order, |i, j| view.at(i, j).clone())
    }

    pub fn from_array(array: &Array2<T>, order: StorageOrder) -> Result<Self> {
        Self::from_fn(array.nrows(), array.ncols(), order, |i, j| array[[i, j]].clone())
    }

    pub fn to_array(&self) -> Array2<T> {
        let view = self.view();
        Array2::from_shape_fn((self.rows, self.cols), |(i, j)| view.at(i, j).clone())
    }

    /// Largest absolute entry-wise difference, as `f64`.
    ///
    /// # Errors
    ///
    /// [`ParameterError`](crate::KernelError::ParameterError) if the shapes
    /// differ.
    pub fn max_abs_diff(&self, other: &Matrix<T>) -> Result<f64> {
        if self.shape() != other.shape() {
            return Err(parameter_error(format!(
                "cannot compare {:?} with {:?}",
                self.shape(),
                other.shape()
            )));
        }
        let (a, b) = (self.view(), other.view());
        let mut worst = 0.0f64;
        for i in 0..self.rows {
            for j in 0..self.cols {
                let diff = (a.at(i, j).clone() - b.at(i, j).clone()).abs().to_f64();
                worst = worst.max(diff);
            }
        }
        Ok(worst)
    }
}

impl<T> Matrix<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn order(&self) -> StorageOrder {
        self.order
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Storage offset of element `(i, j)`.
    #[inline(always)]
    pub fn offset(&self, i: usize, j: usize) -> usize {
        match self.order {
            StorageOrder::RowMajor => i * self.cols + j,
            StorageOrder::ColumnMajor => j * self.rows + i,
        }
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&T> {
        if i < self.rows && j < self.cols {
            self.data.get(self.offset(i, j))
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn view(&self) -> MatRef<'_, T> {
        match self.order {
            StorageOrder::RowMajor => MatRef::row_major(&self.data, self.rows, self.cols),
            StorageOrder::ColumnMajor => MatRef::col_major(&self.data, self.rows, self.cols),
        }
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(i < self.rows && j < self.cols, "index ({i}, {j}) out of bounds");
        &self.data[self.offset(i, j)]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        assert!(i < self.rows && j < self.cols, "index ({i}, {j}) out of bounds");
        let offset = self.offset(i, j);
        &mut self.data[offset]
    }
}

impl<T: fmt::Debug> fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix {}x{} ({:?})", self.rows, self.cols, self.order)?;
        for i in 0..self.rows {
            let row: Vec<&T> = (0..self.cols).map(|j| &self.data[self.offset(i, j)]).collect();
            writeln!(f, "  {row:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_storage_orders_agree_on_elements() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let rm = Matrix::from_slice(2, 3, StorageOrder::RowMajor, &values).unwrap();
        let cm = rm.to_order(StorageOrder::ColumnMajor).unwrap();

        assert_eq!(cm.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(rm[(i, j)], cm[(i, j)]);
                assert_eq!(rm.view().at(i, j), cm.view().at(i, j));
            }
        }
    }

    #[test]
    fn test_transposed_view() {
        let m = Matrix::from_fn(2, 3, StorageOrder::RowMajor, |i, j| (10 * i + j) as f64).unwrap();
        let t = m.view().t();
        assert_eq!((t.rows(), t.cols()), (3, 2));
        assert_eq!(*t.at(2, 1), 12.0);
    }

    #[test]
    fn test_storage_is_aligned() {
        let m = Matrix::<f64>::zeros(7, 5, StorageOrder::ColumnMajor).unwrap();
        assert_eq!(m.as_slice().as_ptr() as usize % alignment_for::<f64>(), 0);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = Matrix::from_slice(2, 2, StorageOrder::RowMajor, &[1.0f32; 3]).unwrap_err();
        assert!(matches!(err, crate::KernelError::ParameterError { .. }));
    }

    #[test]
    fn test_get_and_index_mut() {
        let mut m = Matrix::<f32>::identity(3, StorageOrder::RowMajor).unwrap();
        m[(0, 2)] = 5.0;
        assert_eq!(m.get(0, 2), Some(&5.0));
        assert_eq!(m.get(3, 0), None);
        assert_eq!(m[(1, 1)], 1.0);
    }

    #[test]
    fn test_cast_and_ndarray_conversion() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = Matrix::<f64>::random(4, 3, StorageOrder::RowMajor, &mut rng).unwrap();
        assert!(m.as_slice().iter().all(|x| (-1.0..1.0).contains(x)));

        let single = m.cast::<f32>().unwrap();
        let back = single.cast::<f64>().unwrap();
        assert!(m.max_abs_diff(&back).unwrap() < 1e-6);

        let array = m.to_array();
        assert_eq!(array.dim(), (4, 3));
        let again = Matrix::from_array(&array, StorageOrder::ColumnMajor).unwrap();
        assert_eq!(m.max_abs_diff(&again).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_matrix() {
        let m = Matrix::<f64>::zeros(0, 4, StorageOrder::RowMajor).unwrap();
        assert!(m.as_slice().is_empty());
        assert_eq!(m.to_array().dim(), (0, 4));
    }
}
