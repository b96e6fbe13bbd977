use std::ops::{Index, IndexMut};

use ndarray::{Array2, ArrayBase, Data, Dimension, Ix2};

use crate::{AugmentError, AugmentResult, ShortVec};

/// Dense `f64` matrix, used here mostly for `(d+1)×(d+1)` homogeneous affines.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    /// Row-major / C-ordered matrix data.
    data: Vec<f64>,
    nrows: usize,
    ncols: usize,
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        assert!(row < self.nrows && col < self.ncols, "index should be in bounds");
        &self.data[row * self.ncols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        assert!(row < self.nrows && col < self.ncols, "index should be in bounds");
        &mut self.data[row * self.ncols + col]
    }
}

impl Matrix {
    /// Row-major / C order data
    pub fn try_new(data: Vec<f64>, ncols: usize) -> AugmentResult<Self> {
        if ncols == 0 || data.len() % ncols != 0 {
            return Err(AugmentError::configuration(format!(
                "Matrix data length {} is not divisible by ncols {}",
                data.len(),
                ncols
            )));
        }
        let nrows = data.len() / ncols;
        Ok(Self { data, nrows, ncols })
    }

    pub fn identity(n: usize) -> Self {
        Self::from_diagonal(&vec![1.0; n])
    }

    /// Square matrix with the given diagonal and zeros elsewhere.
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let n = diag.len();
        let mut data = vec![0.0; n * n];
        for (idx, d) in diag.iter().enumerate() {
            data[idx * n + idx] = *d;
        }
        Self {
            data,
            nrows: n,
            ncols: n,
        }
    }

    /// Copy a 2D `ndarray` into a matrix.
    ///
    /// Arrays of any other dimensionality are rejected.
    pub fn try_from_array<S, D>(arr: &ArrayBase<S, D>) -> AugmentResult<Self>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let arr = arr.view().into_dimensionality::<Ix2>().map_err(|_| {
            AugmentError::configuration(format!(
                "matrix must have two dimensions, got {}",
                arr.ndim()
            ))
        })?;
        let (nrows, ncols) = arr.dim();
        Ok(Self {
            data: arr.iter().copied().collect(),
            nrows,
            ncols,
        })
    }

    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.nrows, self.ncols), |(r, c)| self[(r, c)])
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// One row of the matrix.
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.ncols;
        &self.data[start..start + self.ncols]
    }

    pub fn transpose(&self) -> Matrix {
        let mut data = vec![0.0; self.data.len()];
        for r in 0..self.nrows {
            for c in 0..self.ncols {
                data[c * self.nrows + r] = self[(r, c)];
            }
        }
        Matrix {
            data,
            nrows: self.ncols,
            ncols: self.nrows,
        }
    }

    /// Matrix product `self @ other`.
    pub fn dot(&self, other: &Matrix) -> AugmentResult<Matrix> {
        if self.ncols != other.nrows {
            return Err(AugmentError::configuration(format!(
                "cannot multiply {}x{} matrix by {}x{} matrix",
                self.nrows, self.ncols, other.nrows, other.ncols
            )));
        }
        let mut data = vec![0.0; self.nrows * other.ncols];
        for r in 0..self.nrows {
            let out_row = &mut data[r * other.ncols..(r + 1) * other.ncols];
            for (k, a) in self.row(r).iter().enumerate() {
                for (o, b) in out_row.iter_mut().zip(other.row(k).iter()) {
                    *o += a * b;
                }
            }
        }
        Ok(Matrix {
            data,
            nrows: self.nrows,
            ncols: other.ncols,
        })
    }

    pub fn matmul(&self, coord: &[f64]) -> ShortVec<f64> {
        let mut result = smallvec::smallvec![f64::NAN; self.nrows];
        self.matmul_into(coord, &mut result);
        result
    }

    pub fn matmul_into(&self, coord: &[f64], buf: &mut [f64]) {
        for (b, r) in buf.iter_mut().zip(0..self.nrows) {
            *b = self.row(r).iter().zip(coord.iter()).map(|(m, c)| m * c).sum();
        }
    }

    /// N.B. Coordinate "columns" are the _rows_ of the input and output matrices.
    pub fn matmul_transposed_into(&self, coord_cols: &[&[f64]], buf: &mut [&mut [f64]]) {
        for (out_dim_idx, buf_col) in buf.iter_mut().enumerate() {
            buf_col.fill(0.0);
            for (mat_val, coord_col) in self.row(out_dim_idx).iter().zip(coord_cols.iter()) {
                // hottest loop: long columns in lock step
                for (c, b) in coord_col.iter().zip(buf_col.iter_mut()) {
                    *b += c * mat_val;
                }
            }
        }
    }

    /// Euclidean norm of each column.
    pub fn column_norms(&self) -> Vec<f64> {
        (0..self.ncols)
            .map(|c| {
                (0..self.nrows)
                    .map(|r| self[(r, c)] * self[(r, c)])
                    .sum::<f64>()
                    .sqrt()
            })
            .collect()
    }

    /// Top-left `n×n` block.
    pub fn top_left(&self, n: usize) -> AugmentResult<Matrix> {
        if n > self.nrows || n > self.ncols {
            return Err(AugmentError::configuration(format!(
                "cannot take {n}x{n} block of {}x{} matrix",
                self.nrows, self.ncols
            )));
        }
        let mut data = Vec::with_capacity(n * n);
        for r in 0..n {
            data.extend_from_slice(&self.row(r)[..n]);
        }
        Ok(Matrix {
            data,
            nrows: n,
            ncols: n,
        })
    }

    fn require_square(&self, op: &str) -> AugmentResult<()> {
        if !self.is_square() {
            return Err(AugmentError::configuration(format!(
                "{op} only defined for square matrices, got {}x{}",
                self.nrows, self.ncols
            )));
        }
        Ok(())
    }

    /// Determinant by Gaussian elimination with partial pivoting.
    pub fn determinant(&self) -> AugmentResult<f64> {
        self.require_square("determinant")?;
        let n = self.nrows;
        let mut work = self.data.clone();
        let mut det = 1.0;
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&a, &b| work[a * n + col].abs().total_cmp(&work[b * n + col].abs()))
                .unwrap_or(col);
            if work[pivot * n + col] == 0.0 {
                return Ok(0.0);
            }
            if pivot != col {
                for c in 0..n {
                    work.swap(pivot * n + c, col * n + c);
                }
                det = -det;
            }
            let p = work[col * n + col];
            det *= p;
            for r in (col + 1)..n {
                let factor = work[r * n + col] / p;
                if factor == 0.0 {
                    continue;
                }
                for c in col..n {
                    work[r * n + c] -= factor * work[col * n + c];
                }
            }
        }
        Ok(det)
    }

    /// Upper-triangular `U` such that `self = Uᵀ·U`.
    ///
    /// `self` must be symmetric positive definite.
    /// Pivots lost to rounding, relative to the largest diagonal entry,
    /// are treated as singular.
    pub fn cholesky_upper(&self) -> AugmentResult<Matrix> {
        self.require_square("cholesky")?;
        let n = self.nrows;
        let max_diag = (0..n).map(|i| self[(i, i)].abs()).fold(0.0, f64::max);
        let tol = f64::EPSILON * (n * n) as f64 * max_diag;
        let mut upper = Matrix {
            data: vec![0.0; n * n],
            nrows: n,
            ncols: n,
        };
        for i in 0..n {
            for j in i..n {
                let partial: f64 = (0..i).map(|k| upper[(k, i)] * upper[(k, j)]).sum();
                let val = self[(i, j)] - partial;
                if i == j {
                    if val <= tol || !val.is_finite() {
                        return Err(AugmentError::configuration(
                            "cholesky: matrix is not positive definite",
                        ));
                    }
                    upper[(i, i)] = val.sqrt();
                } else {
                    upper[(i, j)] = val / upper[(i, i)];
                }
            }
        }
        Ok(upper)
    }

    /// Inverse of an upper-triangular matrix by back substitution.
    ///
    /// Entries below the diagonal are ignored.
    pub fn inverse_upper_triangular(&self) -> AugmentResult<Matrix> {
        self.require_square("triangular inverse")?;
        let n = self.nrows;
        let mut inv = Matrix::identity(n);
        for col in 0..n {
            for i in (0..=col).rev() {
                let diag = self[(i, i)];
                if diag == 0.0 {
                    return Err(AugmentError::configuration(
                        "triangular inverse: matrix is singular",
                    ));
                }
                let rhs = if i == col { 1.0 } else { 0.0 };
                let acc: f64 = ((i + 1)..=col).map(|k| self[(i, k)] * inv[(k, col)]).sum();
                inv[(i, col)] = (rhs - acc) / diag;
            }
        }
        Ok(inv)
    }
}
