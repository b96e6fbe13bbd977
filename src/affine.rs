//! Homogeneous affine matrices for 2D and 3D augmentation.
//!
//! Every matrix here is `(d+1)×(d+1)` for `d` spatial dimensions,
//! acting on column vectors `[x0, ..., x(d-1), 1]`.
use smallvec::smallvec;

use crate::{AugmentError, AugmentResult, Matrix, ShortVec};

/// Rotation by `radians`.
///
/// In 2D only the first angle is used.
/// In 3D, up to three angles rotate about the 1st, 2nd and 3rd axes in turn,
/// composed as `R1 @ R2 @ R3`; missing trailing angles contribute nothing.
pub fn create_rotate(spatial_dims: usize, radians: &[f64]) -> AugmentResult<Matrix> {
    let Some(first) = radians.first() else {
        return Err(AugmentError::configuration(
            "create_rotate needs at least one angle",
        ));
    };
    match spatial_dims {
        2 => {
            let (sin, cos) = first.sin_cos();
            #[rustfmt::skip]
            let data = vec![
                cos, -sin, 0.0,
                sin, cos, 0.0,
                0.0, 0.0, 1.0,
            ];
            Matrix::try_new(data, 3)
        }
        3 => {
            let mut affine = elementary_rotation_3d(0, *first)?;
            for (axis, theta) in radians.iter().enumerate().take(3).skip(1) {
                affine = affine.dot(&elementary_rotation_3d(axis, *theta)?)?;
            }
            Ok(affine)
        }
        _ => Err(AugmentError::configuration(format!(
            "create_rotate got spatial_dims={spatial_dims}, radians={radians:?}"
        ))),
    }
}

fn elementary_rotation_3d(axis: usize, theta: f64) -> AugmentResult<Matrix> {
    let (sin, cos) = theta.sin_cos();
    #[rustfmt::skip]
    let data = match axis {
        0 => vec![
            1.0, 0.0, 0.0, 0.0,
            0.0, cos, -sin, 0.0,
            0.0, sin, cos, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ],
        1 => vec![
            cos, 0.0, sin, 0.0,
            0.0, 1.0, 0.0, 0.0,
            -sin, 0.0, cos, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ],
        _ => vec![
            cos, -sin, 0.0, 0.0,
            sin, cos, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ],
    };
    Matrix::try_new(data, 4)
}

/// Shear with off-diagonal `coefs`, padded with zeros:
/// two in 2D, six in 3D (row by row).
pub fn create_shear(spatial_dims: usize, coefs: &[f64]) -> AugmentResult<Matrix> {
    let coef = |idx: usize| coefs.get(idx).copied().unwrap_or(0.0);
    match spatial_dims {
        2 => {
            #[rustfmt::skip]
            let data = vec![
                1.0, coef(0), 0.0,
                coef(1), 1.0, 0.0,
                0.0, 0.0, 1.0,
            ];
            Matrix::try_new(data, 3)
        }
        3 => {
            #[rustfmt::skip]
            let data = vec![
                1.0, coef(0), coef(1), 0.0,
                coef(2), 1.0, coef(3), 0.0,
                coef(4), coef(5), 1.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            Matrix::try_new(data, 4)
        }
        _ => Err(AugmentError::configuration(format!(
            "create_shear is not implemented for spatial_dims={spatial_dims}"
        ))),
    }
}

/// Diagonal scaling; missing factors are 1, extra factors are ignored.
pub fn create_scale(spatial_dims: usize, factors: &[f64]) -> Matrix {
    let mut diag: ShortVec<f64> = smallvec![1.0; spatial_dims + 1];
    for (d, f) in diag.iter_mut().zip(factors.iter()).take(spatial_dims) {
        *d = *f;
    }
    Matrix::from_diagonal(&diag)
}

/// Translation by `shift`; missing components are 0, extra components are ignored.
pub fn create_translate(spatial_dims: usize, shift: &[f64]) -> Matrix {
    let mut affine = Matrix::identity(spatial_dims + 1);
    for (idx, s) in shift.iter().enumerate().take(spatial_dims) {
        affine[(idx, spatial_dims)] = *s;
    }
    affine
}

/// Product of `matrices` in order, i.e. `m0 @ m1 @ ...`.
///
/// When applied to points, the last matrix acts first.
pub fn compose(matrices: &[Matrix]) -> AugmentResult<Matrix> {
    let Some((first, rest)) = matrices.split_first() else {
        return Err(AugmentError::configuration("nothing to compose"));
    };
    rest.iter().try_fold(first.clone(), |acc, m| acc.dot(m))
}

/// What [to_affine_nd] writes into.
#[derive(Debug, Clone, PartialEq)]
pub enum AffineTarget {
    /// Start from the `(r+1)×(r+1)` identity.
    Rank(usize),
    /// Start from a copy of this square matrix.
    Scaffold(Matrix),
}

impl From<usize> for AffineTarget {
    fn from(value: usize) -> Self {
        Self::Rank(value)
    }
}

impl From<Matrix> for AffineTarget {
    fn from(value: Matrix) -> Self {
        Self::Scaffold(value)
    }
}

impl TryFrom<i64> for AffineTarget {
    type Error = AugmentError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .map(Self::Rank)
            .map_err(|_| AugmentError::configuration(format!("rank must be positive, got {value}")))
    }
}

impl TryFrom<f64> for AffineTarget {
    type Error = AugmentError;

    /// Fractional ranks are truncated.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value < 0.0 {
            return Err(AugmentError::configuration(format!(
                "rank must be finite and positive, got {value}"
            )));
        }
        Ok(Self::Rank(value.trunc() as usize))
    }
}

/// Resize `affine` to another spatial rank.
///
/// Ranks are taken from row counts, so either matrix may have extra columns.
/// With `k = min(target rank, affine rank)`,
/// the top-left `k×k` block and the first `k` entries of the last column
/// are copied from `affine` into the target; all other target entries are left as they were.
pub fn to_affine_nd(target: impl Into<AffineTarget>, affine: &Matrix) -> AugmentResult<Matrix> {
    if affine.nrows() == 0 {
        return Err(AugmentError::configuration("input affine must not be empty"));
    }
    let mut new_affine = match target.into() {
        AffineTarget::Rank(r) => Matrix::identity(r + 1),
        AffineTarget::Scaffold(m) => {
            if m.nrows() == 0 {
                return Err(AugmentError::configuration("target affine must not be empty"));
            }
            m
        }
    };

    let k = new_affine.nrows().min(affine.nrows()) - 1;
    for (name, m) in [("target", &new_affine), ("input", affine)] {
        if m.ncols() <= k {
            return Err(AugmentError::configuration(format!(
                "{name} affine needs more than {k} columns, got {}x{}",
                m.nrows(),
                m.ncols()
            )));
        }
    }
    let new_last = new_affine.ncols() - 1;
    let old_last = affine.ncols() - 1;
    for r in 0..k {
        for c in 0..k {
            new_affine[(r, c)] = affine[(r, c)];
        }
        new_affine[(r, new_last)] = affine[(r, old_last)];
    }
    Ok(new_affine)
}

/// Replace the zoom of `affine` with `scale`, keeping its rotation.
///
/// Missing `scale` entries take the norms of the corresponding affine columns,
/// and zeros are replaced with 1.
/// If `diagonal`, the result is simply `diag(scale, 1)`.
/// Otherwise the linear block `RZS` is factored as `R·Z` with `Z` upper-triangular,
/// the result's linear block is `R·diag(scale)`,
/// and each translation component is scaled by `scale[i] / Z[i, i]`.
pub fn zoom_affine(affine: &Matrix, scale: &[f64], diagonal: bool) -> AugmentResult<Matrix> {
    if affine.nrows() == 0 || !affine.is_square() {
        return Err(AugmentError::configuration(format!(
            "affine must be a non-empty square matrix, got {}x{}",
            affine.nrows(),
            affine.ncols()
        )));
    }
    if scale.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return Err(AugmentError::configuration(format!(
            "zoom scale must be finite and non-negative, got {scale:?}"
        )));
    }
    let d = affine.nrows() - 1;
    let mut zooms: ShortVec<f64> = scale.iter().take(d).copied().collect();
    if zooms.len() < d {
        let norms = affine.column_norms();
        zooms.extend_from_slice(&norms[zooms.len()..d]);
    }
    for z in zooms.iter_mut() {
        if *z == 0.0 {
            *z = 1.0;
        }
    }

    if diagonal {
        zooms.push(1.0);
        return Ok(Matrix::from_diagonal(&zooms));
    }

    let rzs = affine.top_left(d)?;
    let zs = rzs
        .transpose()
        .dot(&rzs)?
        .cholesky_upper()
        .map_err(|_| AugmentError::configuration("affine linear block is singular"))?;
    let rotation = rzs.dot(&zs.inverse_upper_triangular()?)?;
    let linear = rotation.dot(&Matrix::from_diagonal(&zooms))?;

    let mut new_affine = Matrix::identity(d + 1);
    for r in 0..d {
        for c in 0..d {
            new_affine[(r, c)] = linear[(r, c)];
        }
        new_affine[(r, d)] = affine[(r, d)] * zooms[r] / zs[(r, r)];
    }
    Ok(new_affine)
}

/// Accumulates elementary transforms into one affine.
///
/// Each step right-multiplies the running matrix,
/// so when the result is applied to points the last step acts first.
#[derive(Debug, Clone)]
pub struct AffineBuilder {
    spatial_dims: usize,
    affine: Matrix,
}

impl AffineBuilder {
    pub fn new(spatial_dims: usize) -> Self {
        Self {
            spatial_dims,
            affine: Matrix::identity(spatial_dims + 1),
        }
    }

    pub fn rotate(self, radians: &[f64]) -> AugmentResult<Self> {
        let m = create_rotate(self.spatial_dims, radians)?;
        self.then(&m)
    }

    pub fn shear(self, coefs: &[f64]) -> AugmentResult<Self> {
        let m = create_shear(self.spatial_dims, coefs)?;
        self.then(&m)
    }

    pub fn scale(self, factors: &[f64]) -> AugmentResult<Self> {
        let m = create_scale(self.spatial_dims, factors);
        self.then(&m)
    }

    pub fn translate(self, shift: &[f64]) -> AugmentResult<Self> {
        let m = create_translate(self.spatial_dims, shift);
        self.then(&m)
    }

    /// Right-multiply an arbitrary `(d+1)×(d+1)` matrix.
    pub fn then(mut self, matrix: &Matrix) -> AugmentResult<Self> {
        self.affine = self.affine.dot(matrix)?;
        Ok(self)
    }

    pub fn build(self) -> Matrix {
        self.affine
    }
}
