//! Coordinate meshes centred on the origin.
//!
//! A grid for `spatial_size` `[d0, d1, ...]` has shape `[n, d0, d1, ...]`,
//! where plane `i` of the leading axis holds the coordinate along spatial axis `i`
//! and `n` is the number of spatial dimensions (plus one for homogeneous grids,
//! whose last plane is all ones).
use log::debug;
use ndarray::{ArrayBase, ArrayD, Axis, Data, Dimension, IxDyn};

use crate::{AugmentError, AugmentResult, Matrix, ShortVec, as_muts, as_refs};

/// Element types a grid can be generated in.
pub trait GridElement: Copy {
    fn from_f64(val: f64) -> Self;
}

impl GridElement for f64 {
    fn from_f64(val: f64) -> Self {
        val
    }
}

impl GridElement for f32 {
    fn from_f64(val: f64) -> Self {
        val as f32
    }
}

/// Dense mesh with `spacing` between neighbouring points (default 1.0 in every dimension).
///
/// Along spatial axis `i`, the `d` points run linearly from
/// `-(d-1)/2 * spacing[i]` to `(d-1)/2 * spacing[i]`.
pub fn create_grid<T: GridElement>(
    spatial_size: &[usize],
    spacing: Option<&[f64]>,
    homogeneous: bool,
) -> AugmentResult<ArrayD<T>> {
    let ndim = spatial_size.len();
    let spacing: ShortVec<f64> = match spacing {
        Some(s) if s.len() != ndim => {
            return Err(AugmentError::configuration(format!(
                "got {} spacings for {} spatial dimensions",
                s.len(),
                ndim
            )));
        }
        Some(s) => s.iter().copied().collect(),
        None => smallvec::smallvec![1.0; ndim],
    };
    let half: ShortVec<f64> = spatial_size
        .iter()
        .map(|d| (*d as f64 - 1.0) / 2.0)
        .collect();

    let mut shape: ShortVec<usize> = smallvec::smallvec![ndim + usize::from(homogeneous)];
    shape.extend_from_slice(spatial_size);

    Ok(ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
        let plane = idx[0];
        if plane == ndim {
            return T::from_f64(1.0);
        }
        T::from_f64((idx[plane + 1] as f64 - half[plane]) * spacing[plane])
    }))
}

/// Coarse mesh of control points with `spacing` between them,
/// extending at least one point beyond a dense grid of `spatial_shape` on every side.
pub fn create_control_grid<T: GridElement>(
    spatial_shape: &[usize],
    spacing: &[f64],
    homogeneous: bool,
) -> AugmentResult<ArrayD<T>> {
    if spacing.len() != spatial_shape.len() {
        return Err(AugmentError::configuration(format!(
            "got {} spacings for {} spatial dimensions",
            spacing.len(),
            spatial_shape.len()
        )));
    }
    if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(AugmentError::configuration(format!(
            "control grid spacing must be finite and positive, got {spacing:?}"
        )));
    }

    let grid_shape: ShortVec<usize> = spatial_shape
        .iter()
        .zip(spacing.iter())
        .map(|(&d, &s)| {
            let d = d as f64;
            let n = if d % 2.0 == 0.0 {
                ((d - 1.0) / (2.0 * s) + 0.5).ceil() * 2.0 + 2.0
            } else {
                ((d - 1.0) / (2.0 * s)).ceil() * 2.0 + 3.0
            };
            if n < 1.0 {
                return Err(AugmentError::configuration(format!(
                    "no control points for spatial shape {spatial_shape:?} with spacing {spacing:?}"
                )));
            }
            Ok(n as usize)
        })
        .collect::<AugmentResult<_>>()?;
    debug!("Control grid shape {grid_shape:?} for spatial shape {spatial_shape:?}");

    create_grid(&grid_shape, Some(spacing), homogeneous)
}

/// Apply a homogeneous `affine` to every point of a homogeneous `grid`.
///
/// Only coordinates are transformed; nothing is resampled.
pub fn transform_grid<S, D>(affine: &Matrix, grid: &ArrayBase<S, D>) -> AugmentResult<ArrayD<f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let Some((&n_planes, spatial)) = grid.shape().split_first() else {
        return Err(AugmentError::configuration(
            "grid must have a leading coordinate axis",
        ));
    };
    if !affine.is_square() || affine.ncols() != n_planes {
        return Err(AugmentError::configuration(format!(
            "cannot apply {}x{} affine to grid of shape {:?}",
            affine.nrows(),
            affine.ncols(),
            grid.shape()
        )));
    }
    let n_pts: usize = spatial.iter().product();
    if n_pts == 0 {
        return Ok(grid.to_owned().into_dyn());
    }

    let planes: Vec<Vec<f64>> = grid
        .view()
        .into_dyn()
        .axis_iter(Axis(0))
        .map(|plane| plane.iter().copied().collect())
        .collect();
    let mut out = vec![vec![f64::NAN; n_pts]; n_planes];
    affine.matmul_transposed_into(&as_refs(&planes), &mut as_muts(&mut out));

    ArrayD::from_shape_vec(IxDyn(grid.shape()), out.concat())
        .map_err(|e| AugmentError::configuration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;
    use crate::tests::{SMALL_NUMBER, init_logger};
    use crate::{create_scale, create_translate};

    #[test]
    fn test_create_grid_2d() {
        init_logger();
        let grid = create_grid::<f64>(&[3, 3], None, false).unwrap();
        assert_eq!(grid.shape(), &[2, 3, 3]);
        let expected = array![
            [[-1.0, -1.0, -1.0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            [[-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]],
        ]
        .into_dyn();
        assert_eq!(grid, expected);
    }

    #[test]
    fn test_create_grid_homogeneous_spacing() {
        let grid = create_grid::<f32>(&[2, 3], Some(&[1.0, 2.0]), true).unwrap();
        assert_eq!(grid.shape(), &[3, 2, 3]);
        let expected = array![
            [[-0.5f32, -0.5, -0.5], [0.5, 0.5, 0.5]],
            [[-2.0, 0.0, 2.0], [-2.0, 0.0, 2.0]],
            [[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]],
        ]
        .into_dyn();
        assert_eq!(grid, expected);
    }

    #[test]
    fn test_create_grid_single_point() {
        let grid = create_grid::<f64>(&[1], Some(&[3.0]), false).unwrap();
        assert_eq!(grid.shape(), &[1, 1]);
        assert_eq!(grid[[0, 0]], 0.0);
    }

    #[test]
    fn test_create_grid_spacing_mismatch() {
        assert!(matches!(
            create_grid::<f64>(&[2, 2], Some(&[1.0]), true),
            Err(AugmentError::Configuration(_))
        ));
    }

    #[test]
    fn test_grid_is_symmetric() {
        let grid = create_grid::<f64>(&[4, 5, 6], Some(&[0.5, 1.0, 2.0]), false).unwrap();
        for (plane_idx, plane) in grid.axis_iter(Axis(0)).enumerate() {
            let sum: f64 = plane.iter().sum();
            assert_relative_eq!(sum, 0.0, epsilon = SMALL_NUMBER);
            let max = plane.iter().copied().fold(f64::MIN, f64::max);
            let min = plane.iter().copied().fold(f64::MAX, f64::min);
            assert_relative_eq!(max, -min, epsilon = SMALL_NUMBER);
            let spacing = [0.5, 1.0, 2.0][plane_idx];
            let extent = [4.0, 5.0, 6.0][plane_idx];
            assert_relative_eq!(max, (extent - 1.0) / 2.0 * spacing, epsilon = SMALL_NUMBER);
        }
    }

    #[test]
    fn test_control_grid_shape() {
        init_logger();
        // even: ceil(9/4 + 0.5) * 2 + 2 = 8; odd: ceil(10/4) * 2 + 3 = 9
        let grid = create_control_grid::<f64>(&[10, 11], &[2.0, 2.0], true).unwrap();
        assert_eq!(grid.shape(), &[3, 8, 9]);
        let grid = create_control_grid::<f64>(&[4, 5], &[1.0, 1.0], false).unwrap();
        assert_eq!(grid.shape(), &[2, 6, 7]);
    }

    #[test]
    fn test_control_grid_covers_dense_grid() {
        for (shape, spacing) in [([10, 11], [2.0, 2.0]), ([7, 16], [3.0, 5.0])] {
            let dense = create_grid::<f64>(&shape, None, false).unwrap();
            let control = create_control_grid::<f64>(&shape, &spacing, false).unwrap();
            for axis in 0..2 {
                let dense_max = dense
                    .index_axis(Axis(0), axis)
                    .iter()
                    .copied()
                    .fold(f64::MIN, f64::max);
                let control_max = control
                    .index_axis(Axis(0), axis)
                    .iter()
                    .copied()
                    .fold(f64::MIN, f64::max);
                assert!(control_max > dense_max);
            }
        }
    }

    #[test]
    fn test_control_grid_bad_spacing() {
        assert!(create_control_grid::<f64>(&[4, 4], &[1.0, 0.0], true).is_err());
        assert!(create_control_grid::<f64>(&[4, 4], &[1.0], true).is_err());
    }

    #[test]
    fn test_transform_grid_identity() {
        let grid = create_grid::<f64>(&[3, 4], None, true).unwrap();
        let out = transform_grid(&Matrix::identity(3), &grid).unwrap();
        assert_eq!(out, grid);
    }

    #[test]
    fn test_transform_grid_translate_scale() {
        let grid = create_grid::<f64>(&[3, 4], None, true).unwrap();
        let affine = create_translate(2, &[10.0, -2.0])
            .dot(&create_scale(2, &[2.0, 3.0]))
            .unwrap();
        let out = transform_grid(&affine, &grid).unwrap();
        for ((x, y), (ox, oy)) in grid
            .index_axis(Axis(0), 0)
            .iter()
            .zip(grid.index_axis(Axis(0), 1).iter())
            .zip(out.index_axis(Axis(0), 0).iter().zip(out.index_axis(Axis(0), 1).iter()))
        {
            assert_relative_eq!(*ox, x * 2.0 + 10.0, epsilon = SMALL_NUMBER);
            assert_relative_eq!(*oy, y * 3.0 - 2.0, epsilon = SMALL_NUMBER);
        }
        assert!(out.index_axis(Axis(0), 2).iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_control_grid_empty_extent() {
        // extent 0 gives a negative point count once spacing is at most 1/3
        assert!(matches!(
            create_control_grid::<f64>(&[0, 4], &[0.1, 1.0], false),
            Err(AugmentError::Configuration(_))
        ));
    }

    #[test]
    fn test_transform_grid_scalar() {
        let scalar = ArrayD::<f64>::zeros(IxDyn(&[]));
        assert!(matches!(
            transform_grid(&Matrix::identity(0), &scalar),
            Err(AugmentError::Configuration(_))
        ));
    }

    #[test]
    fn test_transform_grid_mismatch() {
        let grid = create_grid::<f64>(&[3, 4], None, false).unwrap();
        assert!(transform_grid(&Matrix::identity(3), &grid).is_err());
    }
}
