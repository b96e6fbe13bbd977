//! Centered, bounds-safe copying between arrays of different shapes.
use std::ops::Range;

use ndarray::{ArrayBase, ArrayD, Data, DataMut, Dimension, IxDyn, Slice};
use smallvec::smallvec;

use crate::{AugmentError, AugmentResult, ShortVec};

/// Matching per-dimension windows into a source and a destination array.
///
/// Corresponding ranges always have the same length,
/// so `dest[dest] = src[src]` is shape-compatible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicePair {
    pub src: ShortVec<Range<usize>>,
    pub dest: ShortVec<Range<usize>>,
}

impl SlicePair {
    /// Copy the `src` window of `src` into the `dest` window of `dest`, in place.
    pub fn copy_into<A, S1, S2, D>(
        &self,
        src: &ArrayBase<S1, D>,
        dest: &mut ArrayBase<S2, D>,
    ) -> AugmentResult<()>
    where
        A: Clone,
        S1: Data<Elem = A>,
        S2: DataMut<Elem = A>,
        D: Dimension,
    {
        check_window(&self.src, src.shape(), "source")?;
        check_window(&self.dest, dest.shape(), "destination")?;
        for (dim, (s, d)) in self.src.iter().zip(self.dest.iter()).enumerate() {
            if s.len() != d.len() {
                return Err(AugmentError::configuration(format!(
                    "window lengths differ in dimension {dim}: {} vs {}",
                    s.len(),
                    d.len()
                )));
            }
        }

        let src_view = src.slice_each_axis(|ax| Slice::from(self.src[ax.axis.index()].clone()));
        dest.slice_each_axis_mut(|ax| Slice::from(self.dest[ax.axis.index()].clone()))
            .assign(&src_view);
        Ok(())
    }
}

fn check_window(window: &[Range<usize>], shape: &[usize], name: &str) -> AugmentResult<()> {
    if window.len() != shape.len() {
        return Err(AugmentError::configuration(format!(
            "{name} window has {} dimensions, array has {}",
            window.len(),
            shape.len()
        )));
    }
    for (dim, (w, s)) in window.iter().zip(shape.iter()).enumerate() {
        if w.end > *s {
            return Err(AugmentError::configuration(format!(
                "{name} window {w:?} exceeds extent {s} in dimension {dim}"
            )));
        }
    }
    Ok(())
}

/// Calculate the windows for copying an area of `src` into `dest`.
///
/// The area has per-dimension width `dims`, where 0 means "the whole dimension".
/// It is centred at `src_center` in the source and at `dest_center` in the destination.
/// Each window is clipped to fit in both arrays,
/// so a smaller area than requested may be copied.
///
/// Dimensions beyond the shortest of `src_center`, `dest_center` and `dims` are copied whole.
pub fn copypaste_arrays(
    src_shape: &[usize],
    dest_shape: &[usize],
    src_center: &[usize],
    dest_center: &[usize],
    dims: &[usize],
) -> AugmentResult<SlicePair> {
    if src_shape.len() != dest_shape.len() {
        return Err(AugmentError::configuration(format!(
            "source has {} dimensions, destination has {}",
            src_shape.len(),
            dest_shape.len()
        )));
    }
    let mut src: ShortVec<Range<usize>> = src_shape.iter().map(|s| 0..*s).collect();
    let mut dest: ShortVec<Range<usize>> = dest_shape.iter().map(|s| 0..*s).collect();

    for (i, ((&sc, &dc), &dim)) in src_center
        .iter()
        .zip(dest_center.iter())
        .zip(dims.iter())
        .enumerate()
        .take(src_shape.len())
    {
        if dim == 0 {
            continue;
        }
        let (ss, ds) = (src_shape[i], dest_shape[i]);
        if sc > ss || dc > ds {
            return Err(AugmentError::configuration(format!(
                "centers ({sc}, {dc}) outside extents ({ss}, {ds}) in dimension {i}"
            )));
        }
        // half-widths either side of the center, clipped to fit both arrays
        let before = (dim / 2).min(sc.min(dc));
        let after = (dim / 2 + 1).min((ss - sc).min(ds - dc));

        src[i] = (sc - before)..(sc + after);
        dest[i] = (dc - before)..(dc + after);
    }

    Ok(SlicePair { src, dest })
}

/// Crop or pad `img` about its center.
///
/// `resize_dims` gives the output extent per dimension, 0 keeping the input's extent.
/// Positions outside `img` are set to `fill_value`.
pub fn resize_center<A, S, D>(
    img: &ArrayBase<S, D>,
    resize_dims: &[usize],
    fill_value: A,
) -> AugmentResult<ArrayD<A>>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension,
{
    if resize_dims.len() != img.ndim() {
        return Err(AugmentError::configuration(format!(
            "got {} resize dimensions for a {}-dimensional array",
            resize_dims.len(),
            img.ndim()
        )));
    }
    let dims: ShortVec<usize> = resize_dims
        .iter()
        .zip(img.shape().iter())
        .map(|(&r, &s)| if r == 0 { s } else { r })
        .collect();

    let mut dest = ArrayD::from_elem(IxDyn(&dims), fill_value);
    let half_img: ShortVec<usize> = img.shape().iter().map(|s| s / 2).collect();
    let half_dest: ShortVec<usize> = dims.iter().map(|s| s / 2).collect();

    let slices = copypaste_arrays(img.shape(), &dims, &half_img, &half_dest, &dims)?;
    slices.copy_into(&img.view().into_dyn(), &mut dest)?;
    Ok(dest)
}

/// Extract a `roi_size` window centred at `center` from the channel-first `img`.
///
/// The channel axis is kept whole; `center` and `roi_size` cover the spatial axes only.
/// Any part of the window outside `img` is left at `A::default()`.
pub fn crop_roi<A, S, D>(
    img: &ArrayBase<S, D>,
    center: &[usize],
    roi_size: &[usize],
) -> AugmentResult<ArrayD<A>>
where
    A: Clone + Default,
    S: Data<Elem = A>,
    D: Dimension,
{
    let ndim = img.ndim();
    if ndim == 0 || center.len() + 1 != ndim || roi_size.len() + 1 != ndim {
        return Err(AugmentError::configuration(format!(
            "expected channel-first array with {} spatial dimensions, got shape {:?}",
            roi_size.len(),
            img.shape()
        )));
    }
    if roi_size.contains(&0) {
        return Err(AugmentError::configuration("ROI size must be non-zero"));
    }

    let mut dest_shape: ShortVec<usize> = smallvec![img.shape()[0]];
    dest_shape.extend_from_slice(roi_size);
    let mut src_center: ShortVec<usize> = smallvec![0];
    src_center.extend_from_slice(center);
    let mut dest_center: ShortVec<usize> = smallvec![0];
    dest_center.extend(roi_size.iter().map(|s| s / 2));
    let mut dims: ShortVec<usize> = smallvec![0];
    dims.extend_from_slice(roi_size);

    let mut dest = ArrayD::from_elem(IxDyn(&dest_shape), A::default());
    let slices = copypaste_arrays(img.shape(), &dest_shape, &src_center, &dest_center, &dims)?;
    slices.copy_into(&img.view().into_dyn(), &mut dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, Array2, ArrayD, IxDyn, array, s};

    use super::*;
    use crate::tests::{init_logger, new_rng};
    use rand::Rng;

    #[test]
    fn test_copypaste_docs_example() {
        init_logger();
        #[rustfmt::skip]
        let src = array![
            [9, 5, 6, 6, 9, 6],
            [4, 3, 5, 6, 1, 2],
            [0, 7, 3, 2, 4, 1],
            [3, 0, 0, 1, 5, 1],
            [9, 4, 7, 1, 8, 2],
            [6, 6, 5, 8, 6, 7],
        ];
        let mut dest = Array2::<i32>::zeros((6, 6));
        let slices = copypaste_arrays(src.shape(), dest.shape(), &[3, 2], &[2, 1], &[3, 4]).unwrap();
        assert_eq!(slices.src.as_slice(), &[2..5, 1..5]);
        assert_eq!(slices.dest.as_slice(), &[1..4, 0..4]);

        slices.copy_into(&src, &mut dest).unwrap();
        #[rustfmt::skip]
        let expected = array![
            [0, 0, 0, 0, 0, 0],
            [7, 3, 2, 4, 0, 0],
            [0, 0, 1, 5, 0, 0],
            [4, 7, 1, 8, 0, 0],
            [0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0],
        ];
        assert_eq!(dest, expected);
    }

    #[test]
    fn test_copypaste_zero_dim_copies_whole() {
        let slices = copypaste_arrays(&[4, 7], &[4, 7], &[1, 1], &[1, 1], &[0, 2]).unwrap();
        assert_eq!(slices.src[0], 0..4);
        assert_eq!(slices.dest[0], 0..4);
        assert_eq!(slices.src[1], 0..3);
    }

    #[test]
    fn test_copypaste_short_dims() {
        let slices = copypaste_arrays(&[4, 7], &[4, 7], &[2, 3], &[2, 3], &[2]).unwrap();
        assert_eq!(slices.src[0], 1..4);
        assert_eq!(slices.src[1], 0..7);
    }

    #[test]
    fn test_copypaste_rank_mismatch() {
        assert!(matches!(
            copypaste_arrays(&[4, 4], &[4], &[1, 1], &[1], &[2, 2]),
            Err(AugmentError::Configuration(_))
        ));
    }

    #[test]
    fn test_copypaste_center_outside() {
        assert!(copypaste_arrays(&[4], &[4], &[5], &[1], &[2]).is_err());
    }

    #[test]
    fn test_copypaste_stays_in_bounds() {
        init_logger();
        let mut rng = new_rng();
        for _ in 0..500 {
            let ndim = rng.random_range(1..4);
            let src_shape: Vec<usize> = (0..ndim).map(|_| rng.random_range(1..12)).collect();
            let dest_shape: Vec<usize> = (0..ndim).map(|_| rng.random_range(1..12)).collect();
            let src_center: Vec<usize> =
                src_shape.iter().map(|s| rng.random_range(0..*s)).collect();
            let dest_center: Vec<usize> =
                dest_shape.iter().map(|s| rng.random_range(0..*s)).collect();
            let dims: Vec<usize> = (0..ndim).map(|_| rng.random_range(1..15)).collect();

            let slices =
                copypaste_arrays(&src_shape, &dest_shape, &src_center, &dest_center, &dims)
                    .unwrap();
            for i in 0..ndim {
                assert!(slices.src[i].end <= src_shape[i]);
                assert!(slices.dest[i].end <= dest_shape[i]);
                assert_eq!(slices.src[i].len(), slices.dest[i].len());
            }
        }
    }

    #[test]
    fn test_copy_into_rejects_mismatch() {
        let src = Array2::<u8>::zeros((4, 4));
        let mut dest = Array2::<u8>::zeros((3, 3));
        let slices = SlicePair {
            src: smallvec![0..4, 0..4],
            dest: smallvec![0..3, 0..3],
        };
        assert!(slices.copy_into(&src, &mut dest).is_err());
    }

    fn ramp(shape: &[usize]) -> ArrayD<f32> {
        let n: usize = shape.iter().product();
        Array::range(0.0, n as f32, 1.0)
            .into_shape_with_order(IxDyn(shape))
            .unwrap()
    }

    #[test]
    fn test_resize_center_identity() {
        for shape in [vec![5, 4], vec![3, 6, 7], vec![1]] {
            let img = ramp(&shape);
            let resized = resize_center(&img, &shape, -1.0).unwrap();
            assert_eq!(resized, img);
            let zeros = vec![0; shape.len()];
            assert_eq!(resize_center(&img, &zeros, -1.0).unwrap(), img);
        }
    }

    #[test]
    fn test_resize_center_pad_then_crop() {
        for (small, large) in [([3, 3], [5, 5]), ([4, 4], [6, 6]), ([4, 5], [9, 8])] {
            let img = ramp(&small);
            let padded = resize_center(&img, &large, -1.0).unwrap();
            assert_eq!(padded.shape(), &large);
            let n_fill = padded.iter().filter(|v| **v == -1.0).count();
            assert_eq!(n_fill, large.iter().product::<usize>() - img.len());

            let cropped = resize_center(&padded, &small, -1.0).unwrap();
            assert_eq!(cropped, img);
        }
    }

    #[test]
    fn test_resize_center_crop_is_centered() {
        let img = ramp(&[5, 5]);
        let cropped = resize_center(&img, &[3, 0], 0.0).unwrap();
        assert_eq!(cropped.shape(), &[3, 5]);
        assert_eq!(cropped, img.slice(s![1..4, ..]).into_dyn());
    }

    #[test]
    fn test_resize_center_wrong_rank() {
        let img = ramp(&[5, 5]);
        assert!(resize_center(&img, &[3], 0.0).is_err());
    }

    #[test]
    fn test_crop_roi_shape() {
        let img = ramp(&[2, 10, 10]);
        let roi = crop_roi(&img, &[5, 5], &[4, 4]).unwrap();
        assert_eq!(roi.shape(), &[2, 4, 4]);
        assert_eq!(roi, img.slice(s![.., 3..7, 3..7]).into_dyn());
    }

    #[test]
    fn test_crop_roi_at_edge_keeps_default() {
        let img = ramp(&[1, 6, 6]) + 1.0;
        let roi = crop_roi(&img, &[0, 0], &[3, 3]).unwrap();
        assert_eq!(roi.shape(), &[1, 3, 3]);
        assert_eq!(roi[[0, 0, 0]], 0.0);
        assert_eq!(roi[[0, 1, 1]], img[[0, 0, 0]]);
    }

    #[test]
    fn test_crop_roi_bad_rank() {
        let img = ramp(&[10, 10]);
        assert!(crop_roi(&img, &[5, 5], &[4, 4]).is_err());
        let img = ramp(&[1, 10, 10]);
        assert!(crop_roi(&img, &[5, 5], &[0, 4]).is_err());
    }
}
