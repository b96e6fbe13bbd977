//! Geometric and sampling primitives for spatial data augmentation
//! of channel-first image and volume arrays.
//!
//! Nothing here keeps state between calls:
//! randomness is always drawn from a caller-supplied [RandomSource],
//! and arrays are borrowed for the duration of a call only.
use smallvec::SmallVec;
#[cfg(test)]
mod tests;

mod error;
pub use error::{AugmentError, AugmentResult};

mod random;
pub use random::RandomSource;

mod matrix;
pub use matrix::Matrix;

pub mod affine;
pub use affine::{
    AffineBuilder, AffineTarget, compose, create_rotate, create_scale, create_shear,
    create_translate, to_affine_nd, zoom_affine,
};

pub mod clip;
pub use clip::{SlicePair, copypaste_arrays, crop_roi, resize_center};

pub mod grid;
pub use grid::{GridElement, create_control_grid, create_grid, transform_grid};

pub mod sampler;
pub use sampler::{
    CropCenter, DegradedSampling, PosNegLabelSampler, PosNegLabelSamplerBuilder, SampledCenters,
};

pub const COORD_SIZE: usize = 6;

/// A short vector type alias for convenience,
/// sized so that coordinates and shapes of typical images stay on the stack.
pub type ShortVec<T> = SmallVec<[T; COORD_SIZE]>;

/// Convenience function for turning a slice of sliceables into a vec of slices.
/// Allocates a new vec.
pub(crate) fn as_refs<T, Inner: AsRef<[T]>>(input: &[Inner]) -> Vec<&[T]> {
    input.iter().map(|v| v.as_ref()).collect()
}

/// Convenience function for turning a mut slice of sliceables into a vec of mut slices.
/// Allocates a new vec.
pub(crate) fn as_muts<T, Inner: AsMut<[T]>>(input: &mut [Inner]) -> Vec<&mut [T]> {
    input.iter_mut().map(|v| v.as_mut()).collect()
}
