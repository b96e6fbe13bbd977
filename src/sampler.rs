//! Stratified sampling of ROI centers from labelled volumes.
//!
//! Candidate centers are drawn from the foreground (any label channel set)
//! or the background, at a configured ratio,
//! and are then clamped so that an ROI of the configured size
//! centred on them lies entirely inside the volume.
use std::fmt;

use log::{debug, trace, warn};
use ndarray::{Array, ArrayBase, Axis, Data, Dimension, IxDyn};
use smallvec::ToSmallVec;

use crate::{AugmentError, AugmentResult, RandomSource, ShortVec};

/// Spatial coordinate of an ROI center, one entry per spatial dimension.
pub type CropCenter = ShortVec<usize>;

/// Foreground or background had no candidates,
/// so every sample was drawn from the other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradedSampling {
    pub n_foreground: usize,
    pub n_background: usize,
}

impl fmt::Display for DegradedSampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N foreground {}, N background {}, unable to generate class balanced samples",
            self.n_foreground, self.n_background
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampledCenters {
    /// Centers in draw order; may contain duplicates.
    pub centers: Vec<CropCenter>,
    /// Set when the requested foreground ratio could not be honoured.
    pub degraded: Option<DegradedSampling>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PosNegLabelSampler {
    roi_size: ShortVec<usize>,
    num_samples: usize,
    pos_ratio: f64,
}

impl PosNegLabelSampler {
    pub fn builder(roi_size: &[usize]) -> PosNegLabelSamplerBuilder {
        PosNegLabelSamplerBuilder::new(roi_size)
    }

    pub fn roi_size(&self) -> &[usize] {
        &self.roi_size
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn pos_ratio(&self) -> f64 {
        self.pos_ratio
    }

    /// Sample centers from a channel-first `label`,
    /// where every non-foreground location is background.
    pub fn sample<A, S, D, R>(
        &self,
        label: &ArrayBase<S, D>,
        rng: &mut R,
    ) -> AugmentResult<SampledCenters>
    where
        A: PartialEq + Default,
        S: Data<Elem = A>,
        D: Dimension,
        R: RandomSource,
    {
        let spatial = self.spatial_shape(label.shape())?;
        let fg_mask = foreground_mask(label);
        let (fg, bg) = partition(fg_mask.iter().map(|f| (*f, !*f)));
        self.draw(&spatial, fg, bg, rng)
    }

    /// Sample centers from a channel-first `label`,
    /// where background is restricted to locations at which any channel of
    /// the channel-first `image` exceeds `image_threshold`.
    pub fn sample_thresholded<A, S, D, B, S2, D2, R>(
        &self,
        label: &ArrayBase<S, D>,
        image: &ArrayBase<S2, D2>,
        image_threshold: B,
        rng: &mut R,
    ) -> AugmentResult<SampledCenters>
    where
        A: PartialEq + Default,
        S: Data<Elem = A>,
        D: Dimension,
        B: PartialOrd,
        S2: Data<Elem = B>,
        D2: Dimension,
        R: RandomSource,
    {
        let spatial = self.spatial_shape(label.shape())?;
        if image.ndim() != label.ndim() || image.shape()[1..] != spatial[..] {
            return Err(AugmentError::configuration(format!(
                "image spatial shape {:?} does not match label spatial shape {:?}",
                image.shape().get(1..).unwrap_or_default(),
                spatial
            )));
        }
        let fg_mask = foreground_mask(label);
        let valid = image
            .view()
            .into_dyn()
            .map_axis(Axis(0), |lane| lane.iter().any(|v| v > &image_threshold));
        let (fg, bg) = partition(
            fg_mask
                .iter()
                .zip(valid.iter())
                .map(|(f, v)| (*f, *v && !*f)),
        );
        self.draw(&spatial, fg, bg, rng)
    }

    fn spatial_shape(&self, label_shape: &[usize]) -> AugmentResult<ShortVec<usize>> {
        let Some(spatial) = label_shape.get(1..) else {
            return Err(AugmentError::configuration(
                "label must have a leading channel axis",
            ));
        };
        if spatial.len() != self.roi_size.len() {
            return Err(AugmentError::configuration(format!(
                "ROI size {:?} does not match label spatial dimensions {:?}",
                self.roi_size, spatial
            )));
        }
        if self.roi_size.iter().zip(spatial.iter()).any(|(r, s)| r > s) {
            return Err(AugmentError::configuration(format!(
                "ROI size {:?} is larger than label spatial shape {:?}",
                self.roi_size, spatial
            )));
        }
        Ok(spatial.to_smallvec())
    }

    fn draw<R: RandomSource>(
        &self,
        spatial: &[usize],
        fg: Vec<usize>,
        bg: Vec<usize>,
        rng: &mut R,
    ) -> AugmentResult<SampledCenters> {
        let (valid_start, valid_end) = valid_range(spatial, &self.roi_size);
        debug!("Valid center range {valid_start:?}..{valid_end:?} for spatial shape {spatial:?}");

        let mut pos_ratio = self.pos_ratio;
        let mut degraded = None;
        if fg.is_empty() || bg.is_empty() {
            if fg.is_empty() && bg.is_empty() {
                return Err(AugmentError::SamplingExhausted);
            }
            let d = DegradedSampling {
                n_foreground: fg.len(),
                n_background: bg.len(),
            };
            warn!("{d}");
            pos_ratio = if fg.is_empty() { 0.0 } else { 1.0 };
            degraded = Some(d);
        }

        let mut centers = Vec::with_capacity(self.num_samples);
        for _ in 0..self.num_samples {
            let pool = if rng.next_uniform() < pos_ratio {
                &fg
            } else {
                &bg
            };
            let flat = pool[rng.next_below(pool.len())];
            let mut center = unravel_index(flat, spatial);
            // shift into the range of valid centers
            for ((c, start), end) in center
                .iter_mut()
                .zip(valid_start.iter())
                .zip(valid_end.iter())
            {
                if *c < *start {
                    *c = *start;
                }
                if *c >= *end {
                    *c = end - 1;
                }
            }
            trace!("Drew flat index {flat}, center {center:?}");
            centers.push(center);
        }

        Ok(SampledCenters { centers, degraded })
    }
}

#[derive(Debug, Clone)]
pub struct PosNegLabelSamplerBuilder {
    roi_size: ShortVec<usize>,
    num_samples: usize,
    pos_ratio: f64,
}

impl PosNegLabelSamplerBuilder {
    fn new(roi_size: &[usize]) -> Self {
        Self {
            roi_size: roi_size.to_smallvec(),
            num_samples: 1,
            pos_ratio: 0.5,
        }
    }

    /// Number of centers per call. Default 1.
    pub fn num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Probability of drawing each center from the foreground. Default 0.5.
    pub fn pos_ratio(mut self, pos_ratio: f64) -> Self {
        self.pos_ratio = pos_ratio;
        self
    }

    pub fn build(self) -> AugmentResult<PosNegLabelSampler> {
        if !(0.0..=1.0).contains(&self.pos_ratio) {
            return Err(AugmentError::configuration(format!(
                "pos_ratio must be in [0, 1], got {}",
                self.pos_ratio
            )));
        }
        Ok(PosNegLabelSampler {
            roi_size: self.roi_size,
            num_samples: self.num_samples,
            pos_ratio: self.pos_ratio,
        })
    }
}

/// Per-dimension `[start, end)` range of centers
/// for which a `roi_size` window stays inside `spatial`.
///
/// Requires `roi_size[i] <= spatial[i]`.
fn valid_range(spatial: &[usize], roi_size: &[usize]) -> (ShortVec<usize>, ShortVec<usize>) {
    let start: ShortVec<usize> = roi_size.iter().map(|r| r / 2).collect();
    // floor(spatial + 1 - roi / 2)
    let mut end: ShortVec<usize> = spatial
        .iter()
        .zip(roi_size.iter())
        .map(|(s, r)| s + 1 - r.div_ceil(2))
        .collect();
    for (s, e) in start.iter().zip(end.iter_mut()) {
        if s == e {
            *e += 1;
        }
    }
    (start, end)
}

/// Flattened (row-major) mask of locations where any channel is non-zero.
fn foreground_mask<A, S, D>(label: &ArrayBase<S, D>) -> Array<bool, IxDyn>
where
    A: PartialEq + Default,
    S: Data<Elem = A>,
    D: Dimension,
{
    let zero = A::default();
    label
        .view()
        .into_dyn()
        .map_axis(Axis(0), |lane| lane.iter().any(|v| *v != zero))
}

/// Split flat indices into foreground and background lists.
fn partition(flags: impl Iterator<Item = (bool, bool)>) -> (Vec<usize>, Vec<usize>) {
    let mut fg = Vec::new();
    let mut bg = Vec::new();
    for (idx, (is_fg, is_bg)) in flags.enumerate() {
        if is_fg {
            fg.push(idx);
        }
        if is_bg {
            bg.push(idx);
        }
    }
    (fg, bg)
}

fn unravel_index(mut flat: usize, shape: &[usize]) -> CropCenter {
    let mut coord: CropCenter = smallvec::smallvec![0; shape.len()];
    for (c, s) in coord.iter_mut().zip(shape.iter()).rev() {
        *c = flat % s;
        flat /= s;
    }
    coord
}
