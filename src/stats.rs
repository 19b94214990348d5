//! Per-clump measurements over a labeled region.
//!
//! One pass over the label raster accumulates, for every clump, the flux sum
//! and pixel count of its interior, the flux sum and count of the river
//! pixels touching it, and a flux-weighted centroid. River pixels contested
//! by several clumps contribute once to each distinct neighbor, so a shared
//! valley raises the background estimate of both clumps that share it.

use ndarray::ArrayView2;

use crate::config::SegmentParams;
use crate::label::Label;
use crate::neighbors::neighbors;

/// Position-dependent noise standard deviation.
///
/// Implemented by sky-noise maps that vary across the frame; a plain `f64`
/// serves as a uniform noise level.
pub trait NoiseStd {
    /// Noise standard deviation at a (possibly fractional) image position.
    fn sigma_at(&self, row: f64, col: f64) -> f64;
}

impl NoiseStd for f64 {
    fn sigma_at(&self, _row: f64, _col: f64) -> f64 {
        *self
    }
}

/// Aggregated measurements for one clump.
#[derive(Debug, Clone, Default)]
pub struct ClumpStats {
    /// Sum of finite interior pixel values.
    pub inner_sum: f64,
    /// Number of finite interior pixels.
    pub inner_count: usize,
    /// Sum of finite river pixel values adjacent to this clump.
    pub river_sum: f64,
    /// Number of finite river pixels adjacent to this clump.
    pub river_count: usize,
    /// Flux-weighted centroid in parent-image coordinates, if the clump's
    /// total flux is positive.
    pub centroid: Option<(f64, f64)>,
    /// Noise standard deviation at the centroid, 0 when unavailable.
    pub local_sigma: f64,
    /// Row moment `sum(v * row)` over region-local rows.
    pub(crate) row_weight: f64,
    /// Column moment `sum(v * col)` over region-local columns.
    pub(crate) col_weight: f64,
}

impl ClumpStats {
    /// Mean interior value, 0 for an empty interior.
    pub fn inner_mean(&self) -> f64 {
        if self.inner_count == 0 {
            0.0
        } else {
            self.inner_sum / self.inner_count as f64
        }
    }

    /// Mean adjacent-river value, 0 when no river touches the clump.
    pub fn river_mean(&self) -> f64 {
        if self.river_count == 0 {
            0.0
        } else {
            self.river_sum / self.river_count as f64
        }
    }
}

/// Measure every clump of a labeled region.
///
/// `values` holds the raw pixels (NaN entries are skipped), `origin` is the
/// region's position in the parent image so centroids come out in parent
/// coordinates, and `noise` supplies the per-position noise level looked up
/// at each centroid.
pub fn aggregate_clump_stats(
    values: ArrayView2<f64>,
    labels: ArrayView2<Label>,
    num_clumps: u32,
    origin: (usize, usize),
    params: &SegmentParams,
    noise: Option<&dyn NoiseStd>,
) -> Vec<ClumpStats> {
    assert_eq!(values.dim(), labels.dim());
    let (height, width) = values.dim();
    let mut stats = vec![ClumpStats::default(); num_clumps as usize];

    for ((row, col), &label) in labels.indexed_iter() {
        let value = values[(row, col)];
        if value.is_nan() {
            continue;
        }
        match label {
            Label::Unprocessed => {}
            Label::Clump(id) => {
                let s = &mut stats[(id - 1) as usize];
                s.inner_sum += value;
                s.inner_count += 1;
                s.row_weight += value * row as f64;
                s.col_weight += value * col as f64;
            }
            Label::River => {
                // Credit this river pixel to each distinct adjacent clump
                // exactly once.
                let mut seen = [0u32; 8];
                let mut n_seen = 0;
                for (nr, nc) in neighbors(row, col, height, width, params.connectivity) {
                    if let Label::Clump(id) = labels[(nr, nc)] {
                        if !seen[..n_seen].contains(&id) {
                            seen[n_seen] = id;
                            n_seen += 1;
                            let s = &mut stats[(id - 1) as usize];
                            s.river_sum += value;
                            s.river_count += 1;
                        }
                    }
                }
            }
        }
    }

    for s in &mut stats {
        // A noise clump can sum to a negative flux or negative coordinate
        // moments; a centroid built from those would index the noise grid
        // with a bogus position, so such clumps get no centroid at all.
        if s.inner_sum > 0.0 && s.row_weight >= 0.0 && s.col_weight >= 0.0 {
            let row = origin.0 as f64 + s.row_weight / s.inner_sum;
            let col = origin.1 as f64 + s.col_weight / s.inner_sum;
            s.centroid = Some((row, col));
            if let Some(noise) = noise {
                s.local_sigma = noise.sigma_at(row, col);
            }
        }
    }
    stats
}
