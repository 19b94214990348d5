//! Per-tile noise calibration of the clump acceptance threshold.
//!
//! Each tile with enough background is over-segmented on its own, producing
//! a population of pure-noise clumps whose signal-to-noise distribution
//! tells us what noise alone can fake. A high quantile of that distribution,
//! taken after trimming spurious bright outliers, becomes the tile's
//! acceptance threshold; tiles that cannot be measured inherit a value from
//! their neighbors.

use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;

use crate::config::SegmentParams;
use crate::error::SegmentError;
use crate::label::Label;
use crate::mesh::Tiling;
use crate::oversegment::{oversegment, SegScratch};
use crate::raster::SegmentImage;
use crate::snr::clump_snr_table;
use crate::stats::{aggregate_clump_stats, NoiseStd};

/// Picks how much of a sorted distribution to keep before quantile lookup.
pub trait OutlierTrim {
    /// Length of the prefix of `sorted` (ascending) to keep.
    fn trimmed_len(&self, sorted: &[f64]) -> usize;
}

/// Shape-based outlier trim on the cumulative distribution.
///
/// Walking up the sorted values, the local slope of the cumulative
/// distribution is proportional to the density of samples. Genuine noise
/// values are dense; contaminating bright values (an undetected source in a
/// "background" tile) sit in a sparse tail. The trim cuts at the first
/// point past the densest region where the slope falls below a fraction of
/// the peak slope.
#[derive(Debug, Clone)]
pub struct FlatCdfTrim {
    /// Fraction of the peak slope below which the tail is cut.
    pub slope_fraction: f64,
}

impl Default for FlatCdfTrim {
    fn default() -> Self {
        FlatCdfTrim { slope_fraction: 0.05 }
    }
}

impl OutlierTrim for FlatCdfTrim {
    fn trimmed_len(&self, sorted: &[f64]) -> usize {
        let n = sorted.len();
        if n < 5 {
            return n;
        }
        // Slope over a window of k samples each side; widening the window
        // keeps a single tight pair of values from dominating the peak.
        let k = (n / 10).max(1);
        let slope = |i: usize| 2.0 * k as f64 / (sorted[i + k] - sorted[i - k]);
        let mut max_slope = 0.0f64;
        let mut max_at = k;
        for i in k..n - k {
            let s = slope(i);
            if s.is_finite() && s > max_slope {
                max_slope = s;
                max_at = i;
            }
        }
        if max_slope == 0.0 {
            return n;
        }
        for i in max_at + 1..n - k {
            let s = slope(i);
            if s.is_finite() && s < self.slope_fraction * max_slope {
                return i;
            }
        }
        n
    }
}

/// Calibrated per-tile thresholds.
#[derive(Debug, Clone)]
pub struct ThresholdGrid {
    /// One threshold per tile, indexed as the tiling indexes its tiles.
    pub values: Vec<f64>,
}

impl ThresholdGrid {
    /// View the grid as a position-keyed threshold via its tiling.
    pub fn surface<'a, T: Tiling>(&'a self, tiling: &'a T) -> ThresholdSurface<'a, T> {
        ThresholdSurface { grid: self, tiling }
    }
}

/// A [`ThresholdGrid`] paired with its tiling for position lookups.
pub struct ThresholdSurface<'a, T: Tiling> {
    grid: &'a ThresholdGrid,
    tiling: &'a T,
}

impl<T: Tiling> crate::filter::LocalThreshold for ThresholdSurface<'_, T> {
    fn threshold_at(&self, row: f64, col: f64) -> f64 {
        self.grid.values[self.tiling.tile_index_at(row, col)]
    }
}

/// Measure a pure-noise acceptance threshold on every tile.
///
/// `background` marks the pixels with no detected signal; only tiles where
/// the background fraction reaches `params.min_bg_fraction` are measured,
/// and a tile must yield at least `params.min_clumps` scored noise clumps
/// both before and after trimming for its quantile to be trusted. Skipped
/// tiles are interpolated from their measured neighbors.
///
/// Tiles are independent, so they are measured in parallel with one scratch
/// buffer per worker.
pub fn noise_sn_thresholds<T: Tiling + Sync>(
    image: &SegmentImage,
    background: ArrayView2<bool>,
    tiling: &T,
    params: &SegmentParams,
    noise: Option<&(dyn NoiseStd + Sync)>,
    trim: &(dyn OutlierTrim + Sync),
) -> Result<ThresholdGrid, SegmentError> {
    params.validate()?;
    assert_eq!(image.dim(), background.dim());
    let num_tiles = tiling.num_tiles();
    if num_tiles == 0 {
        return Err(SegmentError::EmptyTiling);
    }
    let mut max_tile = (0usize, 0usize);
    for idx in 0..num_tiles {
        let region = tiling.tile_region(idx);
        max_tile.0 = max_tile.0.max(region.height);
        max_tile.1 = max_tile.1.max(region.width);
    }

    let mut slots = vec![f64::NAN; num_tiles];
    slots
        .par_iter_mut()
        .enumerate()
        .for_each_init(
            || {
                (
                    SegScratch::for_shape(max_tile),
                    Array2::from_elem(max_tile, Label::Unprocessed),
                    Vec::new(),
                )
            },
            |(scratch, labels, noise_sn), (idx, slot)| {
                let region = tiling.tile_region(idx);
                let values = image.values.slice(s![region.rows(), region.cols()]);
                let convolved = image.convolved.slice(s![region.rows(), region.cols()]);
                let members = background.slice(s![region.rows(), region.cols()]);

                let bg_count = members.iter().filter(|&&m| m).count();
                if (bg_count as f64) < params.min_bg_fraction * region.area() as f64 {
                    log::debug!("tile {idx}: background fraction too low, skipping");
                    return;
                }

                let mut label_view = labels.slice_mut(s![..region.height, ..region.width]);
                let seg = oversegment(
                    values,
                    convolved,
                    members,
                    params.connectivity,
                    scratch,
                    &mut label_view,
                );
                if (seg.num_clumps as usize) < params.min_clumps {
                    log::debug!(
                        "tile {idx}: only {} noise clumps, skipping",
                        seg.num_clumps
                    );
                    return;
                }

                let stats = aggregate_clump_stats(
                    values,
                    label_view.view(),
                    seg.num_clumps,
                    region.origin(),
                    params,
                    noise.map(|n| n as &dyn NoiseStd),
                );
                let sn = clump_snr_table(&stats, params);
                noise_sn.clear();
                noise_sn.extend(sn.into_iter().filter(|&v| v > 0.0));
                if noise_sn.len() < params.min_clumps {
                    log::debug!(
                        "tile {idx}: only {} scored noise clumps, skipping",
                        noise_sn.len()
                    );
                    return;
                }
                noise_sn.sort_unstable_by(f64::total_cmp);
                let kept = trim.trimmed_len(noise_sn);
                if kept < params.min_clumps {
                    log::debug!("tile {idx}: {kept} noise clumps after trim, skipping");
                    return;
                }
                let q_idx = ((params.quantile * kept as f64) as usize).min(kept - 1);
                *slot = noise_sn[q_idx];
            },
        );

    if slots.iter().all(|v| v.is_nan()) {
        return Err(SegmentError::NoCalibratedTiles);
    }
    tiling.interpolate(&mut slots);
    Ok(ThresholdGrid { values: slots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::LocalThreshold;
    use crate::mesh::UniformGrid;
    use crate::synth::normal_field;
    use ndarray::Array2;

    #[test]
    fn test_trim_keeps_a_clean_ramp() {
        let sorted: Vec<f64> = (0..60).map(|i| i as f64 * 0.1).collect();
        let trim = FlatCdfTrim::default();
        assert_eq!(trim.trimmed_len(&sorted), 60);
    }

    #[test]
    fn test_trim_cuts_a_sparse_tail() {
        let mut sorted: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
        sorted.extend([50.0, 60.0, 70.0]);
        let trim = FlatCdfTrim::default();
        let kept = trim.trimmed_len(&sorted);
        assert!(kept <= 50, "outliers survived the trim: kept {kept}");
        assert!(kept >= 40, "trim cut into the dense body: kept {kept}");
    }

    #[test]
    fn test_trim_passes_tiny_samples_through() {
        let trim = FlatCdfTrim::default();
        assert_eq!(trim.trimmed_len(&[1.0, 2.0, 3.0]), 3);
    }

    #[test]
    fn test_pure_noise_tiles_calibrate_positive_thresholds() {
        let field = normal_field((64, 64), 0.0, 1.0, 7);
        let image = SegmentImage::from_values(field);
        let background = Array2::from_elem((64, 64), true);
        let grid = UniformGrid::new((64, 64), (32, 32)).unwrap();
        let params = SegmentParams {
            min_area: 1,
            min_clumps: 10,
            ..Default::default()
        };
        let thresholds = noise_sn_thresholds(
            &image,
            background.view(),
            &grid,
            &params,
            None,
            &FlatCdfTrim::default(),
        )
        .unwrap();
        assert_eq!(thresholds.values.len(), 4);
        for &t in &thresholds.values {
            assert!(t.is_finite() && t > 0.0, "threshold {t}");
        }
        // The surface hands back the right tile's value.
        let surface = thresholds.surface(&grid);
        assert_eq!(surface.threshold_at(10.0, 40.0), thresholds.values[1]);
    }

    #[test]
    fn test_masked_tile_inherits_from_neighbors() {
        let field = normal_field((64, 64), 0.0, 1.0, 11);
        let image = SegmentImage::from_values(field);
        let mut background = Array2::from_elem((64, 64), true);
        for r in 0..32 {
            for c in 0..32 {
                background[(r, c)] = false;
            }
        }
        let grid = UniformGrid::new((64, 64), (32, 32)).unwrap();
        let params = SegmentParams {
            min_area: 1,
            min_clumps: 10,
            ..Default::default()
        };
        let thresholds = noise_sn_thresholds(
            &image,
            background.view(),
            &grid,
            &params,
            None,
            &FlatCdfTrim::default(),
        )
        .unwrap();
        assert!(thresholds.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_fully_masked_background_is_an_error() {
        let field = normal_field((64, 64), 0.0, 1.0, 3);
        let image = SegmentImage::from_values(field);
        let background = Array2::from_elem((64, 64), false);
        let grid = UniformGrid::new((64, 64), (32, 32)).unwrap();
        let result = noise_sn_thresholds(
            &image,
            background.view(),
            &grid,
            &SegmentParams::default(),
            None,
            &FlatCdfTrim::default(),
        );
        assert!(matches!(result, Err(SegmentError::NoCalibratedTiles)));
    }
}
