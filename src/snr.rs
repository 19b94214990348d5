//! Empirical signal-to-noise of a clump.
//!
//! The discriminator compares a clump's interior mean against the mean of
//! the river pixels surrounding it, scaled by the interior area. Because the
//! same statistic is measured on pure-noise tiles to calibrate thresholds,
//! no analytic noise model is assumed beyond the optional sky-subtraction
//! variance term.

use crate::config::SegmentParams;
use crate::stats::ClumpStats;

/// Signal-to-noise of one measured clump.
///
/// Returns 0 when the clump is too small (`min_area`), has no valid
/// centroid, or does not rise above its surrounding rivers. For a
/// sky-subtracted raster the denominator carries `2 * sigma^2` for the
/// noise the subtraction itself added.
pub fn clump_snr(stats: &ClumpStats, params: &SegmentParams) -> f64 {
    if stats.inner_count < params.min_area || stats.centroid.is_none() {
        return 0.0;
    }
    let inner = stats.inner_mean();
    let river = stats.river_mean();
    if inner <= river {
        return 0.0;
    }
    let err = if params.sky_subtracted {
        2.0 * stats.local_sigma * stats.local_sigma
    } else {
        0.0
    };
    let area = stats.inner_count as f64 / params.counts_per_correction;
    area.sqrt() * (inner - river) / (inner.abs() + river.abs() + err).sqrt()
}

/// Signal-to-noise of every clump in a region, indexed by `id - 1`.
pub fn clump_snr_table(stats: &[ClumpStats], params: &SegmentParams) -> Vec<f64> {
    stats.iter().map(|s| clump_snr(s, params)).collect()
}
