//! Segmentation parameters.

use serde::{Deserialize, Serialize};

use crate::error::SegmentError;
use crate::filter::FilterPolicy;
use crate::neighbors::Connectivity;

/// Tunable parameters shared across the segmentation stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentParams {
    /// Minimum interior pixel count for a clump to receive a signal-to-noise
    /// value; smaller clumps score 0.
    pub min_area: usize,
    /// Counts-per-electron style correction applied inside the
    /// signal-to-noise area term. 1.0 when pixel values are already in
    /// detector counts.
    pub counts_per_correction: f64,
    /// Whether the sky background has already been subtracted from the
    /// raster. When true the signal-to-noise denominator carries an extra
    /// `2 * sigma^2` term for the subtraction's own noise.
    pub sky_subtracted: bool,
    /// Quantile of the trimmed pure-noise signal-to-noise distribution used
    /// as a tile's threshold, in (0, 1).
    pub quantile: f64,
    /// Minimum fraction of a tile that must be background pixels for the
    /// tile to take part in noise calibration, in [0, 1].
    pub min_bg_fraction: f64,
    /// Minimum number of usable pure-noise clumps a tile must yield before
    /// its quantile is trusted.
    pub min_clumps: usize,
    /// Adjacency used by the over-segmentation and statistics passes.
    pub connectivity: Connectivity,
    /// Acceptance test applied to each clump.
    pub policy: FilterPolicy,
}

impl Default for SegmentParams {
    fn default() -> Self {
        SegmentParams {
            min_area: 10,
            counts_per_correction: 1.0,
            sky_subtracted: false,
            quantile: 0.95,
            min_bg_fraction: 0.5,
            min_clumps: 20,
            connectivity: Connectivity::Eight,
            policy: FilterPolicy::PeakIsolated,
        }
    }
}

impl SegmentParams {
    /// Check the numeric parameters before any pixel work starts.
    pub fn validate(&self) -> Result<(), SegmentError> {
        if !(self.quantile > 0.0 && self.quantile < 1.0) {
            return Err(SegmentError::InvalidParameter {
                name: "quantile",
                reason: format!("must lie in (0, 1), got {}", self.quantile),
            });
        }
        if !(0.0..=1.0).contains(&self.min_bg_fraction) {
            return Err(SegmentError::InvalidParameter {
                name: "min_bg_fraction",
                reason: format!("must lie in [0, 1], got {}", self.min_bg_fraction),
            });
        }
        if !(self.counts_per_correction > 0.0) {
            return Err(SegmentError::InvalidParameter {
                name: "counts_per_correction",
                reason: format!("must be positive, got {}", self.counts_per_correction),
            });
        }
        Ok(())
    }
}
