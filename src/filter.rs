//! Acceptance filtering and relabeling of the over-segmented clumps.
//!
//! Each clump's signal-to-noise is compared with the calibrated threshold
//! at its centroid. Survivors are renumbered densely from 1, keeping their
//! relative order; rejected clumps dissolve back into unprocessed pixels,
//! and a river pixel that was holding back a rejected clump is reopened so
//! the growth stage can close over it.

use ndarray::ArrayViewMut2;
use serde::{Deserialize, Serialize};

use crate::label::Label;
use crate::neighbors::{neighbors, Connectivity};
use crate::oversegment::{Oversegmentation, Peak};
use crate::stats::ClumpStats;

/// Acceptance test applied to each clump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPolicy {
    /// Require the threshold test and a peak whose 8-neighborhood is free
    /// of river pixels. A peak pressed against a river is the signature of
    /// a noise spike riding on a real clump's flank.
    PeakIsolated,
    /// Require only the threshold test.
    ThresholdOnly,
}

/// Position-dependent acceptance threshold.
///
/// A plain `f64` serves as a uniform threshold; the calibrated per-tile
/// surface implements this over its tiling.
pub trait LocalThreshold {
    /// Threshold at a (possibly fractional) image position.
    fn threshold_at(&self, row: f64, col: f64) -> f64;
}

impl LocalThreshold for f64 {
    fn threshold_at(&self, _row: f64, _col: f64) -> f64 {
        *self
    }
}

/// Apply the acceptance test and rewrite the label raster.
///
/// Clumps are judged in id order, so survivors keep their relative order
/// under the new dense numbering. Centroids are in parent-image
/// coordinates, matching the threshold surface. Returns the number of
/// surviving clumps.
pub fn filter_clumps(
    labels: &mut ArrayViewMut2<Label>,
    seg: &Oversegmentation,
    stats: &[ClumpStats],
    sn: &[f64],
    threshold: &dyn LocalThreshold,
    policy: FilterPolicy,
) -> u32 {
    let (height, width) = labels.dim();
    let mut new_ids: Vec<Option<u32>> = vec![None; seg.num_clumps as usize];
    let mut kept: u32 = 0;

    for id in 1..=seg.num_clumps {
        let s = &stats[(id - 1) as usize];
        let Some((row, col)) = s.centroid else {
            continue;
        };
        if sn[(id - 1) as usize] <= threshold.threshold_at(row, col) {
            continue;
        }
        if policy == FilterPolicy::PeakIsolated {
            let Peak::At((pr, pc)) = seg.peak(id) else {
                continue;
            };
            let touches_river = neighbors(pr, pc, height, width, Connectivity::Eight)
                .any(|(nr, nc)| labels[(nr, nc)] == Label::River);
            if touches_river {
                continue;
            }
        }
        kept += 1;
        new_ids[(id - 1) as usize] = Some(kept);
    }

    // Rivers bordering a rejected clump are reopened; rivers only between
    // survivors keep separating them. Collected before the rewrite since
    // the rejected ids are about to vanish from the raster.
    let mut reopened: Vec<(usize, usize)> = Vec::new();
    for ((row, col), &label) in labels.indexed_iter() {
        if label != Label::River {
            continue;
        }
        let orphaned = neighbors(row, col, height, width, Connectivity::Eight).any(|(nr, nc)| {
            match labels[(nr, nc)] {
                Label::Clump(id) => new_ids[(id - 1) as usize].is_none(),
                _ => false,
            }
        });
        if orphaned {
            reopened.push((row, col));
        }
    }

    for label in labels.iter_mut() {
        if let Label::Clump(id) = *label {
            *label = match new_ids[(id - 1) as usize] {
                Some(new_id) => Label::Clump(new_id),
                None => Label::Unprocessed,
            };
        }
    }
    for (row, col) in reopened {
        labels[(row, col)] = Label::Unprocessed;
    }
    kept
}
