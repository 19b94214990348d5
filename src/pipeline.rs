//! End-to-end segmentation of detection regions.
//!
//! One region runs through over-segmentation, measurement, filtering and
//! growth; the parallel driver fans independent regions out across the
//! rayon pool with one scratch buffer per worker. Results are returned in
//! the caller's region order regardless of scheduling.

use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;

use crate::config::SegmentParams;
use crate::filter::{filter_clumps, LocalThreshold};
use crate::grow::grow_clumps;
use crate::label::Label;
use crate::oversegment::{oversegment, SegScratch};
use crate::raster::SegmentImage;
use crate::region::Region;
use crate::snr::clump_snr_table;
use crate::stats::{aggregate_clump_stats, ClumpStats, NoiseStd};

/// Result of segmenting one detection region.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Final region-local labels: surviving clumps grown over the gaps.
    pub labels: Array2<Label>,
    /// Number of surviving clumps, ids `1..=num_clumps`.
    pub num_clumps: u32,
    /// Member pixels no surviving clump could claim.
    pub unresolved: usize,
    /// Measurements of the surviving clumps after growth.
    pub stats: Vec<ClumpStats>,
    /// Signal-to-noise of the surviving clumps after growth.
    pub sn: Vec<f64>,
    /// Labels as they stood before filtering and growth, for diagnostics.
    pub pre_filter: Array2<Label>,
}

/// Segment one detection region of the image.
///
/// `members` is a full-raster mask of the detection's pixels; `region` is
/// its bounding box. The filter threshold is looked up at each clump's
/// centroid in parent-image coordinates, so a calibrated per-tile surface
/// and a plain `f64` are both accepted.
pub fn segment_region(
    image: &SegmentImage,
    members: ArrayView2<bool>,
    region: Region,
    params: &SegmentParams,
    noise: Option<&dyn NoiseStd>,
    threshold: &dyn LocalThreshold,
    scratch: &mut SegScratch,
) -> Segmentation {
    let (height, width) = image.dim();
    assert_eq!(image.dim(), members.dim());
    assert!(
        region.rows().end <= height && region.cols().end <= width,
        "region {region:?} does not fit a {height}x{width} raster"
    );

    let values = image.values.slice(s![region.rows(), region.cols()]);
    let convolved = image.convolved.slice(s![region.rows(), region.cols()]);
    let members = members.slice(s![region.rows(), region.cols()]);

    let mut labels = Array2::from_elem((region.height, region.width), Label::Unprocessed);
    let seg = oversegment(
        values,
        convolved,
        members,
        params.connectivity,
        scratch,
        &mut labels.view_mut(),
    );
    let stats = aggregate_clump_stats(
        values,
        labels.view(),
        seg.num_clumps,
        region.origin(),
        params,
        noise,
    );
    let sn = clump_snr_table(&stats, params);
    let pre_filter = labels.clone();

    let kept = filter_clumps(
        &mut labels.view_mut(),
        &seg,
        &stats,
        &sn,
        threshold,
        params.policy,
    );
    let unresolved = grow_clumps(&mut labels.view_mut(), members);

    if seg.num_clumps > 0 && kept == 0 {
        log::warn!(
            "region at {:?}: all {} clumps rejected",
            region.origin(),
            seg.num_clumps
        );
    }
    log::debug!(
        "region at {:?}: {} clumps, {} kept, {} unresolved",
        region.origin(),
        seg.num_clumps,
        kept,
        unresolved
    );

    let stats = aggregate_clump_stats(
        values,
        labels.view(),
        kept,
        region.origin(),
        params,
        noise,
    );
    let sn = clump_snr_table(&stats, params);

    Segmentation {
        labels,
        num_clumps: kept,
        unresolved,
        stats,
        sn,
        pre_filter,
    }
}

/// Segment many detection regions in parallel.
///
/// Each worker reuses one scratch buffer sized for the largest region, and
/// the output vector matches the order of `regions`.
pub fn segment_regions_par(
    image: &SegmentImage,
    members: ArrayView2<bool>,
    regions: &[Region],
    params: &SegmentParams,
    noise: Option<&(dyn NoiseStd + Sync)>,
    threshold: &(dyn LocalThreshold + Sync),
) -> Vec<Segmentation> {
    let mut max_shape = (2usize, 2usize);
    for region in regions {
        max_shape.0 = max_shape.0.max(region.height);
        max_shape.1 = max_shape.1.max(region.width);
    }
    regions
        .par_iter()
        .map_init(
            || SegScratch::for_shape(max_shape),
            |scratch, &region| {
                segment_region(
                    image,
                    members,
                    region,
                    params,
                    noise.map(|n| n as &dyn NoiseStd),
                    threshold,
                    scratch,
                )
            },
        )
        .collect()
}
