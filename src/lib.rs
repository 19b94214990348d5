//! Watershed-style clump extraction for blended astronomical sources.
//!
//! A detection found by thresholding often contains several overlapping
//! sources. This crate splits such a detection into "clumps": the image is
//! over-segmented by flooding down from every local peak, each candidate
//! clump is measured against the river pixels that bound it, and candidates
//! are kept only when their empirical signal-to-noise beats a threshold
//! calibrated on pure-noise tiles of the same frame. Surviving clumps then
//! grow back over the rejected ones so every detection pixel ends up
//! claimed or explicitly unresolved.
//!
//! The typical flow:
//!
//! 1. [`threshold::noise_sn_thresholds`] calibrates a per-tile acceptance
//!    threshold from the background pixels of the frame.
//! 2. [`pipeline::segment_region`] (or [`pipeline::segment_regions_par`]
//!    for many detections) runs over-segmentation, measurement, filtering
//!    and growth for each detection's bounding box.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod grow;
pub mod label;
pub mod mesh;
pub mod neighbors;
pub mod oversegment;
pub mod pipeline;
pub mod raster;
pub mod region;
pub mod snr;
pub mod stats;
pub mod synth;
pub mod threshold;

pub use config::SegmentParams;
pub use error::SegmentError;
pub use filter::{FilterPolicy, LocalThreshold};
pub use label::{Label, LabelMap};
pub use mesh::{Tiling, UniformGrid};
pub use oversegment::{oversegment, Oversegmentation, Peak, SegScratch};
pub use pipeline::{segment_region, segment_regions_par, Segmentation};
pub use raster::SegmentImage;
pub use region::Region;
pub use stats::{ClumpStats, NoiseStd};
pub use threshold::{noise_sn_thresholds, FlatCdfTrim, OutlierTrim, ThresholdGrid, ThresholdSurface};
