//! Error type shared by the segmentation pipeline.

use thiserror::Error;

/// Errors raised by segmentation configuration and calibration.
#[derive(Error, Debug)]
pub enum SegmentError {
    /// A parameter failed validation before any pixels were touched.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    /// A tiling was constructed with no usable tiles.
    #[error("tiling has no tiles covering the image")]
    EmptyTiling,

    /// Noise calibration finished without a single tile yielding a threshold.
    #[error("no tile produced enough pure-noise clumps to calibrate a threshold")]
    NoCalibratedTiles,

    /// Writing a diagnostic image to disk failed.
    #[error("failed to write diagnostic image: {0}")]
    DiagnosticWrite(#[from] image::ImageError),
}
