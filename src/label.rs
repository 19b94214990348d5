//! Pixel labels for the clump segmentation rasters.
//!
//! Every pixel of a segmented region carries exactly one of three states:
//! not yet decided, a river (boundary) pixel, or membership in a numbered
//! clump. Using a tagged variant instead of raw integers with negative
//! sentinels makes illegal states unrepresentable and removes magic-number
//! comparisons from the labeling passes.

use ndarray::Array2;

/// State of one pixel in a segmentation label raster.
///
/// Allowed transitions:
/// - `Unprocessed` -> `River` or `Clump(id)` (during over-segmentation),
/// - `Clump(id)` -> `Unprocessed` (only when the clump is rejected by the
///   filter stage; a clump pixel never becomes `River` directly),
/// - `River` -> `Unprocessed` (only when the river is orphaned by a rejected
///   clump),
/// - `Unprocessed` -> `Clump(id)` (during gap growth).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Not yet assigned; also the permanent state of unresolvable gaps.
    Unprocessed,
    /// Boundary pixel between clumps, or between a clump and the region edge.
    River,
    /// Member of the clump with this id (ids are 1-based within a region).
    Clump(u32),
}

impl Label {
    /// Clump id if this pixel belongs to a clump.
    pub fn clump_id(self) -> Option<u32> {
        match self {
            Label::Clump(id) => Some(id),
            _ => None,
        }
    }

    /// True for `Clump(_)`.
    pub fn is_clump(self) -> bool {
        matches!(self, Label::Clump(_))
    }
}

/// Region-local label raster, one [`Label`] per pixel.
pub type LabelMap = Array2<Label>;
