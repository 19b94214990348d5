//! Rectangular sub-regions of a parent raster.
//!
//! A [`Region`] describes the bounds of one working set inside the full
//! image: either a detection's bounding box or one background tile. All the
//! segmentation passes operate on region-local views; the region's origin is
//! used to translate centroids back into parent-image coordinates for the
//! position-keyed collaborators (noise lookup, threshold surface).

use std::ops::Range;

/// Bounds of one rectangular working region inside a parent raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First row in parent-image coordinates.
    pub row0: usize,
    /// First column in parent-image coordinates.
    pub col0: usize,
    /// Number of rows.
    pub height: usize,
    /// Number of columns.
    pub width: usize,
}

impl Region {
    /// Create a region, validating the fatal minimum-size precondition.
    ///
    /// # Panics
    /// A region narrower than 2 pixels along any axis indicates caller
    /// misuse; continuing would silently corrupt labels, so this aborts.
    pub fn new(row0: usize, col0: usize, height: usize, width: usize) -> Self {
        assert!(
            height >= 2 && width >= 2,
            "region must span at least 2 pixels along every axis, got {height}x{width}"
        );
        Region {
            row0,
            col0,
            height,
            width,
        }
    }

    /// Region covering an entire raster of the given `(height, width)`.
    pub fn covering(shape: (usize, usize)) -> Self {
        Self::new(0, 0, shape.0, shape.1)
    }

    /// Row range in parent-image coordinates.
    pub fn rows(&self) -> Range<usize> {
        self.row0..self.row0 + self.height
    }

    /// Column range in parent-image coordinates.
    pub fn cols(&self) -> Range<usize> {
        self.col0..self.col0 + self.width
    }

    /// `(row0, col0)` in parent-image coordinates.
    pub fn origin(&self) -> (usize, usize) {
        (self.row0, self.col0)
    }

    /// Number of pixels in the region.
    pub fn area(&self) -> usize {
        self.height * self.width
    }

    /// Whether a region-local position lies on the region border.
    pub fn on_border(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row == self.height - 1 || col == self.width - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_geometry() {
        let r = Region::new(4, 6, 10, 12);
        assert_eq!(r.rows(), 4..14);
        assert_eq!(r.cols(), 6..18);
        assert_eq!(r.origin(), (4, 6));
        assert_eq!(r.area(), 120);
    }

    #[test]
    fn test_border_predicate() {
        let r = Region::new(0, 0, 5, 5);
        assert!(r.on_border(0, 3));
        assert!(r.on_border(4, 2));
        assert!(r.on_border(2, 0));
        assert!(r.on_border(2, 4));
        assert!(!r.on_border(2, 2));
    }

    #[test]
    #[should_panic(expected = "at least 2 pixels")]
    fn test_degenerate_region_is_fatal() {
        let _ = Region::new(0, 0, 1, 10);
    }
}
