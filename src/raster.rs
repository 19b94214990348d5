//! Input rasters for segmentation.

use ndarray::Array2;

/// The pair of rasters segmentation reads from.
///
/// Labeling order and tie detection use the `convolved` (smoothed) raster so
/// that single-pixel noise spikes do not seed spurious clumps, while all flux
/// measurements (sums, centroids, signal-to-noise) use the raw `values`.
/// Callers without a smoothed product can pass the same data for both via
/// [`SegmentImage::from_values`].
#[derive(Debug, Clone)]
pub struct SegmentImage {
    /// Raw pixel values; NaN marks masked or blank pixels.
    pub values: Array2<f64>,
    /// Convolved pixel values, same shape as `values`.
    pub convolved: Array2<f64>,
}

impl SegmentImage {
    /// Pair a raw raster with its convolved counterpart.
    ///
    /// # Panics
    /// Panics if the two rasters disagree on shape.
    pub fn new(values: Array2<f64>, convolved: Array2<f64>) -> Self {
        assert_eq!(
            values.dim(),
            convolved.dim(),
            "raw and convolved rasters must share a shape"
        );
        SegmentImage { values, convolved }
    }

    /// Use one raster for both ordering and measurement.
    pub fn from_values(values: Array2<f64>) -> Self {
        let convolved = values.clone();
        SegmentImage { values, convolved }
    }

    /// `(height, width)` of both rasters.
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_duplicates_raster() {
        let img = SegmentImage::from_values(Array2::from_elem((3, 4), 1.5));
        assert_eq!(img.dim(), (3, 4));
        assert_eq!(img.values, img.convolved);
    }

    #[test]
    #[should_panic(expected = "share a shape")]
    fn test_shape_mismatch_is_fatal() {
        let _ = SegmentImage::new(Array2::zeros((3, 3)), Array2::zeros((3, 4)));
    }
}
