//! Visual export of label rasters for eyeballing a segmentation.

use std::path::Path;

use image::{GrayImage, Luma};
use ndarray::ArrayView2;

use crate::error::SegmentError;
use crate::label::Label;

/// Render a label raster as a grayscale image.
///
/// Unprocessed pixels are black and rivers dark gray; clumps cycle through
/// distinct brighter shades so adjacent clumps stay distinguishable.
pub fn label_map_to_image(labels: ArrayView2<Label>) -> GrayImage {
    let (height, width) = labels.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let shade = match labels[(y as usize, x as usize)] {
            Label::Unprocessed => 0,
            Label::River => 40,
            Label::Clump(id) => 80 + (id.wrapping_mul(37) % 176) as u8,
        };
        Luma([shade])
    })
}

/// Render a label raster and write it to disk.
pub fn save_label_map(labels: ArrayView2<Label>, path: &Path) -> Result<(), SegmentError> {
    label_map_to_image(labels).save(path)?;
    Ok(())
}
