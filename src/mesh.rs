//! Tiling of the full frame for spatially varying noise thresholds.
//!
//! The calibration stage measures a pure-noise threshold per tile; the
//! [`Tiling`] trait abstracts over how the frame is cut so callers with an
//! irregular mesh can plug their own in. [`UniformGrid`] is the stock
//! implementation: equal tiles with the remainder absorbed by the last row
//! and column of tiles.

use crate::error::SegmentError;
use crate::region::Region;

/// A partition of a raster into rectangular tiles.
pub trait Tiling {
    /// Number of tiles covering the raster.
    fn num_tiles(&self) -> usize;

    /// Bounds of one tile in parent-image coordinates.
    fn tile_region(&self, index: usize) -> Region;

    /// Index of the tile containing an image position. Positions outside
    /// the raster clamp to the nearest tile.
    fn tile_index_at(&self, row: f64, col: f64) -> usize;

    /// Fill NaN entries of a per-tile value array from neighboring tiles.
    ///
    /// Called after calibration so tiles that could not be measured inherit
    /// a value from the tiles around them. Entries may stay NaN when no
    /// tile was measured at all.
    fn interpolate(&self, values: &mut [f64]);
}

/// Uniform rectangular tiling.
#[derive(Debug, Clone)]
pub struct UniformGrid {
    image: (usize, usize),
    tile: (usize, usize),
    grid: (usize, usize),
}

impl UniformGrid {
    /// Tile an `image_shape` raster with `tile_shape` tiles.
    ///
    /// The grid has `floor(image / tile)` tiles per axis and the last tile
    /// of each axis stretches to the raster edge, so a tile is never
    /// smaller than `tile_shape`.
    pub fn new(
        image_shape: (usize, usize),
        tile_shape: (usize, usize),
    ) -> Result<Self, SegmentError> {
        if tile_shape.0 < 2 || tile_shape.1 < 2 {
            return Err(SegmentError::InvalidParameter {
                name: "tile_shape",
                reason: format!(
                    "tiles must span at least 2 pixels per axis, got {}x{}",
                    tile_shape.0, tile_shape.1
                ),
            });
        }
        if tile_shape.0 > image_shape.0 || tile_shape.1 > image_shape.1 {
            return Err(SegmentError::InvalidParameter {
                name: "tile_shape",
                reason: format!(
                    "tile {}x{} does not fit in a {}x{} image",
                    tile_shape.0, tile_shape.1, image_shape.0, image_shape.1
                ),
            });
        }
        let grid = (image_shape.0 / tile_shape.0, image_shape.1 / tile_shape.1);
        Ok(UniformGrid {
            image: image_shape,
            tile: tile_shape,
            grid,
        })
    }

    /// `(rows, cols)` of the tile grid.
    pub fn grid_shape(&self) -> (usize, usize) {
        self.grid
    }
}

impl Tiling for UniformGrid {
    fn num_tiles(&self) -> usize {
        self.grid.0 * self.grid.1
    }

    fn tile_region(&self, index: usize) -> Region {
        let tr = index / self.grid.1;
        let tc = index % self.grid.1;
        let row0 = tr * self.tile.0;
        let col0 = tc * self.tile.1;
        let height = if tr + 1 == self.grid.0 {
            self.image.0 - row0
        } else {
            self.tile.0
        };
        let width = if tc + 1 == self.grid.1 {
            self.image.1 - col0
        } else {
            self.tile.1
        };
        Region::new(row0, col0, height, width)
    }

    fn tile_index_at(&self, row: f64, col: f64) -> usize {
        let tr = ((row.max(0.0) as usize) / self.tile.0).min(self.grid.0 - 1);
        let tc = ((col.max(0.0) as usize) / self.tile.1).min(self.grid.1 - 1);
        tr * self.grid.1 + tc
    }

    fn interpolate(&self, values: &mut [f64]) {
        assert_eq!(values.len(), self.num_tiles());
        let (rows, cols) = self.grid;
        loop {
            let snapshot = values.to_vec();
            let mut progress = false;
            let mut remaining = 0;
            for tr in 0..rows {
                for tc in 0..cols {
                    let idx = tr * cols + tc;
                    if !snapshot[idx].is_nan() {
                        continue;
                    }
                    let mut buf = [0.0f64; 4];
                    let mut n = 0;
                    if tr > 0 && !snapshot[idx - cols].is_nan() {
                        buf[n] = snapshot[idx - cols];
                        n += 1;
                    }
                    if tr + 1 < rows && !snapshot[idx + cols].is_nan() {
                        buf[n] = snapshot[idx + cols];
                        n += 1;
                    }
                    if tc > 0 && !snapshot[idx - 1].is_nan() {
                        buf[n] = snapshot[idx - 1];
                        n += 1;
                    }
                    if tc + 1 < cols && !snapshot[idx + 1].is_nan() {
                        buf[n] = snapshot[idx + 1];
                        n += 1;
                    }
                    if n == 0 {
                        remaining += 1;
                        continue;
                    }
                    buf[..n].sort_unstable_by(f64::total_cmp);
                    values[idx] = if n % 2 == 1 {
                        buf[n / 2]
                    } else {
                        0.5 * (buf[n / 2 - 1] + buf[n / 2])
                    };
                    progress = true;
                }
            }
            if remaining == 0 || !progress {
                break;
            }
        }
    }
}
