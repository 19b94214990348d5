//! Seeded synthetic rasters for tests and calibration studies.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Gaussian noise field with the given mean and standard deviation.
///
/// Seeded so any run with the same arguments produces the same raster.
pub fn normal_field(shape: (usize, usize), mean: f64, sigma: f64, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn(shape, || {
        let z: f64 = rng.sample(StandardNormal);
        mean + sigma * z
    })
}

/// Add a circular Gaussian source centered at `(row, col)`.
pub fn add_gaussian_spot(
    field: &mut Array2<f64>,
    row: f64,
    col: f64,
    amplitude: f64,
    sigma: f64,
) {
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);
    for ((r, c), value) in field.indexed_iter_mut() {
        let dr = r as f64 - row;
        let dc = c as f64 - col;
        *value += amplitude * (-(dr * dr + dc * dc) * inv_two_sigma_sq).exp();
    }
}

/// Set a flat-topped rectangular block to a constant value.
pub fn add_flat_block(
    field: &mut Array2<f64>,
    row0: usize,
    col0: usize,
    height: usize,
    width: usize,
    value: f64,
) {
    for r in row0..row0 + height {
        for c in col0..col0 + width {
            field[(r, c)] = value;
        }
    }
}
