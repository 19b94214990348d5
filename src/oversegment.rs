//! Watershed over-segmentation of a detection region.
//!
//! Pixels are visited in decreasing order of the convolved raster and flood
//! down from local maxima, so every clump is grown from a peak and stops at
//! the valley (river) pixels contested by more than one clump. Plateaus of
//! exactly equal value are resolved one connected component at a time with a
//! single verdict for the whole component, which keeps the labeling
//! deterministic under any worker count and any memory layout.
//!
//! NaN pixels sort ahead of every finite value, so a masked pixel inside a
//! detection seeds its own clump; the clump's peak position stays
//! [`Peak::Unknown`] until a finite pixel joins it.

use std::collections::VecDeque;
use std::mem;

use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};

use crate::label::Label;
use crate::neighbors::{neighbors, Connectivity};
use crate::region::Region;

/// Peak position of one clump, in region-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peak {
    /// The clump was seeded by a NaN pixel and no finite pixel has joined it.
    Unknown,
    /// Region-local `(row, col)` of the highest finite pixel in the clump.
    At((usize, usize)),
}

/// Result of over-segmenting one region.
#[derive(Debug, Clone)]
pub struct Oversegmentation {
    /// Number of clumps labeled, ids `1..=num_clumps`.
    pub num_clumps: u32,
    /// Peak of each clump, indexed by `id - 1`.
    pub peaks: Vec<Peak>,
}

impl Oversegmentation {
    /// Peak of the clump with the given 1-based id.
    pub fn peak(&self, id: u32) -> Peak {
        self.peaks[(id - 1) as usize]
    }
}

/// Reusable per-worker buffers for the labeling passes.
///
/// Sized once for the largest region a worker will see, then shared across
/// every region that worker processes so the hot loops never allocate.
pub struct SegScratch {
    /// Member pixels in decreasing-value order.
    order: Vec<(usize, usize)>,
    /// Flood-fill frontier for plateau components.
    queue: VecDeque<(usize, usize)>,
    /// Pixels of the plateau component awaiting their verdict.
    pending: Vec<(usize, usize)>,
    /// Plateau visit flags; reset to false between components.
    visited: Array2<bool>,
}

impl SegScratch {
    /// Buffers large enough for any region up to `(height, width)`.
    pub fn for_shape(shape: (usize, usize)) -> Self {
        let area = shape.0 * shape.1;
        SegScratch {
            order: Vec::with_capacity(area),
            queue: VecDeque::new(),
            pending: Vec::new(),
            visited: Array2::from_elem(shape, false),
        }
    }
}

/// Sort key that places NaN (masked) pixels ahead of every finite value.
fn sort_key(value: f64) -> f64 {
    if value.is_nan() {
        f64::INFINITY
    } else {
        value
    }
}

/// Over-segment one region into clumps and rivers.
///
/// All views are region-local and must share a shape. `members` selects the
/// pixels to label; non-member pixels are left `Unprocessed` and any member
/// adjacent to one becomes a river. Labels are written into `labels`, which
/// is fully overwritten.
///
/// # Arguments
/// * `values` - raw pixel values, used only for peak bookkeeping
/// * `convolved` - smoothed pixel values that define the flooding order
/// * `members` - membership mask for the pixels to label
/// * `connectivity` - adjacency for flooding and contesting
/// * `scratch` - reusable buffers, sized at least as large as the region
/// * `labels` - output label raster, same shape as the region
pub fn oversegment(
    values: ArrayView2<f64>,
    convolved: ArrayView2<f64>,
    members: ArrayView2<bool>,
    connectivity: Connectivity,
    scratch: &mut SegScratch,
    labels: &mut ArrayViewMut2<Label>,
) -> Oversegmentation {
    let (height, width) = values.dim();
    assert!(
        height >= 2 && width >= 2,
        "region must span at least 2 pixels along every axis, got {height}x{width}"
    );
    assert_eq!(values.dim(), convolved.dim());
    assert_eq!(values.dim(), members.dim());
    assert_eq!(values.dim(), labels.dim());
    let (sh, sw) = scratch.visited.dim();
    assert!(
        sh >= height && sw >= width,
        "scratch sized {sh}x{sw} cannot hold a {height}x{width} region"
    );

    let region = Region::covering((height, width));
    labels.fill(Label::Unprocessed);
    let mut visited = scratch.visited.slice_mut(s![..height, ..width]);
    visited.fill(false);

    let mut order = mem::take(&mut scratch.order);
    order.clear();
    for ((row, col), &m) in members.indexed_iter() {
        if m {
            order.push((row, col));
        }
    }
    // Decreasing value, then raster order. The positional tie-break only
    // matters for which plateau pixel seeds the component fill; the verdict
    // itself is position-independent.
    order.sort_unstable_by(|&a, &b| {
        let ka = sort_key(convolved[a]);
        let kb = sort_key(convolved[b]);
        kb.total_cmp(&ka).then_with(|| a.cmp(&b))
    });

    let mut num_clumps: u32 = 0;
    let mut peaks: Vec<Peak> = Vec::new();

    for idx in 0..order.len() {
        let (row, col) = order[idx];
        if labels[(row, col)] != Label::Unprocessed {
            continue;
        }
        let key = sort_key(convolved[(row, col)]);
        let tied = (idx + 1 < order.len() && sort_key(convolved[order[idx + 1]]) == key)
            || (idx > 0 && sort_key(convolved[order[idx - 1]]) == key);

        if tied {
            assert!(
                scratch.queue.is_empty() && scratch.pending.is_empty(),
                "tie-break queues not drained; this is a bug in the labeling pass"
            );
            // Flood the connected equal-value component and gather the facts
            // that decide its fate as a whole.
            let mut touches_boundary = region.on_border(row, col);
            let mut inherited: Option<u32> = None;
            let mut multiple = false;
            visited[(row, col)] = true;
            scratch.queue.push_back((row, col));
            scratch.pending.push((row, col));
            while let Some((r, c)) = scratch.queue.pop_front() {
                for (nr, nc) in neighbors(r, c, height, width, connectivity) {
                    if !members[(nr, nc)] {
                        touches_boundary = true;
                        continue;
                    }
                    match labels[(nr, nc)] {
                        Label::Clump(id) => match inherited {
                            Some(prev) if prev != id => multiple = true,
                            Some(_) => {}
                            None => inherited = Some(id),
                        },
                        Label::River => {}
                        Label::Unprocessed => {
                            if !visited[(nr, nc)] && sort_key(convolved[(nr, nc)]) == key {
                                visited[(nr, nc)] = true;
                                if region.on_border(nr, nc) {
                                    touches_boundary = true;
                                }
                                scratch.queue.push_back((nr, nc));
                                scratch.pending.push((nr, nc));
                            }
                        }
                    }
                }
            }
            let verdict = if touches_boundary || multiple {
                Label::River
            } else if let Some(id) = inherited {
                if peaks[(id - 1) as usize] == Peak::Unknown && !values[(row, col)].is_nan() {
                    peaks[(id - 1) as usize] = Peak::At((row, col));
                }
                Label::Clump(id)
            } else {
                num_clumps += 1;
                peaks.push(if values[(row, col)].is_nan() {
                    Peak::Unknown
                } else {
                    Peak::At((row, col))
                });
                Label::Clump(num_clumps)
            };
            for &(r, c) in &scratch.pending {
                labels[(r, c)] = verdict;
                visited[(r, c)] = false;
            }
            scratch.pending.clear();
            continue;
        }

        if region.on_border(row, col) {
            labels[(row, col)] = Label::River;
            continue;
        }
        let mut inherited: Option<u32> = None;
        let mut contested = false;
        for (nr, nc) in neighbors(row, col, height, width, connectivity) {
            if !members[(nr, nc)] {
                contested = true;
                break;
            }
            if let Label::Clump(id) = labels[(nr, nc)] {
                match inherited {
                    Some(prev) if prev != id => {
                        contested = true;
                        break;
                    }
                    Some(_) => {}
                    None => inherited = Some(id),
                }
            }
        }
        labels[(row, col)] = if contested {
            Label::River
        } else if let Some(id) = inherited {
            if peaks[(id - 1) as usize] == Peak::Unknown && !values[(row, col)].is_nan() {
                peaks[(id - 1) as usize] = Peak::At((row, col));
            }
            Label::Clump(id)
        } else {
            num_clumps += 1;
            peaks.push(if values[(row, col)].is_nan() {
                Peak::Unknown
            } else {
                Peak::At((row, col))
            });
            Label::Clump(num_clumps)
        };
    }

    scratch.order = order;
    Oversegmentation { num_clumps, peaks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn run(
        values: &Array2<f64>,
        convolved: &Array2<f64>,
        connectivity: Connectivity,
    ) -> (Array2<Label>, Oversegmentation) {
        let shape = values.dim();
        let members = Array2::from_elem(shape, true);
        let mut scratch = SegScratch::for_shape(shape);
        let mut labels = Array2::from_elem(shape, Label::Unprocessed);
        let seg = oversegment(
            values.view(),
            convolved.view(),
            members.view(),
            connectivity,
            &mut scratch,
            &mut labels.view_mut(),
        );
        (labels, seg)
    }

    #[test]
    fn test_single_peak_pyramid_yields_one_clump() {
        let mut values = Array2::zeros((7, 7));
        for r in 0..7 {
            for c in 0..7 {
                let d = (r as i64 - 3).abs().max((c as i64 - 3).abs());
                values[(r, c)] = 10.0 - d as f64;
            }
        }
        let (labels, seg) = run(&values, &values, Connectivity::Eight);
        assert_eq!(seg.num_clumps, 1);
        assert_eq!(seg.peak(1), Peak::At((3, 3)));
        for r in 0..7 {
            for c in 0..7 {
                let on_border = r == 0 || c == 0 || r == 6 || c == 6;
                let expected = if on_border { Label::River } else { Label::Clump(1) };
                assert_eq!(labels[(r, c)], expected, "pixel ({r}, {c})");
            }
        }
    }

    #[test]
    fn test_two_peaks_split_by_river() {
        let values = array![
            [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            [1.0, 5.0, 6.0, 5.0, 1.0, 4.0, 5.0, 4.0, 1.0],
            [1.0, 6.0, 10.0, 6.0, 2.0, 5.0, 9.0, 5.0, 1.0],
            [1.0, 5.0, 6.0, 5.0, 1.0, 4.0, 5.0, 4.0, 1.0],
            [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        ];
        let (labels, seg) = run(&values, &values, Connectivity::Eight);
        assert_eq!(seg.num_clumps, 2);
        let a = labels[(2, 2)].clump_id().unwrap();
        let b = labels[(2, 6)].clump_id().unwrap();
        assert_ne!(a, b);
        assert_eq!(seg.peak(a), Peak::At((2, 2)));
        assert_eq!(seg.peak(b), Peak::At((2, 6)));
        // The saddle column is contested by both clumps.
        assert_eq!(labels[(2, 4)], Label::River);
        // Every pixel within each 3x3 summit block carries its clump's id.
        for r in 1..=3 {
            for c in 1..=3 {
                assert_eq!(labels[(r, c)], Label::Clump(a));
            }
            for c in 5..=7 {
                assert_eq!(labels[(r, c)], Label::Clump(b));
            }
        }
    }

    #[test]
    fn test_contested_plateau_becomes_river_atomically() {
        let values = array![
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 7.0, 6.0, 5.0, 6.0, 7.0, 0.0],
            [0.0, 9.0, 6.0, 5.0, 6.0, 8.0, 0.0],
            [0.0, 7.0, 6.0, 5.0, 6.0, 7.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ];
        let (labels, seg) = run(&values, &values, Connectivity::Eight);
        assert_eq!(seg.num_clumps, 2);
        // The ridge of 5s touches both clumps, so the whole component is
        // river; no part of it may keep a clump label.
        for r in 1..=3 {
            assert_eq!(labels[(r, 3)], Label::River, "ridge pixel ({r}, 3)");
        }
        assert!(labels[(2, 1)].is_clump());
        assert!(labels[(2, 5)].is_clump());
    }

    #[test]
    fn test_plateau_verdict_is_orientation_independent() {
        // Same contested-ridge fixture as above; transposing or mirroring
        // the raster permutes the traversal order of every tied pixel, but
        // the component-level verdict must come out identical.
        let values = array![
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 7.0, 6.0, 5.0, 6.0, 7.0, 0.0],
            [0.0, 9.0, 6.0, 5.0, 6.0, 8.0, 0.0],
            [0.0, 7.0, 6.0, 5.0, 6.0, 7.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ];
        let (labels, _) = run(&values, &values, Connectivity::Eight);

        let transposed = values.t().to_owned();
        let (labels_t, seg_t) = run(&transposed, &transposed, Connectivity::Eight);
        assert_eq!(seg_t.num_clumps, 2);
        for r in 0..5 {
            for c in 0..7 {
                assert_eq!(labels_t[(c, r)], labels[(r, c)], "transposed ({r}, {c})");
            }
        }

        let (h, w) = values.dim();
        let flipped = Array2::from_shape_fn((h, w), |(r, c)| values[(r, w - 1 - c)]);
        let (labels_f, seg_f) = run(&flipped, &flipped, Connectivity::Eight);
        assert_eq!(seg_f.num_clumps, 2);
        for r in 0..h {
            for c in 0..w {
                assert_eq!(labels_f[(r, w - 1 - c)], labels[(r, c)], "flipped ({r}, {c})");
            }
        }
    }

    #[test]
    fn test_border_touching_plateau_becomes_river() {
        // Flat unit background everywhere except a small summit. The
        // background plateau reaches the region border, so the single
        // component verdict turns all of it into river at once.
        let mut values = Array2::from_elem((10, 10), 1.0);
        values[(5, 5)] = 9.0;
        for (r, c) in [(4, 4), (4, 5), (4, 6), (5, 4), (5, 6), (6, 4), (6, 5), (6, 6)] {
            values[(r, c)] = 5.0;
        }
        let (labels, seg) = run(&values, &values, Connectivity::Eight);
        assert_eq!(seg.num_clumps, 1);
        for r in 4..=6 {
            for c in 4..=6 {
                assert_eq!(labels[(r, c)], Label::Clump(1));
            }
        }
        for r in 0..10 {
            for c in 0..10 {
                if !(4..=6).contains(&r) || !(4..=6).contains(&c) {
                    assert_eq!(labels[(r, c)], Label::River, "pixel ({r}, {c})");
                }
            }
        }
    }

    #[test]
    fn test_nan_seed_gets_peak_from_first_finite_pixel() {
        let values = array![
            [0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 2.0, 1.0, 0.0],
            [0.0, 2.0, f64::NAN, 8.0, 0.0],
            [0.0, 1.0, 2.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0],
        ];
        let (labels, seg) = run(&values, &values, Connectivity::Eight);
        assert_eq!(seg.num_clumps, 1);
        assert_eq!(labels[(2, 2)], Label::Clump(1));
        // The NaN pixel sorts first and seeds the clump with no peak; the
        // highest finite pixel to join fills it in.
        assert_eq!(seg.peak(1), Peak::At((2, 3)));
    }

    #[test]
    fn test_non_member_neighbors_make_rivers() {
        let values = array![
            [1.0, 2.0, 3.0, 2.0, 1.0],
            [1.0, 2.5, 9.0, 2.0, 1.0],
            [1.0, 2.0, 3.0, 2.0, 1.0],
        ];
        let mut members = Array2::from_elem((3, 5), true);
        members[(1, 0)] = false;
        let mut scratch = SegScratch::for_shape((3, 5));
        let mut labels = Array2::from_elem((3, 5), Label::Unprocessed);
        let seg = oversegment(
            values.view(),
            values.view(),
            members.view(),
            Connectivity::Eight,
            &mut scratch,
            &mut labels.view_mut(),
        );
        assert_eq!(seg.num_clumps, 1);
        assert_eq!(labels[(1, 0)], Label::Unprocessed);
        // Members adjacent to the hole are rivers even off the border.
        assert_eq!(labels[(1, 1)], Label::River);
    }

    #[test]
    fn test_scratch_reuse_is_deterministic() {
        let mut values = Array2::zeros((9, 9));
        for r in 0..9 {
            for c in 0..9 {
                let d1 = (r as i64 - 3).abs().max((c as i64 - 3).abs());
                let d2 = (r as i64 - 5).abs().max((c as i64 - 6).abs());
                values[(r, c)] = (9.0 - d1 as f64).max(8.0 - d2 as f64);
            }
        }
        let members = Array2::from_elem((9, 9), true);
        let mut scratch = SegScratch::for_shape((12, 12));
        let mut first = Array2::from_elem((9, 9), Label::Unprocessed);
        oversegment(
            values.view(),
            values.view(),
            members.view(),
            Connectivity::Eight,
            &mut scratch,
            &mut first.view_mut(),
        );
        let mut second = Array2::from_elem((9, 9), Label::Unprocessed);
        oversegment(
            values.view(),
            values.view(),
            members.view(),
            Connectivity::Eight,
            &mut scratch,
            &mut second.view_mut(),
        );
        assert_eq!(first, second);
    }
}
