//! Gap growing: attach leftover pixels to the clumps around them.
//!
//! After filtering, a detection usually contains pixels that never joined a
//! surviving clump (rejected clump interiors, orphaned rivers, pixels below
//! every peak's catchment). Growth relaxes those gaps outward from the
//! surviving clumps: a gap joins a clump only when every labeled 4-neighbor
//! agrees on the clump, so two clumps can never bleed into each other.

use ndarray::{ArrayView2, ArrayViewMut2};

use crate::label::Label;
use crate::neighbors::{neighbors, Connectivity};

/// One relaxation sweep over the remaining gap pixels.
///
/// Gaps are visited in the order given; a pixel assigned earlier in the
/// sweep is visible to later pixels, so a straight corridor can fill in a
/// single pass when its gaps are ordered away from the clump. Assigned
/// pixels are removed from `gaps` in place. Returns the number of pixels
/// grown this sweep.
pub fn grow_pass(labels: &mut ArrayViewMut2<Label>, gaps: &mut Vec<(usize, usize)>) -> usize {
    let (height, width) = labels.dim();
    let mut kept = 0;
    let mut grown = 0;
    for i in 0..gaps.len() {
        let (row, col) = gaps[i];
        let mut target: Option<u32> = None;
        let mut contested = false;
        for (nr, nc) in neighbors(row, col, height, width, Connectivity::Four) {
            if let Label::Clump(id) = labels[(nr, nc)] {
                match target {
                    Some(prev) if prev != id => {
                        contested = true;
                        break;
                    }
                    _ => target = Some(id),
                }
            }
        }
        match (contested, target) {
            (false, Some(id)) => {
                labels[(row, col)] = Label::Clump(id);
                grown += 1;
            }
            _ => {
                gaps[kept] = (row, col);
                kept += 1;
            }
        }
    }
    gaps.truncate(kept);
    grown
}

/// Grow the surviving clumps over every unlabeled member pixel.
///
/// Sweeps until a pass makes no progress. Pixels that remain contested
/// between two clumps, or that no clump ever reaches, stay `Unprocessed`.
/// Returns the number of such unresolved pixels.
pub fn grow_clumps(labels: &mut ArrayViewMut2<Label>, members: ArrayView2<bool>) -> usize {
    assert_eq!(labels.dim(), members.dim());
    let mut gaps: Vec<(usize, usize)> = Vec::new();
    for ((row, col), &m) in members.indexed_iter() {
        if m && labels[(row, col)] == Label::Unprocessed {
            gaps.push((row, col));
        }
    }
    while grow_pass(labels, &mut gaps) > 0 {}
    gaps.len()
}
