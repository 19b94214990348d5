//! Bounded neighbor iteration for the labeling passes.
//!
//! The segmentation loops visit the 4- or 8-connected neighborhood of a pixel
//! many millions of times per frame, so the iterator is a fixed-size stack
//! buffer filled once per call. Out-of-bounds positions are excluded here so
//! callers never index-check.

use serde::{Deserialize, Serialize};

/// Pixel adjacency used by a labeling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    /// Edge-sharing neighbors only.
    Four,
    /// Edge- and corner-sharing neighbors.
    Eight,
}

impl Connectivity {
    /// Maximum number of neighbors for this adjacency.
    pub fn degree(self) -> usize {
        match self {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

/// Offsets ordered so the first four entries are the 4-connected set.
const OFFSETS: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// In-bounds neighbors of `(row, col)` in a `height` x `width` raster.
pub fn neighbors(
    row: usize,
    col: usize,
    height: usize,
    width: usize,
    connectivity: Connectivity,
) -> Neighbors {
    let mut buf = [(0usize, 0usize); 8];
    let mut len = 0;
    for &(dr, dc) in &OFFSETS[..connectivity.degree()] {
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr >= 0 && nc >= 0 && (nr as usize) < height && (nc as usize) < width {
            buf[len] = (nr as usize, nc as usize);
            len += 1;
        }
    }
    Neighbors { buf, len, next: 0 }
}

/// Iterator over the in-bounds neighbors of one pixel.
pub struct Neighbors {
    buf: [(usize, usize); 8],
    len: usize,
    next: usize,
}

impl Iterator for Neighbors {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        if self.next < self.len {
            let item = self.buf[self.next];
            self.next += 1;
            Some(item)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Neighbors {}
