//! LED detection core.
//!
//! `detect` binarizes one intensity plane against a threshold, extracts
//! the 8-connected bright regions, and returns the truncated centroid of
//! the largest one, or `Position::NOT_FOUND` when nothing exceeds the
//! threshold.
//!
//! Determinism: regions are seeded by a row-major scan and ties on area
//! keep the first-encountered region, so identical input always yields
//! the identical position.

use crate::frame::Plane;
use crate::Position;

/// Guards the centroid division against a degenerate zero area. For any
/// real region (area >= 1) the truncated result is unchanged.
const AREA_EPSILON: f64 = 1e-6;

/// Find the largest bright region in `plane` and return its centroid.
///
/// Pixels strictly greater than `threshold` are "on"; a threshold of 255
/// therefore never matches. Pure function of `(plane, threshold)`.
pub fn detect(plane: &Plane, threshold: u8) -> Position {
    let width = plane.width() as usize;
    let height = plane.height() as usize;
    let data = plane.data();

    let mut visited = vec![false; width * height];
    let mut best: Option<Region> = None;

    for seed in 0..width * height {
        if visited[seed] || data[seed] <= threshold {
            continue;
        }
        let region = grow_region(seed, data, threshold, &mut visited, width, height);
        // Strictly greater keeps the first-encountered region on ties.
        if best.as_ref().map_or(true, |b| region.area > b.area) {
            best = Some(region);
        }
    }

    match best {
        Some(region) => region.centroid(),
        None => Position::NOT_FOUND,
    }
}

/// Accumulated zeroth and first moments of one connected region.
struct Region {
    area: u64,
    sum_x: u64,
    sum_y: u64,
}

impl Region {
    /// Area-weighted mean pixel coordinate, truncated to integers.
    fn centroid(&self) -> Position {
        let area = self.area as f64 + AREA_EPSILON;
        Position::new(
            (self.sum_x as f64 / area) as i32,
            (self.sum_y as f64 / area) as i32,
        )
    }
}

/// Flood fill over the 8-neighborhood starting from `seed`, marking every
/// reached pixel in `visited` and accumulating the region's moments.
fn grow_region(
    seed: usize,
    data: &[u8],
    threshold: u8,
    visited: &mut [bool],
    width: usize,
    height: usize,
) -> Region {
    let mut queue = vec![seed];
    visited[seed] = true;
    let mut region = Region {
        area: 0,
        sum_x: 0,
        sum_y: 0,
    };

    while let Some(idx) = queue.pop() {
        let x = idx % width;
        let y = idx / width;
        region.area += 1;
        region.sum_x += x as u64;
        region.sum_y += y as u64;

        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                let nidx = ny as usize * width + nx as usize;
                if !visited[nidx] && data[nidx] > threshold {
                    visited[nidx] = true;
                    queue.push(nidx);
                }
            }
        }
    }

    region
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
