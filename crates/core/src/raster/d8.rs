//! D8 neighbor geometry and flow direction codes.
//!
//! Direction codes used throughout demflow:
//!
//! ```text
//!   7  0  1
//!   6  .  2
//!   5  4  3
//! ```
//!
//! `0` is north (row − 1), codes run clockwise. `-1` ([`NONE`]) means no
//! direction: the cell is terminal, drains off-grid, or has not been routed.

/// Sentinel for "no direction".
pub const NONE: i8 = -1;

/// Number of D8 directions.
pub const COUNT: usize = 8;

/// Neighbor offsets as `(row_offset, col_offset)`, indexed by direction
/// code. Row offsets are negative toward the top of the grid.
pub const OFFSETS: [(isize, isize); 8] = [
    (-1, 0),  // 0: N
    (-1, 1),  // 1: NE
    (0, 1),   // 2: E
    (1, 1),   // 3: SE
    (1, 0),   // 4: S
    (1, -1),  // 5: SW
    (0, -1),  // 6: W
    (-1, -1), // 7: NW
];

/// Unit distance to each neighbor: cardinal = 1, diagonal = √2.
/// Multiply by the cell size for a metric distance.
pub const DISTANCES: [f64; 8] = [
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
];

/// The opposite direction; [`NONE`] stays [`NONE`].
#[inline]
pub fn opposite(dir: i8) -> i8 {
    if dir < 0 {
        NONE
    } else {
        (dir + 4) % 8
    }
}

/// Step from `(row, col)` one cell in direction `dir`.
///
/// Returns `None` if `dir` is [`NONE`] or the step leaves a `rows` × `cols`
/// grid.
#[inline]
pub fn step(row: usize, col: usize, dir: i8, rows: usize, cols: usize) -> Option<(usize, usize)> {
    if dir < 0 || dir as usize >= COUNT {
        return None;
    }
    let (dr, dc) = OFFSETS[dir as usize];
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
        None
    } else {
        Some((nr as usize, nc as usize))
    }
}
