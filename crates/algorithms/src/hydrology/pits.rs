//! Depression and flat detection.
//!
//! A *pit* is a maximal 8-connected region of identical elevation with no
//! downhill escape: no member has a strictly lower valid neighbor, and no
//! member touches the grid border or a no-data void (both of which always
//! permit drainage). A single local minimum is the one-cell case; larger
//! regions are *flats* and additionally get a bounding rectangle record used
//! by the drainage router's flat wave.
//!
//! Zero detected pits means the surface already drains everywhere; that is a
//! valid terminal state, not an error.

use demflow_core::{Error, Progress, Raster, Result, Silent};
use ndarray::Array2;

use crate::maybe_rayon::*;

/// Inclusive bounding rectangle of a flat region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl CellRect {
    fn single(row: usize, col: usize) -> Self {
        Self {
            row_min: row,
            row_max: row,
            col_min: col,
            col_max: col,
        }
    }

    fn expand(&mut self, row: usize, col: usize) {
        self.row_min = self.row_min.min(row);
        self.row_max = self.row_max.max(row);
        self.col_min = self.col_min.min(col);
        self.col_max = self.col_max.max(col);
    }

    /// Whether `(row, col)` lies inside the rectangle.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.row_min && row <= self.row_max && col >= self.col_min && col <= self.col_max
    }
}

/// Per-pit state carried through outlet resolution and routing.
#[derive(Debug, Clone)]
pub(crate) struct PitRecord {
    /// Bottom elevation of the pit
    pub z: f64,
    /// Whether the pit has been connected to the exterior
    pub drained: bool,
}

/// Result of the pit scan.
///
/// `pits` holds one positive id per depression (0 = not part of any pit /
/// already exterior-connected). During outlet resolution the grid is grown
/// into full catchments; the router mutates the per-pit drained flags.
#[derive(Debug, Clone)]
pub struct PitScan {
    /// Pit identifier grid: 0 = drains, >0 = pit id
    pub pits: Raster<i32>,
    /// Flat identifier grid: 0 = none, >0 = flat id
    pub(crate) flats: Raster<i32>,
    /// Bounding rectangle per flat id
    pub(crate) flat_rects: Vec<CellRect>,
    /// One record per pit id
    pub(crate) records: Vec<PitRecord>,
}

impl PitScan {
    /// Number of detected pits.
    pub fn pit_count(&self) -> usize {
        self.records.len()
    }
}

/// Detect all pits and flats of `dem`. See the module docs for the
/// definition.
pub fn find_pits(dem: &Raster<f64>) -> Result<PitScan> {
    find_pits_with_progress(dem, &mut Silent)
}

/// [`find_pits`] with host progress reporting and cancellation.
pub fn find_pits_with_progress(dem: &Raster<f64>, progress: &mut dyn Progress) -> Result<PitScan> {
    let (rows, cols) = dem.shape();

    // grids without interior cells drain everywhere by definition
    if rows < 3 || cols < 3 {
        return Ok(PitScan {
            pits: dem.with_same_meta::<i32>(),
            flats: dem.with_same_meta::<i32>(),
            flat_rects: Vec::new(),
            records: Vec::new(),
        });
    }

    // A cell is a pit candidate when none of its neighbors lets water out:
    // border, no-data and strictly lower neighbors all disqualify it. The
    // test is purely local, so it runs row-parallel.
    let candidates: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![false; cols];

            if row == 0 || row + 1 == rows {
                return row_data;
            }

            for col in 1..cols - 1 {
                if !dem.is_valid(row, col) {
                    continue;
                }
                let z = unsafe { dem.get_unchecked(row, col) };

                let mut escapes = false;
                for dir in 0..8_i8 {
                    match dem.neighbor(row, col, dir) {
                        Some((nr, nc)) if dem.is_valid(nr, nc) => {
                            if unsafe { dem.get_unchecked(nr, nc) } < z {
                                escapes = true;
                                break;
                            }
                        }
                        // off-grid or no-data always drains
                        _ => {
                            escapes = true;
                            break;
                        }
                    }
                }

                row_data[col] = !escapes;
            }

            row_data
        })
        .collect();

    // Group candidates into equal-elevation regions. A region is a pit only
    // if every member is a candidate; one escaping member drains the whole
    // flat.
    let mut pits = dem.with_same_meta::<i32>();
    let mut flats = dem.with_same_meta::<i32>();
    let mut flat_rects: Vec<CellRect> = Vec::new();
    let mut records: Vec<PitRecord> = Vec::new();

    let mut examined = Array2::<bool>::from_elem((rows, cols), false);
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut region: Vec<(usize, usize)> = Vec::new();

    for row in 0..rows {
        if !progress.update(row, rows) {
            return Err(Error::Cancelled);
        }

        for col in 0..cols {
            if !candidates[row * cols + col] || examined[(row, col)] {
                continue;
            }

            let z = unsafe { dem.get_unchecked(row, col) };

            region.clear();
            stack.clear();
            stack.push((row, col));
            examined[(row, col)] = true;

            let mut is_pit = true;
            while let Some((r, c)) = stack.pop() {
                region.push((r, c));
                if !candidates[r * cols + c] {
                    is_pit = false;
                }

                for dir in 0..8_i8 {
                    if let Some((nr, nc)) = dem.neighbor(r, c, dir) {
                        if !examined[(nr, nc)]
                            && dem.is_valid(nr, nc)
                            && unsafe { dem.get_unchecked(nr, nc) } == z
                        {
                            examined[(nr, nc)] = true;
                            stack.push((nr, nc));
                        }
                    }
                }
            }

            if !is_pit {
                continue;
            }

            let pit_id = records.len() as i32 + 1;
            records.push(PitRecord { z, drained: false });

            if region.len() == 1 {
                unsafe { pits.set_unchecked(row, col, pit_id) };
            } else {
                let flat_id = flat_rects.len() as i32 + 1;
                let mut rect = CellRect::single(row, col);
                for &(r, c) in &region {
                    rect.expand(r, c);
                    unsafe {
                        pits.set_unchecked(r, c, pit_id);
                        flats.set_unchecked(r, c, flat_id);
                    }
                }
                flat_rects.push(rect);
            }
        }
    }

    Ok(PitScan {
        pits,
        flats,
        flat_rects,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(values: &[f64], rows: usize, cols: usize) -> Raster<f64> {
        Raster::from_vec(values.to_vec(), rows, cols).unwrap()
    }

    #[test]
    fn test_single_cell_pit() {
        // 3×3, center at 0, ring at 10: exactly one pit, only the center
        let dem = raster(
            &[
                10.0, 10.0, 10.0, //
                10.0, 0.0, 10.0, //
                10.0, 10.0, 10.0,
            ],
            3,
            3,
        );

        let scan = find_pits(&dem).unwrap();
        assert_eq!(scan.pit_count(), 1);
        assert_eq!(scan.pits.get(1, 1).unwrap(), 1);

        let marked: usize = scan.pits.data().iter().filter(|&&v| v > 0).count();
        assert_eq!(marked, 1, "only the center belongs to the pit");
        assert!(scan.flat_rects.is_empty(), "a single cell is not a flat");
    }

    #[test]
    fn test_flat_region_grouped_into_one_pit() {
        // 5×5 with a 1×3 flat trench at elevation 1
        let mut dem = Raster::filled(5, 5, 10.0_f64);
        for col in 1..4 {
            dem.set(2, col, 1.0).unwrap();
        }

        let scan = find_pits(&dem).unwrap();
        assert_eq!(scan.pit_count(), 1);
        for col in 1..4 {
            assert_eq!(scan.pits.get(2, col).unwrap(), 1);
            assert_eq!(scan.flats.get(2, col).unwrap(), 1);
        }

        let rect = scan.flat_rects[0];
        assert_eq!((rect.row_min, rect.row_max), (2, 2));
        assert_eq!((rect.col_min, rect.col_max), (1, 3));
    }

    #[test]
    fn test_sloped_plane_has_no_pits() {
        let mut dem = Raster::new(8, 8);
        for row in 0..8 {
            for col in 0..8 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }

        let scan = find_pits(&dem).unwrap();
        assert_eq!(scan.pit_count(), 0);
    }

    #[test]
    fn test_flat_touching_border_drains() {
        // The flat at elevation 1 reaches the border, so it drains by
        // definition and must not be reported.
        let mut dem = Raster::filled(4, 4, 10.0_f64);
        dem.set(1, 0, 1.0).unwrap();
        dem.set(1, 1, 1.0).unwrap();
        dem.set(1, 2, 1.0).unwrap();

        let scan = find_pits(&dem).unwrap();
        assert_eq!(scan.pit_count(), 0);
    }

    #[test]
    fn test_nodata_neighbor_drains() {
        let mut dem = Raster::filled(5, 5, 10.0_f64);
        dem.set_nodata(Some(f64::NAN));
        dem.set(2, 2, 1.0).unwrap();
        dem.set(2, 3, f64::NAN).unwrap();

        let scan = find_pits(&dem).unwrap();
        assert_eq!(scan.pit_count(), 0, "a void next to the low cell drains it");
    }

    #[test]
    fn test_single_row_never_pits() {
        // every cell of a one-row grid touches the border
        let dem = Raster::from_vec(vec![10.0, 10.0, 0.0, 10.0, 10.0], 1, 5).unwrap();
        assert_eq!(find_pits(&dem).unwrap().pit_count(), 0);
    }

    #[test]
    fn test_two_separate_pits() {
        let mut dem = Raster::filled(5, 7, 10.0_f64);
        dem.set(2, 1, 2.0).unwrap();
        dem.set(2, 5, 3.0).unwrap();

        let scan = find_pits(&dem).unwrap();
        assert_eq!(scan.pit_count(), 2);
        assert_ne!(
            scan.pits.get(2, 1).unwrap(),
            scan.pits.get(2, 5).unwrap()
        );
    }

    #[test]
    fn test_cancellation() {
        struct Cancel;
        impl Progress for Cancel {
            fn update(&mut self, _done: usize, _total: usize) -> bool {
                false
            }
        }

        let dem = Raster::filled(10, 10, 1.0_f64);
        let result = find_pits_with_progress(&dem, &mut Cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
