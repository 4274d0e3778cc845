//! Stream configuration and the cell-index formulas that depend on it.

use crate::Error;

/// Number of quarter-core columns across the chip, fixed regardless of layout.
pub const N_QCORES_HORIZONTAL: u8 = 54;
/// Number of quarter-core rows down the chip, fixed regardless of layout.
pub const N_QCORES_VERTICAL: u16 = 168;

/// Encoding parameters shared by every event in a stream.
///
/// Immutable once built; [`Config::new`] rejects any quarter-core layout
/// other than the two the chip actually supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    qcore_vert: u8,
    qcore_horiz: u8,
    pub chip_id: bool,
    pub drop_tot: bool,
    pub compressed_hitmap: bool,
    pub bcid: bool,
    pub l1id: bool,
    pub eos_marker: bool,
    /// Reserved for forward compatibility; accepted but never consulted.
    pub events_per_stream: u32,
}

impl Config {
    /// Build a validated configuration. `qcore_vert`/`qcore_horiz` must be
    /// `(2, 8)` or `(4, 4)`; anything else is `Error::InvalidConfig`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        qcore_vert: u8,
        qcore_horiz: u8,
        chip_id: bool,
        drop_tot: bool,
        compressed_hitmap: bool,
        bcid: bool,
        l1id: bool,
        events_per_stream: u32,
    ) -> Result<Self, Error> {
        if !matches!((qcore_vert, qcore_horiz), (2, 8) | (4, 4)) {
            return Err(Error::InvalidConfig(format!(
                "quarter-core layout must be (2,8) or (4,4), got ({qcore_vert},{qcore_horiz})"
            )));
        }
        Ok(Config {
            qcore_vert,
            qcore_horiz,
            chip_id,
            drop_tot,
            compressed_hitmap,
            bcid,
            l1id,
            eos_marker: true,
            events_per_stream,
        })
    }

    pub fn qcore_vert(&self) -> u8 {
        self.qcore_vert
    }

    pub fn qcore_horiz(&self) -> u8 {
        self.qcore_horiz
    }

    /// Chip-local pixel width of one quarter-core column.
    pub fn chip_width(&self) -> u32 {
        self.qcore_horiz as u32 * N_QCORES_HORIZONTAL as u32
    }

    /// Chip-local pixel height of one quarter-core row.
    pub fn chip_height(&self) -> u32 {
        self.qcore_vert as u32 * N_QCORES_VERTICAL as u32
    }

    /// Map `(col, row)` within a quarter-core to its flat cell index in `[0, 16)`.
    ///
    /// The `(2, 8)` layout uses the canonical RD53B formula `col + 8*row`.
    pub fn cell_index(&self, col: u8, row: u8) -> Result<u8, Error> {
        if col >= self.qcore_horiz || row >= self.qcore_vert {
            return Err(Error::OutOfRange(format!(
                "cell ({col},{row}) outside ({},{}) layout",
                self.qcore_horiz, self.qcore_vert
            )));
        }
        let index = match (self.qcore_vert, self.qcore_horiz) {
            (2, 8) => col + 8 * row,
            (4, 4) => {
                if row > 1 {
                    8 + col * 2 + (row - 2)
                } else {
                    col * 2 + row
                }
            }
            _ => unreachable!("validated in Config::new"),
        };
        Ok(index)
    }

    /// Inverse of [`Config::cell_index`]: map a flat index in `[0, 16)` back to `(col, row)`.
    pub fn cell_coords(&self, index: u8) -> Result<(u8, u8), Error> {
        if index >= 16 {
            return Err(Error::OutOfRange(format!("cell index {index} >= 16")));
        }
        let (col, row) = match (self.qcore_vert, self.qcore_horiz) {
            (2, 8) => (index % 8, index / 8),
            (4, 4) => {
                if index < 8 {
                    (index / 2, index % 2)
                } else {
                    let rest = index - 8;
                    (rest / 2, 2 + rest % 2)
                }
            }
            _ => unreachable!("validated in Config::new"),
        };
        Ok((col, row))
    }

    /// Validate that `(qcol, qrow)` fall within the chip's fixed quarter-core grid.
    pub fn check_qcore_bounds(&self, qcol: u8, qrow: u16) -> Result<(), Error> {
        if qcol >= N_QCORES_HORIZONTAL {
            return Err(Error::OutOfRange(format!(
                "qcol {qcol} >= {N_QCORES_HORIZONTAL}"
            )));
        }
        if qrow >= N_QCORES_VERTICAL {
            return Err(Error::OutOfRange(format!(
                "qrow {qrow} >= {N_QCORES_VERTICAL}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_layout() {
        assert!(Config::new(3, 5, false, false, false, false, false, 0).is_err());
    }

    #[test]
    fn cell_index_bijective_2x8() {
        let cfg = Config::new(2, 8, false, false, false, false, false, 0).unwrap();
        for index in 0..16u8 {
            let (col, row) = cfg.cell_coords(index).unwrap();
            assert_eq!(cfg.cell_index(col, row).unwrap(), index);
        }
    }

    #[test]
    fn cell_index_bijective_4x4() {
        let cfg = Config::new(4, 4, false, false, false, false, false, 0).unwrap();
        for index in 0..16u8 {
            let (col, row) = cfg.cell_coords(index).unwrap();
            assert_eq!(cfg.cell_index(col, row).unwrap(), index);
        }
    }

    #[test]
    fn canonical_2x8_formula() {
        let cfg = Config::new(2, 8, false, false, false, false, false, 0).unwrap();
        // col + 8*row, not the legacy col*2 + row
        assert_eq!(cfg.cell_index(3, 1).unwrap(), 3 + 8);
    }

    #[test]
    fn qcore_bounds() {
        let cfg = Config::new(2, 8, false, false, false, false, false, 0).unwrap();
        assert!(cfg.check_qcore_bounds(53, 167).is_ok());
        assert!(cfg.check_qcore_bounds(54, 0).is_err());
        assert!(cfg.check_qcore_bounds(0, 168).is_err());
    }
}
