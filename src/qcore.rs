//! `QCore`: a single 16-cell quarter-core's hit mask, ToT values, and
//! column-run flags, plus its serialization into wire packets.

use crate::config::Config;
use crate::packet::{Packet, PacketTag};
use crate::tools::bit_tree;
use crate::Error;

/// A quarter-core at grid position `(qcol, qrow)`. Borrows its [`Config`]
/// to resolve `(col, row)` <-> flat cell index; a `None` config (the
/// "null config" state) is valid for plain bit-mask access but any
/// accessor needing the cell layout returns [`Error::InvalidConfig`].
#[derive(Clone, Copy, Debug)]
pub struct QCore<'a> {
    pub qcol: u8,
    pub qrow: u16,
    hits: u16,
    tots: u64,
    pub is_last: bool,
    pub is_neighbour: bool,
    pub is_last_in_event: bool,
    config: Option<&'a Config>,
}

impl<'a> PartialEq for QCore<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.qcol == other.qcol
            && self.qrow == other.qrow
            && self.hits == other.hits
            && self.tots == other.tots
            && self.is_last == other.is_last
            && self.is_neighbour == other.is_neighbour
            && self.is_last_in_event == other.is_last_in_event
    }
}
impl<'a> Eq for QCore<'a> {}

impl<'a> QCore<'a> {
    pub fn new(config: Option<&'a Config>) -> Self {
        QCore {
            qcol: 0,
            qrow: 0,
            hits: 0,
            tots: 0,
            is_last: false,
            is_neighbour: false,
            is_last_in_event: false,
            config,
        }
    }

    pub fn with_config(mut self, config: &'a Config) -> Self {
        self.config = Some(config);
        self
    }

    fn config(&self) -> Result<&'a Config, Error> {
        self.config
            .ok_or_else(|| Error::InvalidConfig("operation requires a config".into()))
    }

    /// Read one cell by its flat index in `[0, 16)`.
    pub fn get_hit_index(&self, index: u8) -> Result<(bool, u8), Error> {
        if index >= 16 {
            return Err(Error::OutOfRange(format!("cell index {index} >= 16")));
        }
        let present = (self.hits >> index) & 1 == 1;
        let tot = ((self.tots >> (index * 4)) & 0xF) as u8;
        Ok((present, tot))
    }

    /// Set one cell by its flat index in `[0, 16)`.
    pub fn set_hit_index(&mut self, index: u8, tot: u8) -> Result<(), Error> {
        if index >= 16 {
            return Err(Error::OutOfRange(format!("cell index {index} >= 16")));
        }
        if tot >= 16 {
            return Err(Error::OutOfRange(format!("tot {tot} >= 16")));
        }
        log::trace!("qcore ({}, {}) cell {index} set, tot={tot}", self.qcol, self.qrow);
        self.hits |= 1 << index;
        self.tots &= !(0xFu64 << (index * 4));
        self.tots |= (tot as u64) << (index * 4);
        Ok(())
    }

    pub fn get_hit(&self, col: u8, row: u8) -> Result<(bool, u8), Error> {
        let index = self.config()?.cell_index(col, row)?;
        self.get_hit_index(index)
    }

    pub fn set_hit(&mut self, col: u8, row: u8, tot: u8) -> Result<(), Error> {
        let index = self.config()?.cell_index(col, row)?;
        self.set_hit_index(index, tot)
    }

    pub fn get_hit_raw(&self) -> (u16, u64) {
        (self.hits, self.tots)
    }

    pub fn set_hit_raw(&mut self, hits: u16, tots: u64) {
        self.hits = hits;
        self.tots = tots;
    }

    /// `(col_in_qcore, row_in_qcore, tot)` for every set cell, column-major.
    pub fn get_hit_vectors(&self) -> Result<Vec<(u8, u8, u8)>, Error> {
        let config = self.config()?;
        let mut out = Vec::new();
        for col in 0..config.qcore_horiz() {
            for row in 0..config.qcore_vert() {
                let (present, tot) = self.get_hit(col, row)?;
                if present {
                    out.push((col, row, tot));
                }
            }
        }
        Ok(out)
    }

    /// Hierarchical-tree encoding of the hit mask: `(bits, length_in_bits)`.
    pub fn binary_tree(&self) -> (u64, u8) {
        bit_tree::encode_hitmap_tree(self.hits)
    }

    /// Wire packets for this qcore: `[COLUMN?] IS_LAST IS_NEIGHBOUR [ROW?] HITMAP [TOT*]`.
    pub fn serialize(&self, prev_was_last_in_col: bool) -> Result<Vec<Packet>, Error> {
        if self.hits == 0 {
            return Err(Error::InvalidState("cannot serialize an empty qcore".into()));
        }
        let config = self.config()?;
        let mut packets = Vec::new();

        if prev_was_last_in_col {
            packets.push(Packet::new(6, self.qcol as u64 + 1, PacketTag::Column));
        }
        packets.push(Packet::new(1, self.is_last as u64, PacketTag::IsLast));
        packets.push(Packet::new(1, self.is_neighbour as u64, PacketTag::IsNeighbour));
        if !self.is_neighbour {
            packets.push(Packet::new(8, self.qrow as u64, PacketTag::Row));
        }

        if config.compressed_hitmap {
            let (bits, len) = self.binary_tree();
            packets.push(Packet::new(len, bits, PacketTag::Hitmap));
        } else {
            packets.push(Packet::new(16, self.hits as u64, PacketTag::Hitmap));
        }

        if !config.drop_tot {
            for index in (0..16u8).rev() {
                if (self.hits >> index) & 1 == 1 {
                    let tot = (self.tots >> (index * 4)) & 0xF;
                    packets.push(Packet::new(4, tot, PacketTag::Tot));
                }
            }
        }

        Ok(packets)
    }
}
