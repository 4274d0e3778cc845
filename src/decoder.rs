//! Iterative event decoder: walks a [`StreamReader`] through the states
//! `TRIGGER_TAG -> [EXTRA_IDS] -> COLUMN -> (IS_LAST, IS_NEIGHBOUR) -> [ROW]
//! -> HITMAP -> [TOT*] -> ...`, rendered as an explicit loop over a
//! "pending qcore" local rather than mutually-recursive methods sharing
//! mutable current-event/current-qcore pointers: the only genuine
//! recursion in the original state machine (a `COLUMN >= 56` marker
//! restarting at TRIGGER_TAG) becomes "start a new event and keep
//! looping", so decoding many concatenated events never grows the call
//! stack.

use crate::config::Config;
use crate::packet::{Packet, PacketTag};
use crate::qcore::QCore;
use crate::reader::StreamReader;
use crate::tools::bit_tree;
use crate::types::Header;
use crate::Error;

/// One decoded event: its header plus the qcores it contained, in
/// `(qcol, qrow)` order.
#[derive(Debug)]
pub struct DecodedEvent<'a> {
    pub header: Header,
    pub qcores: Vec<QCore<'a>>,
}

/// Report a consumed field to `hook`, if one was given.
fn trace(hook: &mut Option<&mut dyn FnMut(&Packet)>, width: u8, value: u64, tag: PacketTag) {
    if let Some(f) = hook {
        f(&Packet::new(width, value, tag));
    }
}

/// Decode every event out of a word stream.
///
/// `hook`, if given, is invoked once per packet in the order it is read
/// off the wire, mirroring [`crate::event::encode_stream`]'s hook. The
/// compressed hitmap's internal bit-pairs are not individually reported;
/// the hook instead sees one logical `Hitmap` packet carrying the fully
/// reconstructed 16-bit mask, matching the field `encode_stream` itself
/// reports regardless of whether the wire form was compressed or raw.
pub fn decode_stream<'a>(
    config: &'a Config,
    words: &[u64],
    mut hook: Option<&mut dyn FnMut(&Packet)>,
) -> Result<Vec<DecodedEvent<'a>>, Error> {
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = StreamReader::new(words, config.chip_id);
    let chip_id = if config.chip_id {
        reader.validate_chip_id()?
    } else {
        0
    };

    let mut events = Vec::new();
    let mut is_first_event = true;

    'events: loop {
        log::trace!("decoding event header, first={is_first_event}");
        let tag = reader.take(8)? as u8;
        trace(&mut hook, 8, tag as u64, PacketTag::TriggerTag);
        let mut header = Header {
            trigger_tag: tag >> 2,
            trigger_pos: tag & 0b11,
            chip_id,
            bcid: 0,
            l1id: 0,
        };

        if is_first_event && (config.bcid || config.l1id) {
            let ids = reader.take(16)?;
            trace(&mut hook, 16, ids, PacketTag::ExtraIds);
            match (config.l1id, config.bcid) {
                (false, true) => header.bcid = ids as u16,
                (true, false) => header.l1id = ids as u16,
                (true, true) => {
                    header.bcid = (ids & 0xFF) as u16;
                    header.l1id = ((ids >> 8) & 0xFF) as u16;
                }
                (false, false) => {}
            }
        }
        is_first_event = false;

        let mut qcores: Vec<QCore<'a>> = Vec::new();
        let mut pending = QCore::new(Some(config));

        loop {
            let col = reader.take(6)? as u8;
            log::trace!("col={col}");
            if col == 0 {
                trace(&mut hook, 6, 0, PacketTag::Column);
                if let Some(last) = qcores.last_mut() {
                    last.is_last = true;
                    last.is_last_in_event = true;
                }
                events.push(DecodedEvent { header, qcores });
                break 'events;
            } else if col >= 56 {
                trace(&mut hook, 6, col as u64, PacketTag::NewEventMarker);
                if let Some(last) = qcores.last_mut() {
                    last.is_last = true;
                    last.is_last_in_event = true;
                }
                events.push(DecodedEvent { header, qcores });
                let filler = reader.take(3)?;
                trace(&mut hook, 3, filler, PacketTag::NewEventMarker);
                continue 'events;
            }
            trace(&mut hook, 6, col as u64, PacketTag::Column);

            pending.qcol = col - 1;

            loop {
                pending.is_last = reader.take(1)? == 1;
                trace(&mut hook, 1, pending.is_last as u64, PacketTag::IsLast);
                pending.is_neighbour = reader.take(1)? == 1;
                trace(&mut hook, 1, pending.is_neighbour as u64, PacketTag::IsNeighbour);
                log::trace!(
                    "qcol={} is_last={} is_neighbour={}",
                    pending.qcol,
                    pending.is_last,
                    pending.is_neighbour
                );

                if pending.is_neighbour {
                    pending.qrow += 1;
                } else {
                    pending.qrow = reader.take(8)? as u16;
                    trace(&mut hook, 8, pending.qrow as u64, PacketTag::Row);
                }

                let hit_raw = if config.compressed_hitmap {
                    bit_tree::decode_hitmap_tree(&mut reader)?
                } else {
                    reader.take(16)? as u16
                };
                trace(&mut hook, 16, hit_raw as u64, PacketTag::Hitmap);

                let mut tots_raw = 0u64;
                if !config.drop_tot {
                    for index in (0..16u8).rev() {
                        if (hit_raw >> index) & 1 == 1 {
                            let tot = reader.take(4)?;
                            trace(&mut hook, 4, tot, PacketTag::Tot);
                            tots_raw |= tot << (index as u32 * 4);
                        }
                    }
                }

                pending.set_hit_raw(hit_raw, tots_raw);
                let is_last = pending.is_last;
                qcores.push(pending);
                let prev = qcores.last().unwrap();
                pending = QCore::new(Some(config));
                pending.qcol = prev.qcol;
                pending.qrow = prev.qrow;

                if is_last {
                    break;
                }
            }
        }
    }

    Ok(events)
}
