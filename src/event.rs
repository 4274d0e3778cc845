//! Hits <-> qcores conversion and multi-event stream assembly.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::packet::{Packet, PacketTag};
use crate::qcore::QCore;
use crate::types::{HitCoord, Header};
use crate::writer::StreamWriter;
use crate::Error;

/// Group a hit list into qcores, ordered by `(qcol, qrow)`, with
/// `is_last`/`is_neighbour`/`is_last_in_event` assigned in a single pass.
pub fn hits_to_qcores<'a>(
    config: &'a Config,
    hits: &[HitCoord],
) -> Result<Vec<QCore<'a>>, Error> {
    let horiz = config.qcore_horiz() as u32;
    let vert = config.qcore_vert() as u32;
    let mut by_qcore: BTreeMap<(u8, u16), QCore<'a>> = BTreeMap::new();

    for hit in hits {
        let qcol_u32 = hit.x / horiz;
        let qrow_u32 = hit.y / vert;
        if qcol_u32 > u8::MAX as u32 || qrow_u32 > u16::MAX as u32 {
            return Err(Error::OutOfRange(format!(
                "hit ({}, {}) maps to an out-of-range qcore",
                hit.x, hit.y
            )));
        }
        let qcol = qcol_u32 as u8;
        let qrow = qrow_u32 as u16;
        config.check_qcore_bounds(qcol, qrow)?;
        let col_in_qcore = (hit.x % horiz) as u8;
        let row_in_qcore = (hit.y % vert) as u8;

        let entry = by_qcore.entry((qcol, qrow)).or_insert_with(|| {
            let mut qc = QCore::new(None).with_config(config);
            qc.qcol = qcol;
            qc.qrow = qrow;
            qc
        });
        entry.set_hit(col_in_qcore, row_in_qcore, hit.tot)?;
    }

    let mut qcores: Vec<QCore<'a>> = by_qcore.into_values().collect();
    let n = qcores.len();
    for i in 0..n {
        let is_last = i + 1 == n || qcores[i + 1].qcol != qcores[i].qcol;
        let is_neighbour = i > 0
            && qcores[i - 1].qcol == qcores[i].qcol
            && qcores[i - 1].qrow + 1 == qcores[i].qrow;
        qcores[i].is_last = is_last;
        qcores[i].is_neighbour = is_neighbour;
        qcores[i].is_last_in_event = i + 1 == n;
    }
    Ok(qcores)
}

/// Expand qcores back into chip-absolute hits.
pub fn qcores_to_hits(config: &Config, qcores: &[QCore]) -> Result<Vec<HitCoord>, Error> {
    let horiz = config.qcore_horiz() as u32;
    let vert = config.qcore_vert() as u32;
    let mut out = Vec::new();
    for qc in qcores {
        for (col, row, tot) in qc.get_hit_vectors()? {
            out.push(HitCoord {
                x: qc.qcol as u32 * horiz + col as u32,
                y: qc.qrow as u32 * vert + row as u32,
                tot,
            });
        }
    }
    Ok(out)
}

fn trigger_tag_packet(header: &Header) -> u64 {
    ((header.trigger_tag as u64 & 0x3F) << 2) | (header.trigger_pos as u64 & 0b11)
}

fn extra_ids_value(config: &Config, header: &Header) -> Option<u64> {
    match (config.l1id, config.bcid) {
        (false, true) => Some(header.bcid as u64),
        (true, false) => Some(header.l1id as u64),
        (true, true) => Some(((header.bcid as u64 & 0xFF) << 8) | (header.l1id as u64 & 0xFF)),
        (false, false) => None,
    }
}

/// Push `packet` onto `writer`, first reporting it to `hook` if one was
/// given — one callback invocation per emitted packet, in wire order.
fn emit(writer: &mut StreamWriter, hook: &mut Option<&mut dyn FnMut(&Packet)>, packet: Packet) {
    if let Some(f) = hook {
        f(&packet);
    }
    writer.push(&packet);
}

/// Encode a sequence of `(header, hits)` events into one word stream.
///
/// `bcid`/`l1id` are carried only on the first event, per the wire format;
/// later events share the first event's ids. An explicit trailing
/// `COLUMN = 0` packet is appended after the stream's last qcore so
/// termination never depends on incidental zero padding of the final word.
///
/// `hook`, if given, is invoked once per packet in the order it is
/// emitted onto the wire — a colorized debug printer or similar external
/// collaborator can be layered on through it without this module knowing
/// anything about terminal presentation.
pub fn encode_stream(
    config: &Config,
    events: &[(Header, Vec<HitCoord>)],
    mut hook: Option<&mut dyn FnMut(&Packet)>,
) -> Result<Vec<u64>, Error> {
    if events.is_empty() {
        return Err(Error::InvalidState("no events to encode".into()));
    }

    let mut writer = StreamWriter::new(config.chip_id);

    for (i, (header, hits)) in events.iter().enumerate() {
        let qcores = hits_to_qcores(config, hits)?;
        if qcores.is_empty() {
            return Err(Error::InvalidState(format!("event {i} has no hits")));
        }
        log::debug!("event {i}: {} hits grouped into {} qcores", hits.len(), qcores.len());

        if i == 0 {
            emit(&mut writer, &mut hook, Packet::new(8, trigger_tag_packet(header), PacketTag::TriggerTag));
            if let Some(ids) = extra_ids_value(config, header) {
                emit(&mut writer, &mut hook, Packet::new(16, ids, PacketTag::ExtraIds));
            }
        } else {
            // A COLUMN field >= 56 (top 3 bits 0b111) signals a new event
            // instead of a real column; the decoder discards the next 3
            // bits, then resumes the ordinary TRIGGER_TAG state.
            emit(&mut writer, &mut hook, Packet::new(6, 56, PacketTag::NewEventMarker));
            emit(&mut writer, &mut hook, Packet::new(3, 0, PacketTag::NewEventMarker));
            emit(&mut writer, &mut hook, Packet::new(8, trigger_tag_packet(header), PacketTag::TriggerTag));
        }

        let mut prev_was_last_in_col = true;
        for qc in &qcores {
            for packet in qc.serialize(prev_was_last_in_col)? {
                emit(&mut writer, &mut hook, packet);
            }
            prev_was_last_in_col = qc.is_last;
        }
    }

    emit(&mut writer, &mut hook, Packet::new(6, 0, PacketTag::Column));
    log::debug!("stream assembled from {} events", events.len());

    let chip_id = if config.chip_id {
        Some(events[0].0.chip_id)
    } else {
        None
    };
    Ok(writer.finish(chip_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::new(4, 4, true, false, true, true, true, 0).unwrap()
    }

    #[test]
    fn single_hit_groups_to_one_qcore() {
        let c = cfg();
        let hits = vec![HitCoord { x: 0, y: 0, tot: 1 }];
        let qcores = hits_to_qcores(&c, &hits).unwrap();
        assert_eq!(qcores.len(), 1);
        assert!(qcores[0].is_last);
        assert!(qcores[0].is_last_in_event);
        assert!(!qcores[0].is_neighbour);
    }

    #[test]
    fn neighbour_detected_same_column() {
        let c = cfg();
        let hits = vec![
            HitCoord { x: 0, y: 0, tot: 1 },
            HitCoord { x: 0, y: 4, tot: 2 },
        ];
        let qcores = hits_to_qcores(&c, &hits).unwrap();
        assert_eq!(qcores.len(), 2);
        assert!(!qcores[0].is_last);
        assert!(qcores[1].is_neighbour);
        assert!(qcores[1].is_last);
    }

    #[test]
    fn idempotent_hits_roundtrip() {
        let c = cfg();
        let mut hits = vec![
            HitCoord { x: 0, y: 0, tot: 1 },
            HitCoord { x: 15, y: 20, tot: 2 },
            HitCoord { x: 40, y: 100, tot: 12 },
        ];
        let qcores = hits_to_qcores(&c, &hits).unwrap();
        let mut back = qcores_to_hits(&c, &qcores).unwrap();
        hits.sort();
        back.sort();
        assert_eq!(hits, back);
    }

    #[test]
    fn out_of_range_hit_rejected() {
        let c = cfg();
        let hits = vec![HitCoord { x: 100_000, y: 0, tot: 0 }];
        assert!(hits_to_qcores(&c, &hits).is_err());
    }

    #[test]
    fn encode_rejects_empty_event_list() {
        let c = cfg();
        assert!(encode_stream(&c, &[], None).is_err());
    }

    #[test]
    fn packet_hook_sees_every_emitted_packet() {
        let c = cfg();
        let header = Header::default();
        let hits = vec![HitCoord { x: 0, y: 0, tot: 1 }];
        let mut seen = Vec::new();
        let mut hook = |packet: &Packet| seen.push(packet.tag);
        encode_stream(&c, &[(header, hits)], Some(&mut hook)).unwrap();
        assert!(seen.contains(&PacketTag::TriggerTag));
        assert!(seen.contains(&PacketTag::Hitmap));
        assert_eq!(seen.last(), Some(&PacketTag::Column));
    }

    #[test]
    fn single_hit_matches_golden_word() {
        // uncompressed 16-bit hitmap, no chip id, no bcid/l1id, a single
        // hit at (0,0) with tot=0 in a (2,8) layout.
        let c = Config::new(2, 8, false, false, false, false, false, 0).unwrap();
        let header = Header::default();
        let hits = vec![HitCoord { x: 0, y: 0, tot: 0 }];
        let words = encode_stream(&c, &[(header, hits)], None).unwrap();
        assert_eq!(words.len(), 1);
        let expected = hex::decode("8003000000800000").unwrap();
        assert_eq!(words[0].to_be_bytes().to_vec(), expected);
    }
}
