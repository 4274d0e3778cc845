//! TEPX module quadrant splitter: partitions a four-chip module's hit list
//! into four independent, per-chip word streams. Pure partitioning above
//! the public `Config`/`event` surface; no new wire-format rules.

use crate::config::Config;
use crate::event::encode_stream;
use crate::types::{HitCoord, Header};
use crate::Error;

/// Split one module-wide hit list into four chip-local `(header, hits)`
/// pairs, tagged `chip_id` 0-3 in the arrangement:
/// `0` top-left, `1` bottom-left, `2` top-right, `3` bottom-right.
pub fn split_module(config: &Config, header: &Header, hits: &[HitCoord]) -> [(Header, Vec<HitCoord>); 4] {
    let chip_width = config.chip_width();
    let chip_height = config.chip_height();
    let mut buckets: [Vec<HitCoord>; 4] = Default::default();

    for hit in hits {
        let quadrant = match (hit.x >= chip_width, hit.y >= chip_height) {
            (false, false) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (true, true) => 3,
        };
        buckets[quadrant].push(HitCoord {
            x: hit.x % chip_width,
            y: hit.y % chip_height,
            tot: hit.tot,
        });
    }

    let mut result: [(Header, Vec<HitCoord>); 4] = Default::default();
    for (i, bucket) in buckets.into_iter().enumerate() {
        let mut h = *header;
        h.chip_id = i as u8;
        result[i] = (h, bucket);
    }
    result
}

/// Split and encode a module-wide hit list into four independent,
/// independently decodable word streams.
pub fn encode_module(
    config: &Config,
    header: &Header,
    hits: &[HitCoord],
) -> Result<[Vec<u64>; 4], Error> {
    let chips = split_module(config, header, hits);
    let mut out: [Vec<u64>; 4] = Default::default();
    for (i, (chip_header, chip_hits)) in chips.into_iter().enumerate() {
        // A quadrant with no hits produces no stream rather than an error;
        // `encode_stream` only rejects an empty *hit list within an event
        // that is otherwise expected to carry data*.
        if chip_hits.is_empty() {
            continue;
        }
        out[i] = encode_stream(config, &[(chip_header, chip_hits)], None)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_stream;
    use crate::event::qcores_to_hits;

    fn cfg() -> Config {
        Config::new(2, 8, true, false, true, false, false, 0).unwrap()
    }

    #[test]
    fn splits_into_four_quadrants() {
        let c = cfg();
        let chip_width = c.chip_width();
        let chip_height = c.chip_height();
        let header = Header::default();
        let hits = vec![
            HitCoord { x: 0, y: 0, tot: 1 },
            HitCoord { x: 0, y: chip_height, tot: 2 },
            HitCoord { x: chip_width, y: 0, tot: 3 },
            HitCoord { x: chip_width, y: chip_height, tot: 4 },
        ];
        let quadrants = split_module(&c, &header, &hits);
        for (i, (h, qhits)) in quadrants.iter().enumerate() {
            assert_eq!(h.chip_id, i as u8);
            assert_eq!(qhits.len(), 1);
            assert_eq!(qhits[0].x, 0);
            assert_eq!(qhits[0].y, 0);
        }
    }

    #[test]
    fn each_chip_stream_roundtrips_independently() {
        let c = cfg();
        let header = Header::default();
        let hits = vec![
            HitCoord { x: 1, y: 1, tot: 1 },
            HitCoord { x: c.chip_width() + 2, y: 3, tot: 2 },
        ];
        let streams = encode_module(&c, &header, &hits).unwrap();
        for (i, words) in streams.iter().enumerate() {
            if words.is_empty() {
                continue;
            }
            let events = decode_stream(&c, words, None).unwrap();
            assert_eq!(events[0].header.chip_id, i as u8);
            let decoded = qcores_to_hits(&c, &events[0].qcores).unwrap();
            assert!(!decoded.is_empty());
        }
    }
}
