//! # rd53b-stream
//!
//! Encode and decode the RD53B pixel-detector readout data stream: a
//! bit-exact packing of per-event hit information into a sequence of
//! 64-bit words, and the symmetric unpacking back into hits.
//!
//! * [`qcore`] is the 16-cell quarter-core hit container and hierarchical
//!   hitmap compressor.
//! * [`event`] groups hits into quarter-cores and assembles a multi-event
//!   word stream.
//! * [`decoder`] walks a word stream back into events and hits.
//! * [`quadrant`] splits a four-chip module's hits into four independent
//!   per-chip streams.
//!
//! ## Example
//!
//! ```rs
//! use rd53b_stream::*;
//! let config = Config::new(2, 8, true, false, true, true, true, 0).expect("bad config");
//! let header = Header { trigger_tag: 5, trigger_pos: 1, chip_id: 2, bcid: 10, l1id: 20 };
//! let hits = vec![HitCoord { x: 0, y: 0, tot: 3 }];
//! let words = event::encode_stream(&config, &[(header, hits)], None).expect("encode failed");
//! let events = decoder::decode_stream(&config, &words, None).expect("decode failed");
//! ```

mod tools;
pub mod config;
pub mod types;
pub mod packet;
pub mod qcore;
pub mod writer;
pub mod reader;
pub mod event;
pub mod decoder;
pub mod quadrant;

pub use config::Config;
pub use types::{Header, HitCoord};
pub use qcore::QCore;

/// Errors produced by the encoder, decoder, and the types they operate on.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("value out of range: {0}")]
    OutOfRange(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("chip id mismatch across stream: expected {expected}, found {found}")]
    StreamMismatch { expected: u8, found: u8 },
    #[error("stream truncated while reading {0} bits at word {1}")]
    TruncatedStream(u8, usize),
}
