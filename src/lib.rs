//! CD-1.1 station frame decoding.
//!
//! Byte-exact codecs for the CD-1.1 protocol used by remote seismic
//! acquisition stations: frame headers, data-frame channel subframes, and
//! trailers, plus the per-station sequence gap tracker and the waveform
//! extraction layer that attributes decoded subframes to configured channels.
//!
//! Reference: IDC CD-1.1 Formats and Protocols.
pub mod bytes;
mod error;

pub mod frame;
pub mod gaps;
pub mod timestamp;
pub mod waveform;

pub use error::{Error, Result};
