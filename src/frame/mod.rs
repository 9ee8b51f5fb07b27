//! CD-1.1 frame framing.
//!
//! A frame is a fixed 36-byte header, a type-specific body, and a trailer
//! carrying authentication and integrity fields. All integers are big-endian.
//!
//! # Example
//! Decode a header from raw bytes.
//! ```
//! use cd11::frame::{FrameHeader, FrameType};
//!
//! let mut dat = vec![0u8; FrameHeader::LEN];
//! dat[3] = 5; // Data
//! dat[7] = 36; // empty body
//! dat[8..12].copy_from_slice(b"LBTB");
//! dat[16..19].copy_from_slice(b"DC1");
//! let header = FrameHeader::decode(&dat).unwrap();
//! assert_eq!(header.frame_type, FrameType::Data);
//! ```
pub mod data;
mod reader;

pub use reader::read_frame;

use crate::bytes::{pad_string, padded_len, strip_string, Cursor};
use crate::{Error, Result};

/// Frame type tag carried in the first header field.
///
/// The tag set is closed; unknown codes are rejected at decode time. Only
/// [`FrameType::Data`] bodies are decoded further by this crate, but every
/// type is surfaced so callers can dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    ConnectionRequest = 1,
    ConnectionResponse = 2,
    OptionRequest = 3,
    OptionResponse = 4,
    Data = 5,
    Acknack = 6,
    CommandRequest = 7,
    CommandResponse = 8,
    Cd1Encapsulation = 9,
    CustomReset = 13,
    Alert = 26,
}

impl TryFrom<i32> for FrameType {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        Ok(match code {
            1 => FrameType::ConnectionRequest,
            2 => FrameType::ConnectionResponse,
            3 => FrameType::OptionRequest,
            4 => FrameType::OptionResponse,
            5 => FrameType::Data,
            6 => FrameType::Acknack,
            7 => FrameType::CommandRequest,
            8 => FrameType::CommandResponse,
            9 => FrameType::Cd1Encapsulation,
            13 => FrameType::CustomReset,
            26 => FrameType::Alert,
            _ => return Err(Error::UnknownFrameType(code)),
        })
    }
}

/// Fixed-size frame header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    /// Byte offset from the start of the frame to the trailer.
    pub trailer_offset: i32,
    /// Frame creator identifier, at most 8 chars on the wire.
    pub creator: String,
    /// Destination identifier, at most 8 chars on the wire.
    pub destination: String,
    /// Sequence number, monotonic per creator/destination pair. Compared
    /// unsigned everywhere, matching the gap tracker.
    pub sequence: u64,
    pub series: i32,
}

impl FrameHeader {
    pub const LEN: usize = 36;

    /// Decode a header from the first [`Self::LEN`] bytes of `dat`.
    ///
    /// # Errors
    /// [`Error::NotEnoughData`] on a short buffer, [`Error::UnknownFrameType`]
    /// for an unrecognized type code, or [`Error::MalformedFrame`] when the
    /// trailer offset would place the trailer inside the header.
    pub fn decode(dat: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(dat);
        let frame_type = FrameType::try_from(cur.read_i32()?)?;
        let trailer_offset = cur.read_i32()?;
        if trailer_offset < Self::LEN as i32 {
            return Err(Error::MalformedFrame(format!(
                "trailer offset {trailer_offset} overlaps the {} byte header",
                Self::LEN
            )));
        }
        let creator = strip_string(cur.take(8)?);
        let destination = strip_string(cur.take(8)?);
        let sequence = cur.read_u64()?;
        let series = cur.read_i32()?;
        Ok(FrameHeader {
            frame_type,
            trailer_offset,
            creator,
            destination,
            sequence,
            series,
        })
    }

    /// Serialize, the exact inverse of [`Self::decode`].
    ///
    /// # Errors
    /// [`Error::MalformedFrame`] if an identifier exceeds its fixed width.
    pub fn encode(&self) -> Result<[u8; Self::LEN]> {
        let mut out = [0u8; Self::LEN];
        out[0..4].copy_from_slice(&(self.frame_type as i32).to_be_bytes());
        out[4..8].copy_from_slice(&self.trailer_offset.to_be_bytes());
        out[8..16].copy_from_slice(&pad_string(&self.creator, 8)?);
        out[16..24].copy_from_slice(&pad_string(&self.destination, 8)?);
        out[24..32].copy_from_slice(&self.sequence.to_be_bytes());
        out[32..36].copy_from_slice(&self.series.to_be_bytes());
        Ok(out)
    }
}

/// Frame trailer: authentication fields plus the communication verification
/// value used for end-to-end integrity checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameTrailer {
    pub auth_key_id: i32,
    /// Authentication value, unpadded. The wire carries it padded to a 4-byte
    /// boundary.
    pub auth_value: Vec<u8>,
    pub comm_verification: u64,
}

impl FrameTrailer {
    /// Fixed fields before the variable authentication value.
    pub const FIXED_LEN: usize = 8;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(dat);
        let auth_key_id = cur.read_i32()?;
        let auth_size = cur.read_i32()?;
        if auth_size < 0 {
            return Err(Error::MalformedFrame(format!(
                "negative trailer auth size {auth_size}"
            )));
        }
        let auth_size = auth_size as usize;
        let auth_value = cur.take(padded_len(auth_size))?[..auth_size].to_vec();
        let comm_verification = cur.read_u64()?;
        Ok(FrameTrailer {
            auth_key_id,
            auth_value,
            comm_verification,
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.auth_key_id.to_be_bytes());
        out.extend_from_slice(&(self.auth_value.len() as i32).to_be_bytes());
        out.extend_from_slice(&self.auth_value);
        out.resize(Self::FIXED_LEN + padded_len(self.auth_value.len()), 0);
        out.extend_from_slice(&self.comm_verification.to_be_bytes());
        out
    }

    /// Encoded byte length, padding included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + padded_len(self.auth_value.len()) + 8
    }
}

/// One frame's bytes as captured off the stream, with its parsed header.
///
/// Consumed immediately by a type-specific decoder, then discarded.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub header: FrameHeader,
    data: Vec<u8>,
}

impl RawFrame {
    /// Assembles a raw frame from captured bytes.
    ///
    /// # Errors
    /// [`Error::MalformedFrame`] if the header's trailer offset does not fall
    /// strictly inside the captured length.
    pub fn new(header: FrameHeader, data: Vec<u8>) -> Result<Self> {
        let offset = header.trailer_offset as usize;
        if offset < FrameHeader::LEN || offset >= data.len() {
            return Err(Error::MalformedFrame(format!(
                "trailer offset {offset} outside captured frame of {} bytes",
                data.len()
            )));
        }
        Ok(RawFrame { header, data })
    }

    #[must_use]
    pub fn header_bytes(&self) -> &[u8] {
        &self.data[..FrameHeader::LEN]
    }

    /// Body bytes between header and trailer.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.data[FrameHeader::LEN..self.header.trailer_offset as usize]
    }

    #[must_use]
    pub fn trailer_bytes(&self) -> &[u8] {
        &self.data[self.header.trailer_offset as usize..]
    }

    pub fn trailer(&self) -> Result<FrameTrailer> {
        FrameTrailer::decode(self.trailer_bytes())
    }
}
