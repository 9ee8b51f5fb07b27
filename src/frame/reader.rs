use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::bytes::padded_len;
use crate::frame::{FrameHeader, FrameTrailer, RawFrame};
use crate::{Error, Result};

/// Reads one frame off `reader` under a cooperative cancellation check.
///
/// The header is read and validated first, then the body and trailer up to
/// the length they declare. `cancelled` is polled between blocking reads, so
/// an idle or shutting-down connection can be abandoned without blocking
/// indefinitely; a cancellation observed before any frame bytes arrive
/// returns [`Error::Cancelled`].
///
/// This operation is pure with respect to shared state; it neither retries
/// nor mutates anything, and a failure never yields a partially-constructed
/// frame. Retry policy belongs to the connection layer.
///
/// # Errors
/// [`Error::Cancelled`] when the predicate trips, [`Error::MalformedFrame`]
/// when the stream is truncated mid-frame or a declared length is
/// inconsistent, or [`Error::Io`] for any other stream failure.
pub fn read_frame<R, F>(reader: &mut R, cancelled: F) -> Result<RawFrame>
where
    R: Read,
    F: Fn() -> bool,
{
    if cancelled() {
        return Err(Error::Cancelled);
    }

    let mut data = vec![0u8; FrameHeader::LEN];
    fill(reader, &mut data, "frame header")?;
    let header = FrameHeader::decode(&data)?;
    trace!(?header, "read frame header");

    if cancelled() {
        return Err(Error::Cancelled);
    }
    let body_len = header.trailer_offset as usize - FrameHeader::LEN;
    data.resize(FrameHeader::LEN + body_len, 0);
    fill(reader, &mut data[FrameHeader::LEN..], "frame body")?;

    if cancelled() {
        return Err(Error::Cancelled);
    }
    // Fixed trailer fields first; the auth size they carry gives the rest.
    let trailer_start = data.len();
    data.resize(trailer_start + FrameTrailer::FIXED_LEN, 0);
    fill(reader, &mut data[trailer_start..], "frame trailer")?;
    let auth_size = i32::from_be_bytes([
        data[trailer_start + 4],
        data[trailer_start + 5],
        data[trailer_start + 6],
        data[trailer_start + 7],
    ]);
    if auth_size < 0 {
        return Err(Error::MalformedFrame(format!(
            "negative trailer auth size {auth_size}"
        )));
    }

    if cancelled() {
        return Err(Error::Cancelled);
    }
    let rest = data.len();
    data.resize(rest + padded_len(auth_size as usize) + 8, 0);
    fill(reader, &mut data[rest..], "frame trailer auth")?;

    RawFrame::new(header, data)
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(Error::MalformedFrame(format!(
            "stream truncated reading {what}"
        ))),
        Err(err) => Err(Error::Io(err)),
    }
}
