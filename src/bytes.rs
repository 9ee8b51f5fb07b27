use crate::{Error, Result};

/// Rounds `len` up to the next multiple of 4, the boundary CD-1.1 pads
/// variable-length fields to.
#[must_use]
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(4) * 4
}

/// Null-pads `s` to exactly `len` bytes.
///
/// # Errors
/// [`Error::MalformedFrame`] if `s` is longer than `len`.
pub fn pad_string(s: &str, len: usize) -> Result<Vec<u8>> {
    if s.len() > len {
        return Err(Error::MalformedFrame(format!(
            "string {s:?} exceeds fixed width {len}"
        )));
    }
    let mut out = s.as_bytes().to_vec();
    out.resize(len, 0);
    Ok(out)
}

/// Reads a fixed-width string field, dropping null padding and surrounding
/// whitespace.
#[must_use]
pub fn strip_string(dat: &[u8]) -> String {
    String::from_utf8_lossy(dat)
        .replace('\0', "")
        .trim()
        .to_owned()
}

/// Cursor over an immutable byte slice.
///
/// Every read advances an explicit offset and fails with
/// [`Error::NotEnoughData`] rather than panicking or truncating, so codecs can
/// walk a frame body field by field without index arithmetic.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::NotEnoughData {
                actual: self.remaining(),
                minimum: count,
            });
        }
        let dat = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(dat)
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let dat = self.take(4)?;
        Ok(i32::from_be_bytes([dat[0], dat[1], dat[2], dat[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let dat = self.take(4)?;
        Ok(f32::from_be_bytes([dat[0], dat[1], dat[2], dat[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let dat = self.take(8)?;
        Ok(u64::from_be_bytes([
            dat[0], dat[1], dat[2], dat[3], dat[4], dat[5], dat[6], dat[7],
        ]))
    }
}
