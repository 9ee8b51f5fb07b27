//! CD-1.1 wire timestamps.
//!
//! Every timestamp on the wire is exactly 20 ASCII bytes of
//! `YYYYDDD HH:MM:SS.MMM` where `DDD` is the zero-padded day of year. The
//! encoding is lossless to and from an absolute instant at millisecond
//! resolution.
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

/// Encoded timestamp width in bytes.
pub const LEN: usize = 20;

const FORMAT: &str = "%Y%j %H:%M:%S%.3f";

/// Decode a 20-byte wire timestamp.
///
/// # Errors
/// [`Error::NotEnoughData`] if `dat` is shorter than [`LEN`], or
/// [`Error::BadTimestamp`] if the bytes do not match the expected shape.
pub fn decode(dat: &[u8]) -> Result<DateTime<Utc>> {
    if dat.len() < LEN {
        return Err(Error::NotEnoughData {
            actual: dat.len(),
            minimum: LEN,
        });
    }
    let dat = &dat[..LEN];
    let s = std::str::from_utf8(dat).map_err(|_| bad(dat))?;
    let naive = NaiveDateTime::parse_from_str(s, FORMAT).map_err(|_| bad(dat))?;
    Ok(naive.and_utc())
}

/// Encode `time` as a 20-byte wire timestamp, truncating below milliseconds.
///
/// # Errors
/// [`Error::BadTimestamp`] if the instant does not fit the fixed-width
/// encoding, i.e. its year has other than four digits.
pub fn encode(time: DateTime<Utc>) -> Result<[u8; LEN]> {
    let s = time.format(FORMAT).to_string();
    let out = s.as_bytes().try_into().map_err(|_| Error::BadTimestamp(s.clone()))?;
    Ok(out)
}

fn bad(dat: &[u8]) -> Error {
    Error::BadTimestamp(String::from_utf8_lossy(dat).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_day_of_year() {
        // 2017 day 335 is Dec 1
        let time = decode(b"2017335 17:15:00.123").unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2017, 12, 1, 17, 15, 0).unwrap() + chrono::Duration::milliseconds(123));
    }

    #[test]
    fn round_trips_at_millisecond_resolution() {
        let dat = *b"1999001 00:00:59.999";
        let time = decode(&dat).unwrap();
        assert_eq!(encode(time).unwrap(), dat);

        let time = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(decode(&encode(time).unwrap()).unwrap(), time);
    }

    #[test]
    fn encode_rejects_years_outside_four_digits() {
        let time = Utc.with_ymd_and_hms(10_000, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(encode(time), Err(Error::BadTimestamp(_))));

        let time = Utc.with_ymd_and_hms(-1, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(encode(time), Err(Error::BadTimestamp(_))));
    }

    #[test]
    fn rejects_corrupt_bytes() {
        // non-numeric minute digit
        assert!(matches!(
            decode(b"2017335 17:k5:00.123"),
            Err(Error::BadTimestamp(_))
        ));
        // missing day-of-year digit
        assert!(decode(b"201733 17:15:00.1234").is_err());
        // truncated
        assert!(matches!(
            decode(b"2017335 17:15"),
            Err(Error::NotEnoughData { .. })
        ));
    }
}
