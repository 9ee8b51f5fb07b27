//! Data frame bodies: the channel subframe header and per-channel subframes.
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::bytes::{pad_string, padded_len, strip_string, Cursor};
use crate::{timestamp, Error, Result};

/// Sample compression applied to a subframe's payload.
///
/// Closed code table; unknown codes are rejected at decode time rather than
/// mapped to a default.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompressionFormat {
    None = 0,
    CanadianBeforeSignature = 1,
    CanadianAfterSignature = 2,
    SteimBeforeSignature = 3,
    SteimAfterSignature = 4,
}

impl TryFrom<u8> for CompressionFormat {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0 => CompressionFormat::None,
            1 => CompressionFormat::CanadianBeforeSignature,
            2 => CompressionFormat::CanadianAfterSignature,
            3 => CompressionFormat::SteimBeforeSignature,
            4 => CompressionFormat::SteimAfterSignature,
            _ => return Err(Error::UnknownCompressionFormat(code)),
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SensorType {
    Seismic = 0,
    Hydroacoustic = 1,
    Infrasonic = 2,
    Weather = 3,
    Other = 4,
}

impl TryFrom<u8> for SensorType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0 => SensorType::Seismic,
            1 => SensorType::Hydroacoustic,
            2 => SensorType::Infrasonic,
            3 => SensorType::Weather,
            4 => SensorType::Other,
            _ => return Err(Error::UnknownSensorType(code)),
        })
    }
}

/// Declared sample encoding, two ASCII chars on the wire.
///
/// Decoding payloads per format is a pluggable downstream concern; the tag is
/// only carried through.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataFormat {
    S4,
    S3,
    S2,
    I4,
    I2,
    F4,
    F8,
}

impl DataFormat {
    pub fn decode(dat: &[u8; 2]) -> Result<Self> {
        Ok(match dat {
            b"s4" => DataFormat::S4,
            b"s3" => DataFormat::S3,
            b"s2" => DataFormat::S2,
            b"i4" => DataFormat::I4,
            b"i2" => DataFormat::I2,
            b"f4" => DataFormat::F4,
            b"f8" => DataFormat::F8,
            _ => {
                return Err(Error::UnknownDataFormat(
                    String::from_utf8_lossy(dat).into_owned(),
                ))
            }
        })
    }

    #[must_use]
    pub fn encode(&self) -> [u8; 2] {
        match self {
            DataFormat::S4 => *b"s4",
            DataFormat::S3 => *b"s3",
            DataFormat::S2 => *b"s2",
            DataFormat::I4 => *b"i4",
            DataFormat::I2 => *b"i2",
            DataFormat::F4 => *b"f4",
            DataFormat::F8 => *b"f8",
        }
    }
}

/// Bytes of channel string per channel: 5 site + 3 channel + 2 location.
pub const CHANNEL_ENTRY_LEN: usize = 10;

/// Header preceding the channel subframes in a data frame body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSubframeHeader {
    pub num_channels: i32,
    /// Time span covered by the frame, milliseconds.
    pub frame_time_length: i32,
    pub nominal_time: DateTime<Utc>,
    /// Concatenated 10-char site/channel/location entries, one per channel.
    pub channel_string: String,
}

impl ChannelSubframeHeader {
    /// Fixed fields before the variable channel string.
    pub const FIXED_LEN: usize = 4 + 4 + timestamp::LEN + 4;

    pub fn decode(cur: &mut Cursor) -> Result<Self> {
        let num_channels = cur.read_i32()?;
        if num_channels <= 0 {
            return Err(Error::MalformedFrame(format!(
                "channel count must be positive, got {num_channels}"
            )));
        }
        let frame_time_length = cur.read_i32()?;
        if frame_time_length <= 0 {
            return Err(Error::MalformedFrame(format!(
                "frame time length must be positive, got {frame_time_length}"
            )));
        }
        let nominal_time = timestamp::decode(cur.take(timestamp::LEN)?)?;

        let declared = cur.read_i32()?;
        let expected = num_channels as usize * CHANNEL_ENTRY_LEN;
        if declared < 0 || declared as usize != expected {
            return Err(Error::MalformedFrame(format!(
                "channel string count {declared} inconsistent with {num_channels} channels"
            )));
        }
        // take() fails here when the declared count overruns the buffer
        // rather than silently truncating.
        let padded = cur.take(padded_len(expected))?;
        let channel_string = String::from_utf8_lossy(&padded[..expected]).into_owned();

        Ok(ChannelSubframeHeader {
            num_channels,
            frame_time_length,
            nominal_time,
            channel_string,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.num_channels.to_be_bytes());
        out.extend_from_slice(&self.frame_time_length.to_be_bytes());
        out.extend_from_slice(&timestamp::encode(self.nominal_time)?);
        out.extend_from_slice(&(self.channel_string.len() as i32).to_be_bytes());
        let start = out.len();
        out.extend_from_slice(self.channel_string.as_bytes());
        out.resize(start + padded_len(self.channel_string.len()), 0);
        Ok(())
    }

    /// Encoded byte length, channel string padding included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + padded_len(self.channel_string.len())
    }
}

/// One channel's record inside a data frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSubframe {
    /// Subframe byte count, excluding this field itself. Divisible by 4.
    pub channel_length: i32,
    /// Offset from the first byte of the frame to this subframe's
    /// authentication key identifier.
    pub auth_offset: i32,
    pub auth_flag: u8,
    pub compression: CompressionFormat,
    pub sensor_type: SensorType,
    pub calib_flag: u8,
    pub site: String,
    pub channel: String,
    pub location: String,
    pub data_format: DataFormat,
    pub calib_factor: f32,
    pub calib_period: f32,
    pub time: DateTime<Utc>,
    /// Time spanned by this subframe's samples, milliseconds.
    pub time_length: i32,
    pub samples: i32,
    /// Channel status bytes, unpadded.
    pub channel_status: Vec<u8>,
    /// Raw sample bytes, unpadded. Decoding is keyed by `data_format`.
    pub data: Vec<u8>,
    pub subframe_count: i32,
    pub auth_key_id: i32,
    /// Authentication value, unpadded.
    pub auth_value: Vec<u8>,
}

impl ChannelSubframe {
    /// Nine i32 fields + 24-byte channel description + 20-byte timestamp.
    pub const MIN_LEN: usize = 9 * 4 + 24 + timestamp::LEN;

    pub fn decode(cur: &mut Cursor) -> Result<Self> {
        let channel_length = cur.read_i32()?;
        if channel_length < Self::MIN_LEN as i32 - 4 || channel_length % 4 != 0 {
            return Err(Error::MalformedFrame(format!(
                "channel length {channel_length} invalid"
            )));
        }
        let auth_offset = cur.read_i32()?;
        if auth_offset < Self::MIN_LEN as i32 {
            return Err(Error::MalformedFrame(format!(
                "authentication offset {auth_offset} inside fixed fields"
            )));
        }

        // 24-byte channel description
        let auth_flag = cur.read_u8()?;
        let compression = CompressionFormat::try_from(cur.read_u8()?)?;
        let sensor_type = SensorType::try_from(cur.read_u8()?)?;
        let calib_flag = cur.read_u8()?;
        let site = strip_string(cur.take(5)?);
        let channel = strip_string(cur.take(3)?);
        let location = strip_string(cur.take(2)?);
        let format_bytes = cur.take(2)?;
        let data_format = DataFormat::decode(&[format_bytes[0], format_bytes[1]])?;
        let calib_factor = cur.read_f32()?;
        let calib_period = cur.read_f32()?;

        let time = timestamp::decode(cur.take(timestamp::LEN)?)?;
        let time_length = cur.read_i32()?;
        let samples = cur.read_i32()?;
        if time_length < 0 || samples < 0 {
            return Err(Error::MalformedFrame(format!(
                "negative subframe time length {time_length} or sample count {samples}"
            )));
        }

        let channel_status = Self::sized_field(cur, "channel status")?;
        let data = Self::sized_field(cur, "sample data")?;

        let subframe_count = cur.read_i32()?;
        if subframe_count < 0 {
            return Err(Error::MalformedFrame(format!(
                "negative subframe count {subframe_count}"
            )));
        }
        let auth_key_id = cur.read_i32()?;
        let auth_value = Self::sized_field(cur, "authentication value")?;

        Ok(ChannelSubframe {
            channel_length,
            auth_offset,
            auth_flag,
            compression,
            sensor_type,
            calib_flag,
            site,
            channel,
            location,
            data_format,
            calib_factor,
            calib_period,
            time,
            time_length,
            samples,
            channel_status,
            data,
            subframe_count,
            auth_key_id,
            auth_value,
        })
    }

    // A declared-size field followed by its bytes padded to a 4-byte boundary.
    fn sized_field(cur: &mut Cursor, what: &str) -> Result<Vec<u8>> {
        let size = cur.read_i32()?;
        if size < 0 {
            return Err(Error::MalformedFrame(format!(
                "negative {what} size {size}"
            )));
        }
        let size = size as usize;
        Ok(cur.take(padded_len(size))?[..size].to_vec())
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.channel_length.to_be_bytes());
        out.extend_from_slice(&self.auth_offset.to_be_bytes());
        out.push(self.auth_flag);
        out.push(self.compression as u8);
        out.push(self.sensor_type as u8);
        out.push(self.calib_flag);
        out.extend_from_slice(&pad_string(&self.site, 5)?);
        out.extend_from_slice(&pad_string(&self.channel, 3)?);
        out.extend_from_slice(&pad_string(&self.location, 2)?);
        out.extend_from_slice(&self.data_format.encode());
        out.extend_from_slice(&self.calib_factor.to_be_bytes());
        out.extend_from_slice(&self.calib_period.to_be_bytes());
        out.extend_from_slice(&timestamp::encode(self.time)?);
        out.extend_from_slice(&self.time_length.to_be_bytes());
        out.extend_from_slice(&self.samples.to_be_bytes());
        Self::encode_sized(out, &self.channel_status);
        Self::encode_sized(out, &self.data);
        out.extend_from_slice(&self.subframe_count.to_be_bytes());
        out.extend_from_slice(&self.auth_key_id.to_be_bytes());
        Self::encode_sized(out, &self.auth_value);
        Ok(())
    }

    fn encode_sized(out: &mut Vec<u8>, dat: &[u8]) {
        out.extend_from_slice(&(dat.len() as i32).to_be_bytes());
        let start = out.len();
        out.extend_from_slice(dat);
        out.resize(start + padded_len(dat.len()), 0);
    }

    /// Encoded byte length, padding included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Self::MIN_LEN
            + padded_len(self.channel_status.len())
            + padded_len(self.data.len())
            + padded_len(self.auth_value.len())
    }

    /// Samples per second declared by this subframe.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        f64::from(self.samples) / f64::from(self.time_length) * 1000.0
    }

    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.time + Duration::milliseconds(i64::from(self.time_length))
    }

    /// The 10-char padded `site ++ channel ++ location` entry this subframe
    /// contributes to the header channel string.
    #[must_use]
    pub fn channel_string(&self) -> String {
        format!(
            "{:<5}{:<3}{:<2}",
            self.site, self.channel, self.location
        )
    }
}

/// What to do with a subframe whose per-channel timestamp bytes are corrupt.
///
/// [`Strict`](TimestampPolicy::Strict) fails the whole frame.
/// [`Lenient`](TimestampPolicy::Lenient) drops only the bad subframe, using
/// its declared length to advance, so one bad field does not discard every
/// channel in the frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TimestampPolicy {
    #[default]
    Strict,
    Lenient,
}

/// A decoded data frame body: subframe header plus its channel subframes.
#[derive(Clone, Debug, PartialEq)]
pub struct DataFrame {
    pub header: ChannelSubframeHeader,
    pub subframes: Vec<ChannelSubframe>,
}

impl DataFrame {
    /// Decode a data frame body.
    ///
    /// Iterates the header's declared channel count; each subframe
    /// self-describes its length, so the buffer is walked sequentially with
    /// no separate index. Any decode failure propagates, except a corrupt
    /// per-channel timestamp under [`TimestampPolicy::Lenient`].
    pub fn decode(body: &[u8], policy: TimestampPolicy) -> Result<Self> {
        let mut cur = Cursor::new(body);
        let header = ChannelSubframeHeader::decode(&mut cur)?;

        let mut subframes = Vec::with_capacity(header.num_channels as usize);
        for _ in 0..header.num_channels {
            // Slice the subframe out by its declared length so a lenient skip
            // can advance past a partially-consumed decode.
            let declared = Cursor::new(cur.take(4)?).read_i32()?;
            if declared < 0 {
                return Err(Error::MalformedFrame(format!(
                    "negative channel length {declared}"
                )));
            }
            let dat = cur.take(declared as usize)?;
            let mut full = Vec::with_capacity(4 + dat.len());
            full.extend_from_slice(&declared.to_be_bytes());
            full.extend_from_slice(dat);

            let mut sub = Cursor::new(&full);
            match ChannelSubframe::decode(&mut sub) {
                Ok(subframe) => {
                    if sub.remaining() != 0 {
                        return Err(Error::MalformedFrame(format!(
                            "channel length {declared} leaves {} undeclared bytes",
                            sub.remaining()
                        )));
                    }
                    subframes.push(subframe);
                }
                Err(Error::BadTimestamp(raw)) if policy == TimestampPolicy::Lenient => {
                    debug!(timestamp = %raw, "dropping subframe with corrupt timestamp");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(DataFrame { header, subframes })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.header.encode(&mut out)?;
        for subframe in &self.subframes {
            subframe.encode(&mut out)?;
        }
        Ok(out)
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.header.encoded_len()
            + self
                .subframes
                .iter()
                .map(|s| s.encoded_len())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nominal_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 12, 6, 17, 15, 0).unwrap()
    }

    fn subframe_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 12, 1, 17, 15, 0).unwrap() + Duration::milliseconds(123)
    }

    pub(super) fn test_subframe() -> ChannelSubframe {
        ChannelSubframe {
            channel_length: 96,
            auth_offset: 128,
            auth_flag: 0,
            compression: CompressionFormat::CanadianAfterSignature,
            sensor_type: SensorType::Hydroacoustic,
            calib_flag: 0,
            site: "STA12".to_owned(),
            channel: "SHZ".to_owned(),
            location: "01".to_owned(),
            data_format: DataFormat::S4,
            calib_factor: 0.0,
            calib_period: 0.0,
            time: subframe_time(),
            time_length: 10000,
            samples: 8,
            channel_status: vec![0; 4],
            data: (0..8).collect(),
            subframe_count: 0,
            auth_key_id: 123,
            auth_value: 1_512_076_158_000u64.to_be_bytes().to_vec(),
        }
    }

    pub(super) fn test_frame() -> DataFrame {
        DataFrame {
            header: ChannelSubframeHeader {
                num_channels: 1,
                frame_time_length: 10000,
                nominal_time: nominal_time(),
                channel_string: "STA12SHZ01".to_owned(),
            },
            subframes: vec![test_subframe()],
        }
    }

    #[test]
    fn subframe_header_round_trip() {
        let frame = test_frame();
        let mut dat = Vec::new();
        frame.header.encode(&mut dat).unwrap();
        assert_eq!(dat.len(), 44); // 32 fixed + 10 channel string + 2 pad
        assert_eq!(dat.len(), frame.header.encoded_len());

        let decoded = ChannelSubframeHeader::decode(&mut Cursor::new(&dat)).unwrap();
        assert_eq!(decoded, frame.header);
        let mut out = Vec::new();
        decoded.encode(&mut out).unwrap();
        assert_eq!(out, dat);
    }

    #[test]
    fn subframe_header_count_mismatch_fails() {
        let frame = test_frame();
        let mut dat = Vec::new();
        frame.header.encode(&mut dat).unwrap();

        // Declare 50 bytes of channel string against a 12-byte remainder.
        dat[28..32].copy_from_slice(&50i32.to_be_bytes());
        let err = ChannelSubframeHeader::decode(&mut Cursor::new(&dat)).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)), "got {err:?}");
    }

    #[test]
    fn subframe_header_rejects_nonpositive_counts() {
        let frame = test_frame();
        let mut dat = Vec::new();
        frame.header.encode(&mut dat).unwrap();

        let mut zero_channels = dat.clone();
        zero_channels[0..4].copy_from_slice(&0i32.to_be_bytes());
        assert!(ChannelSubframeHeader::decode(&mut Cursor::new(&zero_channels)).is_err());

        let mut zero_span = dat;
        zero_span[4..8].copy_from_slice(&0i32.to_be_bytes());
        assert!(ChannelSubframeHeader::decode(&mut Cursor::new(&zero_span)).is_err());
    }

    #[test]
    fn subframe_round_trip() {
        let subframe = test_subframe();
        let mut dat = Vec::new();
        subframe.encode(&mut dat).unwrap();
        assert_eq!(dat.len(), 100);
        assert_eq!(dat.len(), subframe.encoded_len());
        assert_eq!(subframe.channel_length as usize, dat.len() - 4);

        let decoded = ChannelSubframe::decode(&mut Cursor::new(&dat)).unwrap();
        assert_eq!(decoded, subframe);
        let mut out = Vec::new();
        decoded.encode(&mut out).unwrap();
        assert_eq!(out, dat);
    }

    #[test]
    fn subframe_calibration_survives_round_trip() {
        let mut subframe = test_subframe();
        subframe.calib_factor = 1.234_567_5;
        subframe.calib_period = 0.062_5;
        let mut dat = Vec::new();
        subframe.encode(&mut dat).unwrap();
        let decoded = ChannelSubframe::decode(&mut Cursor::new(&dat)).unwrap();
        let df = f64::from(decoded.calib_factor) - f64::from(subframe.calib_factor);
        let dp = f64::from(decoded.calib_period) - f64::from(subframe.calib_period);
        assert!(df.abs() <= 1e-8);
        assert!(dp.abs() <= 1e-8);
    }

    #[test]
    fn subframe_rejects_unknown_codes() {
        let mut dat = Vec::new();
        test_subframe().encode(&mut dat).unwrap();

        let mut bad = dat.clone();
        bad[9] = 77; // compression code
        assert!(matches!(
            ChannelSubframe::decode(&mut Cursor::new(&bad)),
            Err(Error::UnknownCompressionFormat(77))
        ));

        let mut bad = dat.clone();
        bad[10] = 9; // sensor code
        assert!(matches!(
            ChannelSubframe::decode(&mut Cursor::new(&bad)),
            Err(Error::UnknownSensorType(9))
        ));

        let mut bad = dat;
        bad[22..24].copy_from_slice(b"zz"); // data format
        assert!(matches!(
            ChannelSubframe::decode(&mut Cursor::new(&bad)),
            Err(Error::UnknownDataFormat(_))
        ));
    }

    #[test]
    fn subframe_derived_values() {
        let subframe = test_subframe();
        assert!((subframe.sample_rate() - 0.8).abs() < f64::EPSILON);
        assert_eq!(
            subframe.end_time(),
            subframe.time + Duration::milliseconds(10000)
        );
        assert_eq!(subframe.channel_string(), "STA12SHZ01");
    }

    #[test]
    fn data_frame_round_trip_two_channels() {
        let mut frame = test_frame();
        frame.header.num_channels = 2;
        frame.header.channel_string = "STA12SHZ01STA12SHZ01".to_owned();
        frame.subframes.push(test_subframe());

        let dat = frame.encode().unwrap();
        assert_eq!(dat.len(), 52 + 2 * 100);

        let decoded = DataFrame::decode(&dat, TimestampPolicy::Strict).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.encode().unwrap(), dat);
    }

    #[test]
    fn subframe_length_slack_is_rejected() {
        let frame = test_frame();
        let mut dat = frame.encode().unwrap();
        // Inflate the declared channel length and append matching slack; the
        // sized fields leave those bytes unaccounted for.
        dat[44..48].copy_from_slice(&100i32.to_be_bytes());
        dat.extend_from_slice(&[0u8; 4]);

        let err = DataFrame::decode(&dat, TimestampPolicy::Strict).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)), "got {err:?}");
    }

    #[test]
    fn corrupt_subframe_timestamp_strict_fails() {
        let frame = test_frame();
        let mut dat = frame.encode().unwrap();
        // minute digit of the first subframe timestamp, 44 header + 4+4+24
        dat[44 + 32 + 12] = b'k';
        assert!(matches!(
            DataFrame::decode(&dat, TimestampPolicy::Strict),
            Err(Error::BadTimestamp(_))
        ));
    }

    #[test]
    fn corrupt_subframe_timestamp_lenient_keeps_the_rest() {
        let mut frame = test_frame();
        frame.header.num_channels = 2;
        frame.header.channel_string = "STA12SHZ01STA12SHZ01".to_owned();
        frame.subframes.push(test_subframe());

        let mut dat = frame.encode().unwrap();
        // corrupt the first subframe's timestamp, 52-byte header this time
        dat[52 + 32 + 12] = b'k';

        let decoded = DataFrame::decode(&dat, TimestampPolicy::Lenient).unwrap();
        assert_eq!(decoded.header.num_channels, 2);
        assert_eq!(decoded.subframes.len(), 1, "bad subframe dropped");
        assert_eq!(decoded.subframes[0], test_subframe());
    }
}
