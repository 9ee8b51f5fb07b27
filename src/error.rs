#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Not enough bytes: have {actual}, need {minimum}")]
    NotEnoughData { actual: usize, minimum: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A frame field violates the wire layout. Fails the single frame only.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
    #[error("Unknown frame type code: {0}")]
    UnknownFrameType(i32),
    #[error("Unknown compression format code: {0}")]
    UnknownCompressionFormat(u8),
    #[error("Unknown sensor type code: {0}")]
    UnknownSensorType(u8),
    #[error("Unknown data format code: {0:?}")]
    UnknownDataFormat(String),
    #[error("Invalid timestamp {0:?}, expected YYYYDDD HH:MM:SS.MMM")]
    BadTimestamp(String),

    /// Configured channel names the repository could not resolve. Fatal; lists
    /// every missing name, not just the first.
    #[error("Channels missing from repository: {}", .0.join(", "))]
    MissingChannels(Vec<String>),
    /// A raw name mapped to a configured channel that is not in the warm cache.
    #[error("No matching channel for {0}")]
    NoMatchingChannel(String),

    #[error("Gap state persistence failed: {0}")]
    Persistence(String),

    /// The frame read was abandoned via its cancellation predicate before any
    /// bytes of a frame arrived.
    #[error("Read cancelled")]
    Cancelled,
}

impl Error {
    /// True for configuration-consistency failures that should stop processing
    /// for the station, as opposed to per-frame errors where the caller drops
    /// the frame and keeps listening.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingChannels(_) | Error::NoMatchingChannel(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
