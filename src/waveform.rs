//! Channel cache and waveform extraction.
//!
//! Decoded data frames are resolved against the receiver's configured
//! channels and turned into channel-attributed waveform records. Sample
//! payload decoding is a downstream concern keyed by the record's format tag.
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::frame::data::{CompressionFormat, DataFormat, DataFrame};
use crate::{Error, Result};

/// A resolved channel descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
}

/// Batch resolution of configured channel names against an external source of
/// channel reference data.
pub trait ChannelRepository {
    fn retrieve_channels(&self, names: &[String]) -> Result<Vec<Channel>>;
}

/// Receiver-side channel configuration for one station.
#[derive(Clone, Debug, TypedBuilder)]
pub struct ReceiverConfig {
    #[builder(setter(into))]
    pub station: String,
    /// Every channel name this receiver should resolve at startup.
    pub channel_names: Vec<String>,
    /// Maps raw wire `station.site.channel` codes to configured names. Raw
    /// codes absent here are simply not configured.
    pub name_map: HashMap<String, String>,
    /// Gap retention in days; zero or below disables expiration.
    #[builder(default = -1)]
    pub gap_retention_days: i64,
}

impl ReceiverConfig {
    #[must_use]
    pub fn channel_name(&self, raw: &str) -> Option<&str> {
        self.name_map.get(raw).map(String::as_str)
    }
}

/// One channel's worth of waveform data extracted from a data frame.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformRecord {
    pub channel: Channel,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub samples: i32,
    /// Samples per second, derived from the subframe time span and count.
    pub sample_rate: f64,
    pub data_format: DataFormat,
    pub compression: CompressionFormat,
    /// Raw sample bytes; decoding by format tag is pluggable and external.
    pub data: Vec<u8>,
}

/// Turns decoded data frames into [`WaveformRecord`]s using a warm channel
/// cache.
///
/// The cache is rebuilt wholesale by [`Self::update_channel_cache`]; readers
/// always observe either the fully-old or fully-new mapping, never a mix.
pub struct WaveformParser<R> {
    config: ReceiverConfig,
    repository: R,
    cache: RwLock<Arc<HashMap<String, Channel>>>,
}

impl<R: ChannelRepository> WaveformParser<R> {
    pub fn new(config: ReceiverConfig, repository: R) -> Self {
        WaveformParser {
            config,
            repository,
            cache: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Resolves the full configured channel-name set in one batch call and
    /// replaces the cache.
    ///
    /// # Errors
    /// [`Error::MissingChannels`] naming every configured channel the
    /// repository failed to resolve. This is a fatal startup condition, not
    /// retried here.
    pub fn update_channel_cache(&self) -> Result<()> {
        let names = &self.config.channel_names;
        let resolved: HashMap<String, Channel> = self
            .repository
            .retrieve_channels(names)?
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        let mut missing: Vec<String> = names
            .iter()
            .filter(|name| !resolved.contains_key(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(Error::MissingChannels(missing));
        }

        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *cache = Arc::new(resolved);
        Ok(())
    }

    /// Produces one record per resolvable channel subframe.
    ///
    /// A subframe whose raw `station.site.channel` code is not configured at
    /// all contributes nothing and is not an error. A code that is configured
    /// but absent from the warm cache fails with
    /// [`Error::NoMatchingChannel`]: the cache is stale or was never built,
    /// which is a consistency problem rather than routine unconfigured data.
    pub fn parse_waveform(&self, frame: &DataFrame) -> Result<Vec<WaveformRecord>> {
        let cache = Arc::clone(
            &self
                .cache
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut records = Vec::with_capacity(frame.subframes.len());
        for subframe in &frame.subframes {
            let raw = format!(
                "{}.{}.{}",
                self.config.station, subframe.site, subframe.channel
            );
            let Some(name) = self.config.channel_name(&raw) else {
                debug!(raw = %raw, "channel not configured, skipping subframe");
                continue;
            };
            let channel = cache
                .get(name)
                .ok_or_else(|| Error::NoMatchingChannel(name.to_owned()))?
                .clone();
            records.push(WaveformRecord {
                channel,
                start: subframe.time,
                end: subframe.end_time(),
                samples: subframe.samples,
                sample_rate: subframe.sample_rate(),
                data_format: subframe.data_format,
                compression: subframe.compression,
                data: subframe.data.clone(),
            });
        }
        Ok(records)
    }
}
