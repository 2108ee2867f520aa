//! Channel schema, feature vectors, min-max normalization and sequence windowing.

mod normalizer;
mod window;

pub use normalizer::{NormalizationState, Normalizer};
pub use window::{
    create_training_windows, latest_window, pad_repeat_last, split_windows, DatasetSplit,
    SequenceWindow,
};

use crate::error::{EngineError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Sensor channels a wearable can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    HeartRate,
    Steps,
    Sleep,
    Temperature,
    Activity,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::HeartRate,
        Channel::Steps,
        Channel::Sleep,
        Channel::Temperature,
        Channel::Activity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::HeartRate => "heart_rate",
            Channel::Steps => "steps",
            Channel::Sleep => "sleep",
            Channel::Temperature => "temperature",
            Channel::Activity => "activity",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EngineError::UnknownChannel(s.to_string()))
    }
}

/// Ordered channel list fixed for the lifetime of a trained model.
///
/// Column `i` of every row, window and normalization state refers to `channels()[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Channel>", into = "Vec<Channel>")]
pub struct FeatureSchema {
    channels: Vec<Channel>,
}

impl FeatureSchema {
    pub fn new(channels: Vec<Channel>) -> Result<Self> {
        if channels.is_empty() {
            return Err(EngineError::Configuration(
                "feature schema must declare at least one channel".into(),
            ));
        }
        for (i, c) in channels.iter().enumerate() {
            if channels[..i].contains(c) {
                return Err(EngineError::Configuration(format!(
                    "channel `{}` declared twice",
                    c
                )));
            }
        }
        Ok(Self { channels })
    }

    /// Parse declared channel names, rejecting anything outside the known set.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let channels = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<Channel>>>()?;
        Self::new(channels)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.channels.iter().map(Channel::as_str).collect()
    }

    pub fn index_of(&self, channel: Channel) -> Option<usize> {
        self.channels.iter().position(|c| *c == channel)
    }

    /// Build a vector from name/value pairs. Unknown, repeated and absent channels are errors.
    pub fn vector_from_pairs<'a, I>(&self, pairs: I) -> Result<FeatureVector>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut slots: Vec<Option<f64>> = vec![None; self.len()];
        for (name, value) in pairs {
            let channel: Channel = name.parse()?;
            let idx = self
                .index_of(channel)
                .ok_or_else(|| EngineError::UnknownChannel(name.to_string()))?;
            if slots[idx].replace(value).is_some() {
                return Err(EngineError::Configuration(format!(
                    "channel `{}` given more than once in one record",
                    name
                )));
            }
        }
        let values = slots
            .into_iter()
            .zip(&self.channels)
            .map(|(v, c)| v.ok_or_else(|| EngineError::MissingChannel(c.to_string())))
            .collect::<Result<Vec<f64>>>()?;
        Ok(FeatureVector { values })
    }

    pub fn vector_from_map(&self, record: &HashMap<String, f64>) -> Result<FeatureVector> {
        self.vector_from_pairs(record.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Stack vectors into a `[rows, channels]` matrix.
    pub fn stack(&self, vectors: &[FeatureVector]) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((vectors.len(), self.len()));
        for (i, v) in vectors.iter().enumerate() {
            if v.values.len() != self.len() {
                return Err(EngineError::shape("feature vector", self.len(), v.values.len()));
            }
            out.row_mut(i)
                .iter_mut()
                .zip(&v.values)
                .for_each(|(dst, src)| *dst = *src);
        }
        Ok(out)
    }
}

impl TryFrom<Vec<Channel>> for FeatureSchema {
    type Error = EngineError;

    fn try_from(channels: Vec<Channel>) -> Result<Self> {
        FeatureSchema::new(channels)
    }
}

impl From<FeatureSchema> for Vec<Channel> {
    fn from(schema: FeatureSchema) -> Self {
        schema.channels
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            channels: Channel::ALL.to_vec(),
        }
    }
}

/// One reading per schema channel, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

