//! Per-channel breakdown of reconstruction error, for explaining a detection.
//!
//! Each channel's error is averaged over the time axis only, unlike the detection error which
//! averages over time and channels jointly.

use crate::error::{EngineError, Result};
use crate::features::{Channel, FeatureSchema};
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Number of channels reported as most anomalous.
pub const TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelError {
    pub channel: Channel,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    /// Every channel, in declared schema order.
    pub feature_scores: Vec<ChannelError>,
    /// Highest-error channels first; ties keep declared order.
    pub top_anomalous_features: Vec<ChannelError>,
}

impl FeatureAttribution {
    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.feature_scores
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| c.error)
    }

    pub fn most_anomalous(&self) -> Option<Channel> {
        self.top_anomalous_features.first().map(|c| c.channel)
    }
}

/// `attribute(window, reconstructed, feature_names)` with the default top-k.
pub fn attribute(
    window: ArrayView2<'_, f64>,
    reconstructed: ArrayView2<'_, f64>,
    schema: &FeatureSchema,
) -> Result<FeatureAttribution> {
    attribute_top_k(window, reconstructed, schema, TOP_K)
}

pub fn attribute_top_k(
    window: ArrayView2<'_, f64>,
    reconstructed: ArrayView2<'_, f64>,
    schema: &FeatureSchema,
    k: usize,
) -> Result<FeatureAttribution> {
    if window.dim() != reconstructed.dim() {
        return Err(EngineError::shape(
            "attribution reconstruction",
            format!("{:?}", window.dim()),
            format!("{:?}", reconstructed.dim()),
        ));
    }
    if window.ncols() != schema.len() {
        return Err(EngineError::shape("attribution channels", schema.len(), window.ncols()));
    }
    if window.nrows() == 0 {
        return Err(EngineError::shape("attribution window length", ">= 1", 0));
    }

    let squared = (&window - &reconstructed).mapv(|d| d * d);
    let per_channel = squared
        .mean_axis(Axis(0))
        .ok_or_else(|| EngineError::shape("attribution window length", ">= 1", 0))?;

    let feature_scores: Vec<ChannelError> = schema
        .channels()
        .iter()
        .zip(per_channel.iter())
        .map(|(&channel, &error)| ChannelError { channel, error })
        .collect();

    // Stable sort: equal errors stay in declared order.
    let mut ranked = feature_scores.clone();
    ranked.sort_by(|a, b| b.error.total_cmp(&a.error));
    ranked.truncate(k);

    Ok(FeatureAttribution {
        feature_scores,
        top_anomalous_features: ranked,
    })
}
