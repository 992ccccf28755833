use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blendshapes::DEFAULT_REPORTED_KEYS;
use crate::brightness::BrightnessSurface;
use crate::engine::EngineOptions;
use crate::sampling::{DEFAULT_SAMPLING_FRAME_RATE, DEFAULT_STREAM_FRAME_RATE};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid sampling frame rate: {0} (must be a positive number)")]
    InvalidSamplingRate(f64),
    #[error("max_faces must be at least 1")]
    InvalidMaxFaces,
    #[error("{name} must be within [0, 1], got {value}")]
    ConfidenceOutOfRange { name: &'static str, value: f32 },
    #[error("brightness surface must be non-empty, got {width}x{height}")]
    EmptyBrightnessSurface { width: u32, height: u32 },
}

/// Options recognized by the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Target analyses per second.
    pub sampling_frame_rate: f64,
    /// Stream rate assumed when the video source does not report one.
    pub default_stream_frame_rate: f64,
    /// Blendshape categories copied into healthy results.
    pub reported_blendshape_keys: Vec<String>,
    #[serde(flatten)]
    pub engine: EngineOptions,
    /// Render target for brightness. `None` skips brightness and reports 0.
    /// Written as `brightness = "off"` or a `{ width, height }` table.
    #[serde(with = "brightness_setting")]
    pub brightness: Option<BrightnessSurface>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sampling_frame_rate: DEFAULT_SAMPLING_FRAME_RATE,
            default_stream_frame_rate: DEFAULT_STREAM_FRAME_RATE,
            reported_blendshape_keys: DEFAULT_REPORTED_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            engine: EngineOptions::default(),
            brightness: Some(BrightnessSurface::default()),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sampling_frame_rate.is_finite() || self.sampling_frame_rate <= 0.0 {
            return Err(ConfigError::InvalidSamplingRate(self.sampling_frame_rate));
        }
        if let Some(surface) = &self.brightness {
            if surface.width == 0 || surface.height == 0 {
                return Err(ConfigError::EmptyBrightnessSurface {
                    width: surface.width,
                    height: surface.height,
                });
            }
        }
        self.engine.validate()
    }
}

mod brightness_setting {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::brightness::BrightnessSurface;

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Off {
        Off,
    }

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Setting {
        Off(Off),
        Surface(BrightnessSurface),
    }

    pub fn serialize<S: Serializer>(
        value: &Option<BrightnessSurface>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(surface) => Setting::Surface(*surface),
            None => Setting::Off(Off::Off),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BrightnessSurface>, D::Error> {
        Ok(match Setting::deserialize(deserializer)? {
            Setting::Off(_) => None,
            Setting::Surface(surface) => Some(surface),
        })
    }
}
