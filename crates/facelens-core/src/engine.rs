//! Boundary to the landmark inference engine.
//!
//! The engine is a black box: given a frame and a timestamp it returns zero
//! or more landmark sets plus optional blendshapes. This crate never
//! detects faces itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::types::{Detection, VideoFrame};

#[derive(Error, Debug)]
pub enum EngineError {
    /// Model or accelerator could not be brought up. Session-fatal.
    #[error("landmark engine unavailable: {0}")]
    Unavailable(String),
    /// A single inference call failed.
    #[error("inference failed on frame {frame}: {message}")]
    Inference { frame: u64, message: String },
}

/// Where the engine runs its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    #[default]
    Gpu,
    /// Software fallback. Works, but markedly slower.
    Cpu,
}

/// Settings an engine is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub max_faces: usize,
    pub min_face_detection_confidence: f32,
    pub min_face_presence_confidence: f32,
    pub min_tracking_confidence: f32,
    pub delegate: Delegate,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_faces: 4,
            min_face_detection_confidence: 0.5,
            min_face_presence_confidence: 0.5,
            min_tracking_confidence: 0.5,
            delegate: Delegate::Gpu,
        }
    }
}

impl EngineOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_faces == 0 {
            return Err(ConfigError::InvalidMaxFaces);
        }
        for (name, value) in [
            ("min_face_detection_confidence", self.min_face_detection_confidence),
            ("min_face_presence_confidence", self.min_face_presence_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ConfidenceOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// A facial landmark inference engine.
///
/// Calls are blocking from the caller's point of view; the analyzer never
/// issues a second `detect` before the first returns.
pub trait LandmarkEngine {
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: i64) -> Result<Detection, EngineError>;

    /// Number of landmarks in every face set this engine returns.
    fn landmark_count(&self) -> usize;

    fn delegate(&self) -> Delegate {
        Delegate::Gpu
    }
}

impl<E: LandmarkEngine + ?Sized> LandmarkEngine for Box<E> {
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: i64) -> Result<Detection, EngineError> {
        (**self).detect(frame, timestamp_ms)
    }

    fn landmark_count(&self) -> usize {
        (**self).landmark_count()
    }

    fn delegate(&self) -> Delegate {
        (**self).delegate()
    }
}
