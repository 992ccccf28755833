//! facelens-core — Frame-analysis pipeline over facial landmark inference.
//!
//! Thins a live video stream down to an analysis rate, classifies each
//! analyzed frame by face count, and derives eye/lip area ratios, filtered
//! blendshape scores and ambient brightness for single-face frames.
//! Detection itself is delegated to a [`LandmarkEngine`].

pub mod analyzer;
pub mod blendshapes;
pub mod brightness;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod sampling;
pub mod source;
pub mod topology;
pub mod types;

pub use analyzer::{
    AnalysisStats, AnalyzerError, FaceCount, FrameAnalysisResult, FrameAnalyzer, FrameMetrics,
    FrameOutcome, ResultLog, ResultObserver, SessionControl, UnhealthyReason,
};
pub use config::{AnalyzerConfig, ConfigError};
pub use engine::{Delegate, EngineError, EngineOptions, LandmarkEngine};
pub use geometry::FacePartsRatios;
pub use source::FrameSource;
pub use topology::FaceTopology;
pub use types::{Category, Detection, Landmark, VideoFrame};
