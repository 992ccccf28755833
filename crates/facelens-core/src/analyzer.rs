//! Per-frame analysis loop.
//!
//! Frames are pulled from a [`FrameSource`], thinned by the
//! [`SamplingGate`], sent through the [`LandmarkEngine`] and classified by
//! face count. Exactly one [`FrameAnalysisResult`] is appended to the
//! [`ResultLog`] per analyzed frame; skipped frames leave no trace.
//!
//! # Lifecycle
//!
//! A [`FrameAnalyzer`] starts Idle. [`FrameAnalyzer::start`] moves it to
//! Active; [`SessionControl::stop`] moves it back to Idle. Stop is
//! cooperative: it is checked before each frame is pulled and again when the
//! frame arrives, so a frame delivered after a stop is discarded, while a
//! frame that is already being analyzed completes and its result is still
//! appended.

use std::collections::BTreeMap;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blendshapes::BlendshapeFilter;
use crate::brightness::BrightnessSurface;
use crate::config::{AnalyzerConfig, ConfigError};
use crate::engine::{Delegate, EngineError, LandmarkEngine};
use crate::geometry::{area_ratios, FacePartsRatios, GeometryError};
use crate::sampling::{SamplingError, SamplingGate};
use crate::source::FrameSource;
use crate::topology::{FaceTopology, TopologyError};
use crate::types::{Category, Detection, Landmark, VideoFrame};

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("sampling error: {0}")]
    Sampling(#[from] SamplingError),
    #[error("face topology does not match the engine: {0}")]
    Topology(#[from] TopologyError),
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

// ── Results ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnhealthyReason {
    NoFaceDetected,
    MoreThanOneFaceDetected,
}

/// Measurements taken on a frame with exactly one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetrics {
    pub blendshapes: BTreeMap<String, f64>,
    pub face_parts_ratios: FacePartsRatios,
    /// Mean luminance in `[0, 255]`; 0 when brightness was not measured.
    pub light_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "health", rename_all = "camelCase")]
pub enum FrameOutcome {
    Healthy(FrameMetrics),
    Unhealthy { reason: UnhealthyReason },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysisResult {
    /// Capture time of the analyzed frame, in milliseconds.
    pub analyze_time: i64,
    pub result: FrameOutcome,
}

impl FrameAnalysisResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self.result, FrameOutcome::Healthy(_))
    }

    pub fn metrics(&self) -> Option<&FrameMetrics> {
        match &self.result {
            FrameOutcome::Healthy(metrics) => Some(metrics),
            FrameOutcome::Unhealthy { .. } => None,
        }
    }

    pub fn unhealthy_reason(&self) -> Option<UnhealthyReason> {
        match &self.result {
            FrameOutcome::Healthy(_) => None,
            FrameOutcome::Unhealthy { reason } => Some(*reason),
        }
    }
}

/// Face count of one inference output, decided by a single match on the
/// number of landmark sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaceCount<'a> {
    None,
    Single(&'a [Landmark]),
    Multiple(usize),
}

impl<'a> FaceCount<'a> {
    pub fn of(detection: &'a Detection) -> Self {
        match detection.faces.as_slice() {
            [] => FaceCount::None,
            [face] => FaceCount::Single(face),
            faces => FaceCount::Multiple(faces.len()),
        }
    }
}

// ── Result log ────────────────────────────────────────────────────────────────

/// Receives every result as it is appended to a [`ResultLog`].
pub trait ResultObserver: Send {
    fn on_result(&mut self, result: &FrameAnalysisResult);
}

impl<F> ResultObserver for F
where
    F: FnMut(&FrameAnalysisResult) + Send,
{
    fn on_result(&mut self, result: &FrameAnalysisResult) {
        self(result)
    }
}

/// Append-only record of a session's results, in analysis order.
#[derive(Default)]
pub struct ResultLog {
    entries: Vec<FrameAnalysisResult>,
    observers: Vec<Box<dyn ResultObserver>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl ResultObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn append(&mut self, result: FrameAnalysisResult) -> &FrameAnalysisResult {
        for observer in &mut self.observers {
            observer.on_result(&result);
        }
        self.entries.push(result);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[FrameAnalysisResult] {
        &self.entries
    }

    pub fn last(&self) -> Option<&FrameAnalysisResult> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries. Observers stay subscribed.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for ResultLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultLog")
            .field("entries", &self.entries.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

// ── Session control ───────────────────────────────────────────────────────────

/// Clone-safe start/stop switch for one analysis session.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    active: Arc<AtomicBool>,
}

impl SessionControl {
    pub fn start(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    /// Request a stop. Takes effect before the next frame is analyzed.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Counters kept over the lifetime of an analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub frames_seen: u64,
    pub frames_skipped: u64,
    pub frames_analyzed: u64,
    pub healthy: u64,
    pub no_face: u64,
    pub multiple_faces: u64,
    /// Times the single-face metrics (geometry, blendshapes, brightness) ran.
    pub metrics_computed: u64,
    pub non_finite_ratios: u64,
    pub inference_failures: u64,
}

// ── Analyzer ──────────────────────────────────────────────────────────────────

pub struct FrameAnalyzer<E> {
    engine: E,
    gate: SamplingGate,
    topology: FaceTopology,
    blendshapes: BlendshapeFilter,
    brightness: Option<BrightnessSurface>,
    default_stream_frame_rate: f64,
    log: ResultLog,
    control: SessionControl,
    stats: AnalysisStats,
}

impl<E: LandmarkEngine> FrameAnalyzer<E> {
    /// Build an analyzer over the MediaPipe Face Mesh topology.
    pub fn new(
        engine: E,
        config: &AnalyzerConfig,
        stream_frame_rate: Option<f64>,
    ) -> Result<Self, AnalyzerError> {
        Self::with_topology(engine, config, stream_frame_rate, FaceTopology::MEDIAPIPE)
    }

    /// Build an analyzer with custom index groups.
    ///
    /// Fails if the configuration is invalid or any index group reaches past
    /// the landmarks the engine produces.
    pub fn with_topology(
        engine: E,
        config: &AnalyzerConfig,
        stream_frame_rate: Option<f64>,
        topology: FaceTopology,
    ) -> Result<Self, AnalyzerError> {
        config.validate()?;
        topology.validate(engine.landmark_count())?;

        if config.engine.delegate == Delegate::Cpu || engine.delegate() == Delegate::Cpu {
            tracing::warn!("landmark engine running on CPU, analysis will be markedly slower");
        }

        let gate = SamplingGate::new(
            config.sampling_frame_rate,
            Some(stream_frame_rate.unwrap_or(config.default_stream_frame_rate)),
        )?;
        tracing::debug!(
            sampling_fps = gate.sampling_frame_rate(),
            stream_fps = gate.stream_frame_rate(),
            stride = gate.stride(),
            "analyzer configured"
        );

        Ok(Self {
            engine,
            gate,
            topology,
            blendshapes: BlendshapeFilter::new(config.reported_blendshape_keys.iter().cloned()),
            brightness: config.brightness,
            default_stream_frame_rate: config.default_stream_frame_rate,
            log: ResultLog::new(),
            control: SessionControl::default(),
            stats: AnalysisStats::default(),
        })
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn is_active(&self) -> bool {
        self.control.is_active()
    }

    pub fn results(&self) -> &ResultLog {
        &self.log
    }

    /// Session reset: forget all results so far.
    pub fn reset_results(&mut self) {
        self.log.clear();
    }

    pub fn subscribe(&mut self, observer: impl ResultObserver + 'static) {
        self.log.subscribe(observer);
    }

    pub fn stats(&self) -> AnalysisStats {
        self.stats
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Adopt a new stream frame rate; restarts the gate's accumulator.
    pub fn reconfigure_stream_rate(&mut self, stream_frame_rate: Option<f64>) {
        self.gate
            .reconfigure(Some(stream_frame_rate.unwrap_or(self.default_stream_frame_rate)));
        tracing::debug!(
            stream_fps = self.gate.stream_frame_rate(),
            stride = self.gate.stride(),
            "sampling gate reconfigured"
        );
    }

    /// Run one frame through the gate and, if selected, the full analysis.
    ///
    /// Returns the appended result, or `None` for a skipped frame or a frame
    /// whose inference call failed. Only an unavailable engine or a geometry
    /// configuration error is returned as `Err`.
    pub fn process_frame(
        &mut self,
        frame: &VideoFrame,
    ) -> Result<Option<&FrameAnalysisResult>, AnalyzerError> {
        self.stats.frames_seen += 1;
        if !self.gate.should_process() {
            self.stats.frames_skipped += 1;
            return Ok(None);
        }

        let detection = match self.engine.detect(frame, frame.timestamp_ms) {
            Ok(detection) => detection,
            Err(EngineError::Inference { frame: index, message }) => {
                self.stats.inference_failures += 1;
                tracing::warn!(frame = index, error = %message, "inference failed, frame dropped");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = self.evaluate(frame, &detection)?;
        self.stats.frames_analyzed += 1;
        tracing::trace!(frame = frame.index, outcome = ?outcome, "frame analyzed");

        let result = FrameAnalysisResult {
            analyze_time: frame.timestamp_ms,
            result: outcome,
        };
        Ok(Some(self.log.append(result)))
    }

    fn evaluate(
        &mut self,
        frame: &VideoFrame,
        detection: &Detection,
    ) -> Result<FrameOutcome, AnalyzerError> {
        match FaceCount::of(detection) {
            FaceCount::None => {
                self.stats.no_face += 1;
                Ok(FrameOutcome::Unhealthy {
                    reason: UnhealthyReason::NoFaceDetected,
                })
            }
            FaceCount::Multiple(count) => {
                self.stats.multiple_faces += 1;
                tracing::debug!(frame = frame.index, faces = count, "more than one face");
                Ok(FrameOutcome::Unhealthy {
                    reason: UnhealthyReason::MoreThanOneFaceDetected,
                })
            }
            FaceCount::Single(face) => {
                let metrics = self.measure(frame, face, detection.first_face_blendshapes())?;
                self.stats.healthy += 1;
                Ok(FrameOutcome::Healthy(metrics))
            }
        }
    }

    fn measure(
        &mut self,
        frame: &VideoFrame,
        face: &[Landmark],
        categories: &[Category],
    ) -> Result<FrameMetrics, GeometryError> {
        self.stats.metrics_computed += 1;

        let light_average = match (&self.brightness, &frame.image) {
            (Some(surface), Some(image)) => surface.measure(image),
            _ => 0.0,
        };

        let face_parts_ratios = area_ratios(face, &self.topology)?;
        if !face_parts_ratios.is_finite() {
            self.stats.non_finite_ratios += 1;
            tracing::debug!(frame = frame.index, "face oval area is zero, ratios are not finite");
        }

        Ok(FrameMetrics {
            blendshapes: self.blendshapes.extract(categories),
            face_parts_ratios,
            light_average,
        })
    }

    /// Idle → Active. Frames are only pulled while the session is active.
    pub fn start(&mut self) {
        self.control.start();
    }

    /// Lazy stream of results pulled from `source` while the session is active.
    ///
    /// The stream ends when a stop is observed, the source runs dry, or a
    /// session-fatal error has been yielded. It cannot be restarted; call
    /// [`start`](Self::start) and `stream` again for a new run over the same
    /// analyzer. Gate state carries over unless the source reports a
    /// different frame rate.
    pub fn stream<'a, S: FrameSource>(&'a mut self, source: &'a mut S) -> AnalysisStream<'a, E, S> {
        if let Some(rate) = source.frame_rate() {
            if rate != self.gate.stream_frame_rate() {
                self.reconfigure_stream_rate(Some(rate));
            }
        }
        AnalysisStream {
            analyzer: self,
            source,
            finished: false,
        }
    }

    /// Start the session and drive it until it is stopped or the source ends.
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> Result<AnalysisStats, AnalyzerError> {
        self.start();
        self.drain(source)
    }

    /// Drive an already started session until it is stopped or the source ends.
    pub fn drain<S: FrameSource>(&mut self, source: &mut S) -> Result<AnalysisStats, AnalyzerError> {
        tracing::info!(
            sampling_fps = self.gate.sampling_frame_rate(),
            active = self.control.is_active(),
            "analysis session started"
        );
        for item in self.stream(source) {
            item?;
        }
        let stats = self.stats;
        tracing::info!(
            frames = stats.frames_seen,
            analyzed = stats.frames_analyzed,
            healthy = stats.healthy,
            no_face = stats.no_face,
            multiple_faces = stats.multiple_faces,
            "analysis session stopped"
        );
        Ok(stats)
    }
}

/// Lazy, non-restartable sequence of results, one per analyzed frame.
pub struct AnalysisStream<'a, E, S> {
    analyzer: &'a mut FrameAnalyzer<E>,
    source: &'a mut S,
    finished: bool,
}

impl<E: LandmarkEngine, S: FrameSource> AnalysisStream<'_, E, S> {
    fn finish(&mut self) {
        self.finished = true;
        self.analyzer.control.stop();
    }
}

impl<E: LandmarkEngine, S: FrameSource> Iterator for AnalysisStream<'_, E, S> {
    type Item = Result<FrameAnalysisResult, AnalyzerError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if !self.analyzer.control.is_active() {
                tracing::debug!("stop observed");
                self.finished = true;
                break;
            }
            let Some(frame) = self.source.next_frame() else {
                tracing::debug!("frame source ended");
                self.finish();
                break;
            };
            // Stop may land while the source is blocked on the next frame
            if !self.analyzer.control.is_active() {
                tracing::debug!(frame = frame.index, "stop observed, frame discarded");
                self.finished = true;
                break;
            }
            match self.analyzer.process_frame(&frame) {
                Ok(Some(result)) => return Some(Ok(result.clone())),
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "analysis session aborted");
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl<E: LandmarkEngine, S: FrameSource> FusedIterator for AnalysisStream<'_, E, S> {}
