//! Replay of recorded landmark inference.
//!
//! A recording is a JSON-lines file with one inference output per video
//! frame, in frame order:
//!
//! ```json
//! {"timestampMs": 1000, "faces": [[{"x": 0.41, "y": 0.33, "z": -0.02}, ...]], "blendshapes": [[{"categoryName": "eyeBlinkLeft", "score": 0.12}, ...]]}
//! ```
//!
//! `timestampMs` and `blendshapes` are optional. Frame images, when a
//! directory is given, are matched to records by sorted file name.

use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use facelens_core::topology::FACE_MESH_LANDMARK_COUNT;
use facelens_core::{Detection, EngineError, FrameSource, LandmarkEngine, VideoFrame};
use serde::Deserialize;
use thiserror::Error;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("recording {0} contains no frames")]
    Empty(PathBuf),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedFrame {
    #[serde(default)]
    timestamp_ms: Option<i64>,
    #[serde(flatten)]
    detection: Detection,
}

/// A parsed recording: one entry per video frame.
#[derive(Debug, Clone)]
pub struct Recording {
    frames: Vec<RecordedFrame>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let file = fs::File::open(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let recording = Self::parse(BufReader::new(file)).map_err(|e| match e {
            ReplayError::Io { source, .. } => ReplayError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        if recording.is_empty() {
            return Err(ReplayError::Empty(path.to_path_buf()));
        }
        tracing::info!(path = %path.display(), frames = recording.len(), "recording loaded");
        Ok(recording)
    }

    /// Parse JSON lines. Blank lines are skipped.
    pub fn parse(reader: impl BufRead) -> Result<Self, ReplayError> {
        let mut frames = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| ReplayError::Io {
                path: PathBuf::new(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: RecordedFrame =
                serde_json::from_str(&line).map_err(|source| ReplayError::Parse {
                    line: i + 1,
                    source,
                })?;
            frames.push(frame);
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into an engine serving the recorded detections and a source
    /// producing the matching frames.
    pub fn into_replay(self, options: ReplayOptions) -> Result<(ReplayEngine, ReplaySource), ReplayError> {
        let images = match &options.frames_dir {
            Some(dir) => list_images(dir)?,
            None => Vec::new(),
        };
        if options.frames_dir.is_some() && images.len() < self.frames.len() {
            tracing::warn!(
                images = images.len(),
                frames = self.frames.len(),
                "fewer images than recorded frames, brightness skipped for the rest"
            );
        }

        let timestamps = self.frames.iter().map(|f| f.timestamp_ms).collect();
        let detections: Vec<Detection> = self.frames.into_iter().map(|f| f.detection).collect();

        let engine = ReplayEngine::new(detections);
        let source = ReplaySource {
            timestamps,
            images: images.into(),
            next_index: 0,
            frame_rate: options.frame_rate,
            realtime: options.realtime,
            last_emit: None,
            clock: ReplayClock::start(),
        };
        Ok((engine, source))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub frames_dir: Option<PathBuf>,
    pub frame_rate: Option<f64>,
    /// Pace frames at `frame_rate` instead of replaying as fast as possible.
    pub realtime: bool,
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, ReplayError> {
    let entries = fs::read_dir(dir).map_err(|source| ReplayError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    tracing::debug!(dir = %dir.display(), count = images.len(), "frame images found");
    Ok(images)
}

/// Serves recorded detections by frame index.
pub struct ReplayEngine {
    detections: Vec<Detection>,
    landmark_count: usize,
}

impl ReplayEngine {
    pub fn new(detections: Vec<Detection>) -> Self {
        // Only single-face frames are measured, so the smallest of those
        // decides what the topology may index.
        let landmark_count = detections
            .iter()
            .filter_map(|d| match d.faces.as_slice() {
                [face] => Some(face.len()),
                _ => None,
            })
            .min()
            .unwrap_or(FACE_MESH_LANDMARK_COUNT);
        Self {
            detections,
            landmark_count,
        }
    }
}

impl LandmarkEngine for ReplayEngine {
    fn detect(&mut self, frame: &VideoFrame, _timestamp_ms: i64) -> Result<Detection, EngineError> {
        usize::try_from(frame.index)
            .ok()
            .and_then(|i| self.detections.get(i))
            .cloned()
            .ok_or_else(|| EngineError::Inference {
                frame: frame.index,
                message: "no recorded detection for frame".to_string(),
            })
    }

    fn landmark_count(&self) -> usize {
        self.landmark_count
    }
}

/// Emits one frame per recorded entry, with pixels when an image matches.
pub struct ReplaySource {
    timestamps: Vec<Option<i64>>,
    images: VecDeque<PathBuf>,
    next_index: usize,
    frame_rate: Option<f64>,
    realtime: bool,
    last_emit: Option<Instant>,
    clock: ReplayClock,
}

/// Wall-clock time anchored once, advanced by a monotonic clock so capture
/// times never repeat out of order or step backwards.
#[derive(Debug, Clone, Copy)]
struct ReplayClock {
    base_ms: i64,
    started: Instant,
}

impl ReplayClock {
    fn start() -> Self {
        Self {
            base_ms: chrono::Utc::now().timestamp_millis(),
            started: Instant::now(),
        }
    }

    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.base_ms.saturating_add(elapsed)
    }
}

impl ReplaySource {
    fn pace(&mut self) {
        let Some(rate) = self.frame_rate.filter(|r| self.realtime && *r > 0.0) else {
            return;
        };
        let interval = Duration::from_secs_f64(1.0 / rate);
        if let Some(last) = self.last_emit {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl FrameSource for ReplaySource {
    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    fn next_frame(&mut self) -> Option<VideoFrame> {
        let index = self.next_index;
        let recorded_ts = *self.timestamps.get(index)?;
        self.next_index += 1;
        self.pace();

        // Recordings without timestamps fall back to capture time
        let timestamp_ms = recorded_ts.unwrap_or_else(|| self.clock.now_ms());
        let mut frame = VideoFrame::new(index as u64, timestamp_ms);

        if let Some(path) = self.images.pop_front() {
            match image::open(&path) {
                Ok(img) => frame = frame.with_image(img.to_rgba8()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "frame image unreadable, brightness skipped");
                }
            }
        }
        Some(frame)
    }
}
