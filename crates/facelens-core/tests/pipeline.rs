//! End-to-end scenarios: synthetic landmark sets with known region areas
//! pushed through a full analyzer.

use std::collections::VecDeque;
use std::f64::consts::PI;

use facelens_core::brightness::BrightnessSurface;
use facelens_core::geometry::{area_ratios, polygon_area, select_polygon};
use facelens_core::topology::{IndexGroup, FACE_MESH_LANDMARK_COUNT};
use facelens_core::{
    AnalyzerConfig, Category, Detection, EngineError, FaceTopology, FrameAnalyzer, FrameSource,
    Landmark, LandmarkEngine, UnhealthyReason, VideoFrame,
};
use image::{Rgba, RgbaImage};

struct FixedEngine {
    output: Detection,
    calls: usize,
}

impl FixedEngine {
    fn new(output: Detection) -> Self {
        Self { output, calls: 0 }
    }
}

impl LandmarkEngine for FixedEngine {
    fn detect(&mut self, _frame: &VideoFrame, _ts: i64) -> Result<Detection, EngineError> {
        self.calls += 1;
        Ok(self.output.clone())
    }

    fn landmark_count(&self) -> usize {
        FACE_MESH_LANDMARK_COUNT
    }
}

struct Frames(VecDeque<VideoFrame>);

impl FrameSource for Frames {
    fn frame_rate(&self) -> Option<f64> {
        None
    }

    fn next_frame(&mut self) -> Option<VideoFrame> {
        self.0.pop_front()
    }
}

/// Place `group`'s landmarks on a regular polygon of the given area.
fn place_regular_polygon(
    landmarks: &mut [Landmark],
    group: &IndexGroup,
    area: f64,
    center: (f64, f64),
) {
    let n = group.indices.len() as f64;
    let radius = (2.0 * area / (n * (2.0 * PI / n).sin())).sqrt();
    for (k, &index) in group.indices.iter().enumerate() {
        let angle = 2.0 * PI * k as f64 / n;
        landmarks[index] = Landmark::new(
            (center.0 + radius * angle.cos()) as f32,
            (center.1 + radius * angle.sin()) as f32,
        );
    }
}

/// Face oval 100, left eye 5, right eye 4, lips 3.
fn synthetic_face() -> Vec<Landmark> {
    let topology = FaceTopology::MEDIAPIPE;
    let mut landmarks = vec![Landmark::new(0.0, 0.0); FACE_MESH_LANDMARK_COUNT];
    place_regular_polygon(&mut landmarks, &topology.face_oval, 100.0, (10.0, 10.0));
    place_regular_polygon(&mut landmarks, &topology.left_eye, 5.0, (13.0, 8.0));
    place_regular_polygon(&mut landmarks, &topology.right_eye, 4.0, (7.0, 8.0));
    place_regular_polygon(&mut landmarks, &topology.lips, 3.0, (10.0, 14.0));
    landmarks
}

fn every_frame() -> AnalyzerConfig {
    AnalyzerConfig {
        sampling_frame_rate: 30.0,
        ..AnalyzerConfig::default()
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-5
}

#[test]
fn synthetic_face_has_expected_areas() {
    let landmarks = synthetic_face();
    let topology = FaceTopology::MEDIAPIPE;
    let face = select_polygon(&landmarks, &topology.face_oval).unwrap();
    assert!((polygon_area(&face.points) - 100.0).abs() < 1e-3);
    let lips = select_polygon(&landmarks, &topology.lips).unwrap();
    assert!((lips.area() - 3.0).abs() < 1e-4);
}

#[test]
fn single_face_produces_healthy_result() {
    let detection = Detection {
        faces: vec![synthetic_face()],
        blendshapes: Some(vec![vec![
            Category::new("eyeBlinkLeft", 0.8231),
            Category::new("mouthSmile", 0.1),
        ]]),
    };
    let mut analyzer =
        FrameAnalyzer::new(FixedEngine::new(detection), &every_frame(), Some(30.0)).unwrap();
    let result = analyzer
        .process_frame(&VideoFrame::new(0, 1000))
        .unwrap()
        .expect("frame should be analyzed");

    let metrics = result.metrics().expect("single face is healthy");
    assert!(close(metrics.face_parts_ratios.left_eye_to_face, 0.05));
    assert!(close(metrics.face_parts_ratios.right_eye_to_face, 0.04));
    assert!(close(metrics.face_parts_ratios.lips_to_face, 0.03));

    assert_eq!(metrics.blendshapes.len(), 1);
    assert_eq!(metrics.blendshapes["eyeBlinkLeft"], 0.823);
    assert!(!metrics.blendshapes.contains_key("eyeBlinkRight"));
    assert!(!metrics.blendshapes.contains_key("mouthFunnel"));
    assert!(!metrics.blendshapes.contains_key("mouthSmile"));
}

#[test]
fn zero_faces_skip_all_metric_stages() {
    let mut analyzer = FrameAnalyzer::new(
        FixedEngine::new(Detection::default()),
        &every_frame(),
        Some(30.0),
    )
    .unwrap();
    let white = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
    let mut source = Frames(VecDeque::from(vec![VideoFrame::new(0, 0).with_image(white)]));
    let stats = analyzer.run(&mut source).unwrap();

    assert_eq!(analyzer.results().len(), 1);
    assert_eq!(
        analyzer.results().entries()[0].unhealthy_reason(),
        Some(UnhealthyReason::NoFaceDetected)
    );
    assert_eq!(analyzer.engine().calls, 1);
    assert_eq!(stats.metrics_computed, 0);
}

#[test]
fn area_ratios_are_scale_invariant() {
    let topology = FaceTopology::MEDIAPIPE;
    let base = synthetic_face();
    let reference = area_ratios(&base, &topology).unwrap();

    for k in [0.01f32, 0.5, 3.0] {
        let scaled: Vec<Landmark> = base
            .iter()
            .map(|p| Landmark::new(p.x * k, p.y * k))
            .collect();
        let ratios = area_ratios(&scaled, &topology).unwrap();
        assert!(close(ratios.left_eye_to_face, reference.left_eye_to_face), "k={k}");
        assert!(close(ratios.right_eye_to_face, reference.right_eye_to_face), "k={k}");
        assert!(close(ratios.lips_to_face, reference.lips_to_face), "k={k}");
    }
}

#[test]
fn brightness_measured_on_healthy_frames() {
    let config = AnalyzerConfig {
        brightness: Some(BrightnessSurface::new(8, 8)),
        ..every_frame()
    };
    let detection = Detection {
        faces: vec![synthetic_face()],
        blendshapes: None,
    };
    let mut analyzer = FrameAnalyzer::new(FixedEngine::new(detection), &config, None).unwrap();

    let white = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
    let black = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
    let mut source = Frames(VecDeque::from(vec![
        VideoFrame::new(0, 0).with_image(white),
        VideoFrame::new(1, 33).with_image(black),
    ]));
    analyzer.run(&mut source).unwrap();

    let light: Vec<f64> = analyzer
        .results()
        .entries()
        .iter()
        .map(|r| r.metrics().unwrap().light_average)
        .collect();
    assert_eq!(light, vec![255.0, 0.0]);
}

#[test]
fn brightness_disabled_reports_zero() {
    let config = AnalyzerConfig {
        brightness: None,
        ..every_frame()
    };
    let detection = Detection {
        faces: vec![synthetic_face()],
        blendshapes: None,
    };
    let mut analyzer = FrameAnalyzer::new(FixedEngine::new(detection), &config, None).unwrap();
    let white = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
    let result = analyzer
        .process_frame(&VideoFrame::new(0, 0).with_image(white))
        .unwrap()
        .unwrap();
    assert_eq!(result.metrics().unwrap().light_average, 0.0);
}

#[test]
fn collapsed_face_is_reported_not_clamped() {
    let detection = Detection {
        faces: vec![vec![Landmark::new(0.5, 0.5); FACE_MESH_LANDMARK_COUNT]],
        blendshapes: None,
    };
    let mut analyzer =
        FrameAnalyzer::new(FixedEngine::new(detection), &every_frame(), None).unwrap();
    let result = analyzer
        .process_frame(&VideoFrame::new(0, 0))
        .unwrap()
        .unwrap()
        .clone();

    assert!(result.is_healthy());
    assert!(!result.metrics().unwrap().face_parts_ratios.is_finite());
    assert_eq!(analyzer.stats().non_finite_ratios, 1);
}
