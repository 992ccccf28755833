use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// A normalized facial keypoint in image-relative coordinates.
///
/// `x` and `y` are in `[0, 1]` for points inside the frame; `z` is the
/// engine's relative depth when it reports one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    pub const fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z: Some(z) }
    }
}

/// One named blendshape score reported by the inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub category_name: String,
    pub score: f32,
}

impl Category {
    pub fn new(category_name: impl Into<String>, score: f32) -> Self {
        Self {
            category_name: category_name.into(),
            score,
        }
    }
}

/// Output of one inference call: a landmark set per detected face and,
/// when the engine produces them, per-face blendshape categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub faces: Vec<Vec<Landmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blendshapes: Option<Vec<Vec<Category>>>,
}

impl Detection {
    /// Blendshape categories of the first face, or an empty slice.
    pub fn first_face_blendshapes(&self) -> &[Category] {
        self.blendshapes
            .as_ref()
            .and_then(|faces| faces.first())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A decoded video frame handed over by a [`FrameSource`](crate::FrameSource).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Position of the frame in its stream, starting at 0.
    pub index: u64,
    /// Capture time in milliseconds; monotonic per stream.
    pub timestamp_ms: i64,
    /// Decoded pixels, when the source has them.
    pub image: Option<RgbaImage>,
}

impl VideoFrame {
    pub fn new(index: u64, timestamp_ms: i64) -> Self {
        Self {
            index,
            timestamp_ms,
            image: None,
        }
    }

    pub fn with_image(mut self, image: RgbaImage) -> Self {
        self.image = Some(image);
        self
    }
}
