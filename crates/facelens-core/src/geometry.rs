//! Planar polygon areas over landmark contours.
//!
//! Areas use the shoelace formula on the (x, y) projection; depth is
//! ignored. Eye and lip contours are neither flat nor guaranteed simple, so
//! the result is an approximation of the region's true area. It is stable
//! frame-to-frame, which is what the ratios are used for.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::{FaceTopology, IndexGroup};
use crate::types::Landmark;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
    #[error("index group {group} references landmark {index}, but the set has {len} landmarks")]
    IndexOutOfRange {
        group: &'static str,
        index: usize,
        len: usize,
    },
}

/// Landmarks selected by an [`IndexGroup`], in the group's boundary order.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub name: &'static str,
    pub points: Vec<Landmark>,
}

impl Polygon {
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }
}

/// Area of each measured region relative to the face oval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacePartsRatios {
    pub left_eye_to_face: f64,
    pub right_eye_to_face: f64,
    pub lips_to_face: f64,
}

impl FacePartsRatios {
    /// False when the face oval collapsed and the ratios are NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.left_eye_to_face.is_finite()
            && self.right_eye_to_face.is_finite()
            && self.lips_to_face.is_finite()
    }
}

/// Copy the landmarks named by `group` out of a full landmark set.
pub fn select_polygon(landmarks: &[Landmark], group: &IndexGroup) -> Result<Polygon, GeometryError> {
    let mut points = Vec::with_capacity(group.indices.len());
    for &index in group.indices {
        let point = landmarks
            .get(index)
            .ok_or(GeometryError::IndexOutOfRange {
                group: group.name,
                index,
                len: landmarks.len(),
            })?;
        points.push(*point);
    }
    Ok(Polygon {
        name: group.name,
        points,
    })
}

/// Shoelace area of a closed polygon; the last vertex wraps to the first.
///
/// Fewer than 3 points enclose nothing and yield 0.
pub fn polygon_area(points: &[Landmark]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0f64;
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        twice_area += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    0.5 * twice_area.abs()
}

/// Eye and lip areas divided by the face-oval area.
///
/// A face oval of zero area produces NaN or infinite ratios; they are passed
/// through so consumers can discard the frame.
pub fn area_ratios(
    landmarks: &[Landmark],
    topology: &FaceTopology,
) -> Result<FacePartsRatios, GeometryError> {
    let face_area = select_polygon(landmarks, &topology.face_oval)?.area();
    let left_eye_area = select_polygon(landmarks, &topology.left_eye)?.area();
    let right_eye_area = select_polygon(landmarks, &topology.right_eye)?.area();
    let lips_area = select_polygon(landmarks, &topology.lips)?.area();

    Ok(FacePartsRatios {
        left_eye_to_face: left_eye_area / face_area,
        right_eye_to_face: right_eye_area / face_area,
        lips_to_face: lips_area / face_area,
    })
}
