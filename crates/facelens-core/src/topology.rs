//! Static landmark index groups for the MediaPipe Face Mesh topology.
//!
//! Each group lists the landmark indices of one facial region's outer
//! contour, in boundary order. The order matters: the shoelace area of a
//! polygon depends on walking its boundary, so these tables must never be
//! sorted or deduplicated.

use thiserror::Error;

/// Landmarks produced per face by the Face Mesh model with iris refinement.
pub const FACE_MESH_LANDMARK_COUNT: usize = 478;

/// A named, ordered set of landmark indices outlining one facial region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexGroup {
    pub name: &'static str,
    pub indices: &'static [usize],
}

pub const FACE_OVAL: IndexGroup = IndexGroup {
    name: "faceOval",
    indices: &[
        10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377,
        152, 148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
    ],
};

/// Subject's left eye (appears on the right side of an unmirrored image).
pub const LEFT_EYE: IndexGroup = IndexGroup {
    name: "leftEye",
    indices: &[
        263, 249, 390, 373, 374, 380, 381, 382, 362, 398, 384, 385, 386, 387, 388, 466,
    ],
};

pub const RIGHT_EYE: IndexGroup = IndexGroup {
    name: "rightEye",
    indices: &[
        33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
    ],
};

/// Outer lip contour.
pub const LIPS: IndexGroup = IndexGroup {
    name: "lips",
    indices: &[
        61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185,
    ],
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopologyError {
    #[error("index group {group} references landmark {index}, but the engine produces only {landmark_count}")]
    IndexOutOfRange {
        group: &'static str,
        index: usize,
        landmark_count: usize,
    },
    #[error("index group {group} has {len} indices; a polygon needs at least 3")]
    TooFewIndices { group: &'static str, len: usize },
}

/// The four regions measured on every healthy frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceTopology {
    pub face_oval: IndexGroup,
    pub left_eye: IndexGroup,
    pub right_eye: IndexGroup,
    pub lips: IndexGroup,
}

impl FaceTopology {
    pub const MEDIAPIPE: FaceTopology = FaceTopology {
        face_oval: FACE_OVAL,
        left_eye: LEFT_EYE,
        right_eye: RIGHT_EYE,
        lips: LIPS,
    };

    pub fn groups(&self) -> [&IndexGroup; 4] {
        [&self.face_oval, &self.left_eye, &self.right_eye, &self.lips]
    }

    /// Check every group against the number of landmarks the engine emits.
    ///
    /// Run once before a session starts; a failure here is a configuration
    /// mismatch between these tables and the engine's model.
    pub fn validate(&self, landmark_count: usize) -> Result<(), TopologyError> {
        for group in self.groups() {
            if group.indices.len() < 3 {
                return Err(TopologyError::TooFewIndices {
                    group: group.name,
                    len: group.indices.len(),
                });
            }
            if let Some(&index) = group.indices.iter().find(|&&i| i >= landmark_count) {
                return Err(TopologyError::IndexOutOfRange {
                    group: group.name,
                    index,
                    landmark_count,
                });
            }
        }
        Ok(())
    }
}

impl Default for FaceTopology {
    fn default() -> Self {
        Self::MEDIAPIPE
    }
}
