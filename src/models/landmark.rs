//! Pose landmark types produced by the external pose-estimation service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized 2-D coordinate (`x`, `y` in `[0, 1]` for on-screen points).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Vector from `origin` to `self`.
    #[must_use]
    pub fn sub(self, origin: Self) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }

    /// Returns true if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A single landmark from the pose model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized horizontal coordinate.
    pub x: f64,
    /// Normalized vertical coordinate.
    pub y: f64,
    /// Model visibility estimate in `[0, 1]`.
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

const fn default_visibility() -> f64 {
    1.0
}

impl Landmark {
    /// Projects the landmark onto the image plane.
    #[must_use]
    pub const fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Indices into the 33-point pose topology that the classifier reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseLandmark {
    /// Left shoulder.
    LeftShoulder = 11,
    /// Left hip.
    LeftHip = 23,
    /// Left knee.
    LeftKnee = 25,
}

impl PoseLandmark {
    /// Index of the landmark in a full pose frame.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// All landmarks detected in one video frame.
///
/// An empty `landmarks` list means the model found no person in the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Capture time of the frame.
    pub captured_at: DateTime<Utc>,
    /// Landmarks in pose-topology order.
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    /// Creates a frame.
    #[must_use]
    pub const fn new(captured_at: DateTime<Utc>, landmarks: Vec<Landmark>) -> Self {
        Self {
            captured_at,
            landmarks,
        }
    }

    /// Returns the landmark at a topology position, if the model produced it.
    #[must_use]
    pub fn get(&self, landmark: PoseLandmark) -> Option<&Landmark> {
        self.landmarks.get(landmark.index())
    }
}
