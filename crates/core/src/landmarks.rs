//! Holistic landmark frames
//!
//! A landmark model reports up to four groups per frame (pose, face, left
//! hand, right hand). Any group may be missing from a frame.

use serde::{Deserialize, Serialize};

/// A single tracked point in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth
    pub z: f32,
    /// Visibility score; only pose landmarks carry one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// Anatomical landmark group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkGroup {
    Pose,
    Face,
    LeftHand,
    RightHand,
}

impl LandmarkGroup {
    /// Groups in feature-vector order
    pub const ALL: [LandmarkGroup; 4] = [
        LandmarkGroup::Pose,
        LandmarkGroup::Face,
        LandmarkGroup::LeftHand,
        LandmarkGroup::RightHand,
    ];

    /// Number of points the holistic model reports for this group
    pub fn point_count(&self) -> usize {
        match self {
            LandmarkGroup::Pose => 33,
            LandmarkGroup::Face => 468,
            LandmarkGroup::LeftHand | LandmarkGroup::RightHand => 21,
        }
    }

    /// Values per point: pose adds visibility to x, y, z
    pub fn values_per_point(&self) -> usize {
        match self {
            LandmarkGroup::Pose => 4,
            _ => 3,
        }
    }

    /// Width of this group's slice of the feature vector
    pub fn dimension(&self) -> usize {
        self.point_count() * self.values_per_point()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LandmarkGroup::Pose => "pose",
            LandmarkGroup::Face => "face",
            LandmarkGroup::LeftHand => "left_hand",
            LandmarkGroup::RightHand => "right_hand",
        }
    }
}

/// Landmarks detected in one video frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub pose: Option<Vec<Landmark>>,
    #[serde(default)]
    pub face: Option<Vec<Landmark>>,
    #[serde(default)]
    pub left_hand: Option<Vec<Landmark>>,
    #[serde(default)]
    pub right_hand: Option<Vec<Landmark>>,
}

impl LandmarkFrame {
    /// Landmarks for a group, if the model detected it in this frame
    pub fn group(&self, group: LandmarkGroup) -> Option<&[Landmark]> {
        let points = match group {
            LandmarkGroup::Pose => &self.pose,
            LandmarkGroup::Face => &self.face,
            LandmarkGroup::LeftHand => &self.left_hand,
            LandmarkGroup::RightHand => &self.right_hand,
        };
        points.as_deref()
    }

    /// Groups present in this frame
    pub fn detected_groups(&self) -> Vec<LandmarkGroup> {
        LandmarkGroup::ALL
            .into_iter()
            .filter(|g| self.group(*g).is_some())
            .collect()
    }
}
