//! Per-frame feature extraction
//!
//! A feature extractor turns one captured frame into a fixed-width vector.
//! `HolisticFeatureExtractor` flattens holistic landmark frames; other
//! extractors (a live landmark model, for example) plug in through the
//! `FeatureExtractor` trait.

use crate::error::{Error, Result};
use crate::landmarks::{LandmarkFrame, LandmarkGroup};

/// Flattened landmark coordinates for one frame
pub type FeatureVector = Vec<f32>;

/// Converts a captured frame into a feature vector
pub trait FeatureExtractor: Send {
    /// Frame type produced by the capture side
    type Frame: Send;

    /// Width of every vector this extractor produces
    fn width(&self) -> usize;

    /// Extract the feature vector for one frame
    fn extract(&mut self, frame: &Self::Frame) -> Result<FeatureVector>;
}

/// Flattens pose, face, left hand and right hand landmarks in that order
///
/// Missing groups are zero-filled, so every vector is the same width.
#[derive(Debug, Clone)]
pub struct HolisticFeatureExtractor {
    groups: Vec<LandmarkGroup>,
}

impl HolisticFeatureExtractor {
    pub fn new() -> Self {
        Self {
            groups: LandmarkGroup::ALL.to_vec(),
        }
    }

    /// Extractor restricted to a subset of groups, kept in the given order
    pub fn with_groups(groups: Vec<LandmarkGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[LandmarkGroup] {
        &self.groups
    }

    /// Flatten one frame into `out`
    pub fn flatten_into(&self, frame: &LandmarkFrame, out: &mut FeatureVector) -> Result<()> {
        for group in &self.groups {
            let start = out.len();
            match frame.group(*group) {
                Some(points) => {
                    if points.len() != group.point_count() {
                        return Err(Error::contract(format!(
                            "{} group has {} landmarks, expected {}",
                            group.as_str(),
                            points.len(),
                            group.point_count()
                        )));
                    }
                    for point in points {
                        out.extend_from_slice(&[point.x, point.y, point.z]);
                        if group.values_per_point() == 4 {
                            out.push(point.visibility.unwrap_or(0.0));
                        }
                    }
                }
                None => out.resize(start + group.dimension(), 0.0),
            }
        }
        Ok(())
    }
}

impl Default for HolisticFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor for HolisticFeatureExtractor {
    type Frame = LandmarkFrame;

    fn width(&self) -> usize {
        self.groups.iter().map(|g| g.dimension()).sum()
    }

    fn extract(&mut self, frame: &LandmarkFrame) -> Result<FeatureVector> {
        let mut out = Vec::with_capacity(self.width());
        self.flatten_into(frame, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    fn hand(x: f32) -> Vec<Landmark> {
        (0..21).map(|i| Landmark::new(x, i as f32, 0.5)).collect()
    }

    #[test]
    fn test_empty_frame_is_all_zero() {
        let mut extractor = HolisticFeatureExtractor::new();
        let features = extractor.extract(&LandmarkFrame::default()).unwrap();

        assert_eq!(features.len(), 1662);
        assert!(features.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_groups_land_in_their_slices() {
        let mut extractor = HolisticFeatureExtractor::new();
        let frame = LandmarkFrame {
            right_hand: Some(hand(0.25)),
            ..Default::default()
        };
        let features = extractor.extract(&frame).unwrap();

        let right_start = 132 + 1404 + 63;
        assert!(features[..right_start].iter().all(|v| *v == 0.0));
        assert_eq!(&features[right_start..right_start + 3], &[0.25, 0.0, 0.5]);
        assert_eq!(&features[right_start + 3..right_start + 6], &[0.25, 1.0, 0.5]);
    }

    #[test]
    fn test_pose_includes_visibility() {
        let mut extractor = HolisticFeatureExtractor::with_groups(vec![LandmarkGroup::Pose]);
        let pose: Vec<Landmark> = (0..33)
            .map(|_| Landmark::new(0.1, 0.2, 0.3).with_visibility(0.9))
            .collect();
        let frame = LandmarkFrame {
            pose: Some(pose),
            ..Default::default()
        };

        let features = extractor.extract(&frame).unwrap();
        assert_eq!(features.len(), 132);
        assert_eq!(&features[..4], &[0.1, 0.2, 0.3, 0.9]);
    }

    #[test]
    fn test_wrong_point_count_is_rejected() {
        let mut extractor = HolisticFeatureExtractor::new();
        let frame = LandmarkFrame {
            left_hand: Some(vec![Landmark::default(); 5]),
            ..Default::default()
        };

        assert!(extractor.extract(&frame).unwrap_err().is_contract_violation());
    }
}
