use crate::types::{Gesture, INDEX_TIP, Landmark, LandmarkSet, MIDDLE_TIP, PINKY_TIP, RING_TIP};

/// Planar tip-to-palm distance above which a finger counts as extended.
/// Calibrated for the 300 px working width.
pub const EXTENDED_DISTANCE: f32 = 80.0;
/// Index and middle tips must be at least this much closer to the camera than the palm.
pub const POINTING_FORWARD_DEPTH: f32 = 15.0;
/// Ring and pinky tips must stay within this depth of the palm.
pub const POINTING_TUCKED_DEPTH: f32 = 10.0;

const FINGER_TIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Raw geometry the classifier decides on, ordered index, middle, ring, pinky.
#[derive(Clone, Debug, PartialEq)]
pub struct HandMeasurements {
    pub tip_distances: [f32; 4],
    pub depth_diffs: [f32; 4],
}

impl HandMeasurements {
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Self {
        let palm = landmarks.palm_base();
        let tip_distances = FINGER_TIPS.map(|idx| distance2(landmarks.point(idx), palm));
        let depth_diffs = FINGER_TIPS.map(|idx| palm[2] - landmarks.point(idx)[2]);
        Self {
            tip_distances,
            depth_diffs,
        }
    }

    pub fn extended_count(&self) -> usize {
        self.tip_distances
            .iter()
            .filter(|d| **d > EXTENDED_DISTANCE)
            .count()
    }

    /// Index and middle pushed toward the camera with ring and pinky tucked: a scissors
    /// pose seen head-on, where the planar spread alone is misleading.
    pub fn is_pointing_forward(&self) -> bool {
        let [index, middle, ring, pinky] = self.depth_diffs;
        index > POINTING_FORWARD_DEPTH
            && middle > POINTING_FORWARD_DEPTH
            && ring < POINTING_TUCKED_DEPTH
            && pinky < POINTING_TUCKED_DEPTH
    }
}

pub fn classify(landmarks: &LandmarkSet) -> Gesture {
    let measurements = HandMeasurements::from_landmarks(landmarks);
    let gesture = classify_measurements(&measurements);
    log::debug!(
        "classified {:?}: distances {:?} depth {:?} extended {}",
        gesture,
        measurements.tip_distances,
        measurements.depth_diffs,
        measurements.extended_count()
    );
    gesture
}

fn classify_measurements(measurements: &HandMeasurements) -> Gesture {
    // Depth check runs first.
    if measurements.is_pointing_forward() {
        return Gesture::Scissors;
    }

    match measurements.extended_count() {
        0 | 1 => Gesture::Rock,
        2 => Gesture::Scissors,
        4 => Gesture::Paper,
        _ => Gesture::Unknown,
    }
}

fn distance2(a: Landmark, b: Landmark) -> f32 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}
