use std::path::Path;

use anyhow::{Context, Result, ensure};
use ort::session::Session;
use ort::value::Tensor;

use super::{
    HandDetector,
    common::{HANDPOSE_INPUT_SIZE, MIN_HAND_CONFIDENCE, decode_landmarks, load_session},
    palm::{PalmDetector, PalmDetectorConfig, hand_crop},
};
use crate::types::{Frame, LandmarkSet, PalmRegion};

/// Two-stage MediaPipe hand pipeline: palm detection, then landmarks per palm crop.
pub struct OrtHandDetector {
    handpose: Session,
    palm_detector: PalmDetector,
    max_hands: usize,
}

impl OrtHandDetector {
    pub fn new(handpose_model: &Path, palm_model: &Path, max_hands: usize) -> Result<Self> {
        Ok(Self {
            handpose: load_session(handpose_model, "handpose estimator")?,
            palm_detector: PalmDetector::new(palm_model, PalmDetectorConfig::default())?,
            max_hands: max_hands.max(1),
        })
    }

    /// Runs the handpose model on one palm; `None` when it is not confident there is a hand.
    fn hand_in_palm(&mut self, image: &Frame, palm: &PalmRegion) -> Result<Option<LandmarkSet>> {
        let crop = hand_crop(palm, HANDPOSE_INPUT_SIZE);
        let tensor = Tensor::from_array(crop.tensor(image)?)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("handpose inference failed")?;
        ensure!(outputs.len() > 0, "handpose model returned no outputs");

        // Second output is the hand presence score; older exports omit it.
        let presence = match outputs.len() {
            1 => 0.0,
            _ => outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|scores| scores.iter().next().copied())
                .unwrap_or(0.0),
        };
        let confidence = (presence * palm.score).clamp(0.0, 1.0);
        if confidence < MIN_HAND_CONFIDENCE {
            log::debug!("discarding hand crop with confidence {confidence:.2}");
            return Ok(None);
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flat: Vec<f32> = coords.iter().copied().collect();
        let landmarks = crop.project_landmarks(&decode_landmarks(&flat)?);
        Ok(Some(LandmarkSet::from_points(&landmarks)?))
    }
}

impl HandDetector for OrtHandDetector {
    fn estimate_hands(&mut self, image: &Frame) -> Result<Vec<LandmarkSet>> {
        let palms = self
            .palm_detector
            .detect(image)
            .context("palm detection failed")?;

        let mut hands = Vec::with_capacity(self.max_hands);
        for palm in &palms {
            if hands.len() == self.max_hands {
                break;
            }
            hands.extend(self.hand_in_palm(image, palm)?);
        }

        log::debug!("{} palm region(s), {} confident hand(s)", palms.len(), hands.len());
        Ok(hands)
    }
}
