//! MediaPipe palm detector: one box and seven palm keypoints per SSD anchor.

mod anchors;

use std::{f32::consts::FRAC_PI_2, path::Path};

use anyhow::{Context, Result, anyhow, bail, ensure};
use ort::session::Session;
use ort::value::Tensor;

use self::anchors::generate_anchors;
use super::common::{HandCrop, Letterbox, PALM_INPUT_SIZE, letterbox_tensor, load_session};
use crate::types::{Frame, PalmRegion};

const PALM_KEYPOINTS: usize = 7;
const BOX_FEATURES: usize = 4 + PALM_KEYPOINTS * 2;
/// Crops never shrink below this many source pixels before expansion.
const MIN_CROP_EXTENT: f32 = 80.0;
const CROP_EXPANSION: f32 = 2.4;

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 32,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        Ok(Self {
            session: load_session(model_path, "palm detector")?,
            anchors: generate_anchors(),
            cfg,
        })
    }

    /// Palm regions in image pixels, best score first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox_tensor(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("palm detector inference failed")?;
        ensure!(
            outputs.len() >= 2,
            "palm detector returned {} outputs, expected boxes and scores",
            outputs.len()
        );

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let raw = RawPalmOutputs::new(
            boxes
                .as_slice()
                .ok_or_else(|| anyhow!("palm boxes are not contiguous"))?,
            boxes.shape(),
            scores
                .as_slice()
                .ok_or_else(|| anyhow!("palm scores are not contiguous"))?,
            scores.shape(),
        )?;

        Ok(raw.decode(&self.anchors, &letterbox, &self.cfg))
    }
}

/// Palm detector outputs for the single batch item, shape-checked.
struct RawPalmOutputs<'a> {
    boxes: &'a [f32],
    box_stride: usize,
    scores: &'a [f32],
    score_stride: usize,
    anchors: usize,
}

impl<'a> RawPalmOutputs<'a> {
    fn new(
        boxes: &'a [f32],
        box_shape: &[usize],
        scores: &'a [f32],
        score_shape: &[usize],
    ) -> Result<Self> {
        let &[_, .., anchors, box_stride] = box_shape else {
            bail!("unexpected palm box shape {box_shape:?}, need [batch, anchors, features]");
        };
        let &[_, .., score_anchors, score_stride] = score_shape else {
            bail!("unexpected palm score shape {score_shape:?}, need [batch, anchors, 1]");
        };
        ensure!(
            box_stride >= BOX_FEATURES,
            "palm box feature dimension too small: {box_stride}"
        );
        ensure!(
            anchors == score_anchors,
            "palm outputs disagree on anchors: {anchors} boxes, {score_anchors} scores"
        );
        ensure!(score_stride > 0, "palm scores have no features");
        ensure!(
            boxes.len() >= anchors * box_stride && scores.len() >= anchors * score_stride,
            "palm outputs are shorter than their shapes"
        );

        Ok(Self {
            boxes,
            box_stride,
            scores,
            score_stride,
            anchors,
        })
    }

    fn decode(
        &self,
        anchors: &[[f32; 2]],
        letterbox: &Letterbox,
        cfg: &PalmDetectorConfig,
    ) -> Vec<PalmRegion> {
        let candidates = anchors
            .iter()
            .take(self.anchors)
            .enumerate()
            .filter_map(|(idx, anchor)| self.region(idx, *anchor, letterbox, cfg.score_threshold))
            .collect();
        suppress_overlaps(candidates, cfg.nms_threshold, cfg.top_k)
    }

    fn region(
        &self,
        idx: usize,
        anchor: [f32; 2],
        letterbox: &Letterbox,
        score_threshold: f32,
    ) -> Option<PalmRegion> {
        let score = sigmoid(self.scores[idx * self.score_stride]);
        if score < score_threshold {
            return None;
        }

        let start = idx * self.box_stride;
        let f = &self.boxes[start..start + BOX_FEATURES];
        // Offsets are in input pixels relative to the anchor centre.
        let input = PALM_INPUT_SIZE as f32;
        let at = |dx: f32, dy: f32| letterbox.to_source(anchor[0] + dx / input, anchor[1] + dy / input);

        let (hw, hh) = (f[2] / 2.0, f[3] / 2.0);
        let (x0, y0) = at(f[0] - hw, f[1] - hh);
        let (x1, y1) = at(f[0] + hw, f[1] + hh);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        let (x0, y0) = letterbox.clamp(x0, y0);
        let (x1, y1) = letterbox.clamp(x1, y1);

        Some(PalmRegion {
            bbox: [x0, y0, x1, y1],
            landmarks: f[4..].chunks_exact(2).map(|p| at(p[0], p[1])).collect(),
            score,
        })
    }
}

/// Square handpose crop around a palm, turned so the fingers point up.
pub fn hand_crop(region: &PalmRegion, size: u32) -> HandCrop {
    let [x0, y0, x1, y1] = region.bbox;
    let center = centroid(&region.landmarks).unwrap_or(((x0 + x1) * 0.5, (y0 + y1) * 0.5));
    // Expanded so folded fingers stay inside the crop.
    let side = (x1 - x0)
        .abs()
        .max((y1 - y0).abs())
        .max(keypoint_span(&region.landmarks))
        .max(MIN_CROP_EXTENT)
        * CROP_EXPANSION;

    HandCrop::new(center, side, palm_angle(&region.landmarks), size)
}

fn centroid(points: &[(f32, f32)]) -> Option<(f32, f32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0_f32, 0.0_f32), |(ax, ay), &(x, y)| (ax + x, ay + y));
    Some((sx / n, sy / n))
}

fn keypoint_span(points: &[(f32, f32)]) -> f32 {
    let Some(&(fx, fy)) = points.first() else {
        return 0.0;
    };
    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (fx, fx, fy, fy),
        |(min_x, max_x, min_y, max_y), &(x, y)| {
            (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
        },
    );
    (max_x - min_x).max(max_y - min_y)
}

/// Principal axis of the palm keypoints, measured from vertical.
fn palm_angle(points: &[(f32, f32)]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let Some((mx, my)) = centroid(points) else {
        return 0.0;
    };
    let (xx, xy, yy) = points
        .iter()
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(xx, xy, yy), &(x, y)| {
            let (dx, dy) = (x - mx, y - my);
            (xx + dx * dx, xy + dx * dy, yy + dy * dy)
        });

    0.5 * (2.0 * xy).atan2(xx - yy) - FRAC_PI_2
}

/// Greedy non-maximum suppression. Output is sorted by descending score.
fn suppress_overlaps(mut candidates: Vec<PalmRegion>, threshold: f32, top_k: usize) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if kept.len() >= top_k {
            break;
        }
        if kept.iter().all(|k| iou(&k.bbox, &candidate.bbox) < threshold) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let overlap = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    let inter = area(&overlap);
    let union = area(a) + area(b) - inter;
    if inter <= 0.0 || union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchors::NUM_ANCHORS;

    fn region(bbox: [f32; 4], score: f32) -> PalmRegion {
        PalmRegion {
            bbox,
            landmarks: Vec::new(),
            score,
        }
    }

    #[test]
    fn overlapping_lower_scores_are_suppressed() {
        let candidates = vec![
            region([0.0, 0.0, 10.0, 10.0], 0.6),
            region([1.0, 1.0, 11.0, 11.0], 0.9),
            region([50.0, 50.0, 60.0, 60.0], 0.7),
        ];
        let scores = |kept: Vec<PalmRegion>| kept.iter().map(|r| r.score).collect::<Vec<_>>();
        assert_eq!(scores(suppress_overlaps(candidates.clone(), 0.3, 32)), vec![0.9, 0.7]);
        assert_eq!(scores(suppress_overlaps(candidates, 0.3, 1)), vec![0.9]);
    }

    #[test]
    fn decodes_single_confident_anchor() {
        let anchors = generate_anchors();
        let mut boxes = vec![0.0f32; NUM_ANCHORS * BOX_FEATURES];
        let mut scores = vec![-10.0f32; NUM_ANCHORS];

        // Square 48 px box on the first anchor of the coarse map.
        let idx = 24 * 24 * 2;
        scores[idx] = 5.0;
        boxes[idx * BOX_FEATURES + 2] = 48.0;
        boxes[idx * BOX_FEATURES + 3] = 48.0;

        let raw = RawPalmOutputs::new(
            &boxes,
            &[1, NUM_ANCHORS, BOX_FEATURES],
            &scores,
            &[1, NUM_ANCHORS, 1],
        )
        .unwrap();
        let letterbox = Letterbox::fit(192, 192, PALM_INPUT_SIZE);
        let regions = raw.decode(&anchors, &letterbox, &PalmDetectorConfig::default());

        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert!(r.score > 0.99);
        assert_eq!(r.landmarks.len(), PALM_KEYPOINTS);
        assert!(r.bbox[0].abs() < 1e-3);
        assert!((r.bbox[2] - 32.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_mismatched_output_shapes() {
        let boxes = vec![0.0f32; 10 * BOX_FEATURES];
        let scores = vec![0.0f32; 9];
        assert!(RawPalmOutputs::new(&boxes, &[1, 10, BOX_FEATURES], &scores, &[1, 9, 1]).is_err());
        assert!(RawPalmOutputs::new(&boxes, &[10, BOX_FEATURES], &scores, &[1, 10, 1]).is_err());
        assert!(RawPalmOutputs::new(&boxes, &[1, 20, 9], &scores, &[1, 20, 1]).is_err());
    }

    #[test]
    fn crop_never_shrinks_below_minimum() {
        let crop = hand_crop(&region([10.0, 10.0, 20.0, 20.0], 0.9), 224);
        assert_eq!(crop.center, (15.0, 15.0));
        assert_eq!(crop.side, MIN_CROP_EXTENT * CROP_EXPANSION);
        assert_eq!(crop.angle, 0.0);
    }

    #[test]
    fn horizontal_keypoints_turn_the_crop_a_quarter() {
        let points = [(10.0, 50.0), (30.0, 50.0), (50.0, 50.0)];
        assert!((palm_angle(&points) + FRAC_PI_2).abs() < 1e-5);
        assert_eq!(keypoint_span(&points), 40.0);
    }
}
