//! SSD anchors for the 192×192 MediaPipe palm detector.

use super::super::common::PALM_INPUT_SIZE;

/// Layer strides; consecutive layers with the same stride share one feature map.
const STRIDES: [u32; 4] = [8, 16, 16, 16];
/// One anchor for the base scale plus one interpolated anchor, per layer.
const ANCHORS_PER_LAYER: usize = 2;
const ANCHOR_OFFSET: f32 = 0.5;

pub const NUM_ANCHORS: usize = 2016;

/// Anchor centres `[cx, cy]` in normalised input coordinates.
pub fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    let mut layer = 0;
    while layer < STRIDES.len() {
        let stride = STRIDES[layer];
        let mut repeats = 0;
        while layer < STRIDES.len() && STRIDES[layer] == stride {
            repeats += ANCHORS_PER_LAYER;
            layer += 1;
        }

        let grid = PALM_INPUT_SIZE.div_ceil(stride);
        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + ANCHOR_OFFSET) / grid as f32;
                let cy = (y as f32 + ANCHOR_OFFSET) / grid as f32;
                anchors.extend(std::iter::repeat_n([cx, cy], repeats));
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_layout_matches_model_output() {
        let anchors = generate_anchors();
        assert_eq!(anchors.len(), NUM_ANCHORS);
        assert_eq!(anchors[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(anchors[1], anchors[0]);
        // First anchor of the 12×12 map.
        assert_eq!(anchors[24 * 24 * 2], [0.5 / 12.0, 0.5 / 12.0]);
        assert!(anchors.iter().all(|a| a[0] > 0.0 && a[0] < 1.0 && a[1] > 0.0 && a[1] < 1.0));
    }
}
