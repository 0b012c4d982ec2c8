//! Hand skeleton overlay for round snapshots.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use image::{Rgba, RgbaImage};

use super::image_prep::encode_jpeg;
use crate::types::{
    Frame, INDEX_TIP, LandmarkSet, MIDDLE_TIP, PALM_BASE, PINKY_TIP, RING_TIP, THUMB_TIP,
};

/// First joint of each finger chain; every chain runs four landmarks up to its tip.
static FINGER_ROOTS: [usize; 5] = [1, 5, 9, 13, 17];
const TIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

const SNAPSHOT_QUALITY: u8 = 85;
const BONE_RADIUS: i32 = 1;
const JOINT_RADIUS: i32 = 2;
const TIP_RADIUS: i32 = 3;

const BONE: Rgba<u8> = Rgba([56, 189, 248, 255]);
const JOINT: Rgba<u8> = Rgba([248, 113, 113, 255]);
const TIP: Rgba<u8> = Rgba([250, 204, 21, 255]);

/// Landmark index pairs forming the hand skeleton.
pub fn bones() -> impl Iterator<Item = (usize, usize)> {
    let fingers = FINGER_ROOTS.into_iter().flat_map(|root| {
        [(PALM_BASE, root), (root, root + 1), (root + 1, root + 2), (root + 2, root + 3)]
    });
    let knuckles = FINGER_ROOTS[1..].windows(2).map(|w| (w[0], w[1]));
    fingers.chain(knuckles)
}

pub fn draw_skeleton(canvas: &mut RgbaImage, points: &[(f32, f32)]) {
    if points.len() < 2 {
        return;
    }

    for (a, b) in bones() {
        if let (Some(&from), Some(&to)) = (points.get(a), points.get(b)) {
            draw_segment(canvas, from, to, BONE_RADIUS, BONE);
        }
    }
    for (idx, &point) in points.iter().enumerate() {
        let (radius, color) = if TIPS.contains(&idx) {
            (TIP_RADIUS, TIP)
        } else {
            (JOINT_RADIUS, JOINT)
        };
        draw_dot(canvas, point, radius, color);
    }
}

/// Writes the working image as JPEG with every detected hand drawn on it.
pub fn write_snapshot(image: &Frame, hands: &[LandmarkSet], path: &Path) -> Result<()> {
    let mut canvas = RgbaImage::from_raw(image.width, image.height, image.rgba.clone())
        .ok_or_else(|| anyhow!("working image buffer does not match its size"))?;
    for hand in hands {
        draw_skeleton(&mut canvas, &hand.projected());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create snapshot directory {}", parent.display()))?;
    }
    let (width, height) = canvas.dimensions();
    let jpeg = encode_jpeg(&Frame::new(canvas.into_raw(), width, height), SNAPSHOT_QUALITY)?;
    fs::write(path, jpeg).with_context(|| format!("failed to write snapshot {}", path.display()))
}

fn draw_segment(canvas: &mut RgbaImage, from: (f32, f32), to: (f32, f32), radius: i32, color: Rgba<u8>) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as u32;
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let point = (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
        draw_dot(canvas, point, radius, color);
    }
}

fn draw_dot(canvas: &mut RgbaImage, center: (f32, f32), radius: i32, color: Rgba<u8>) {
    if !center.0.is_finite() || !center.1.is_finite() {
        return;
    }
    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    let r = i64::from(radius);
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && x < i64::from(canvas.width()) && y < i64::from(canvas.height()) {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
