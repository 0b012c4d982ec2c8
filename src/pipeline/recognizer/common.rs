//! Model inputs for the palm and handpose networks, and the mappings back to image pixels.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use fast_image_resize as fir;
use ndarray::{Array4, ArrayView3, s};
use ort::session::{Session, builder::GraphOptimizationLevel};
use rayon::prelude::*;

use crate::types::{Frame, Landmark, NUM_LANDMARKS};

pub const HANDPOSE_INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;
/// Minimum handpose confidence for a crop to count as a hand.
pub const MIN_HAND_CONFIDENCE: f32 = 0.2;

pub fn load_session(model_path: &Path, what: &str) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load {what} from {}", model_path.display()))
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    ensure!(
        frame.rgba.len() == expected,
        "frame buffer size mismatch: got {}, expected {expected}",
        frame.rgba.len()
    );
    Ok(())
}

/// Where an image sits inside a square model input after an aspect-preserving resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub target: u32,
    pub scale: f32,
    pub content: (u32, u32),
    pub offset: (u32, u32),
    pub bounds: (u32, u32),
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = target as f32 / width.max(height).max(1) as f32;
        let fitted = |side: u32| ((side as f32 * scale).round() as u32).clamp(1, target);
        let content = (fitted(width), fitted(height));
        Self {
            target,
            scale,
            content,
            offset: (
                target.saturating_sub(content.0) / 2,
                target.saturating_sub(content.1) / 2,
            ),
            bounds: (width, height),
        }
    }

    /// Maps a point given as a fraction of the model input back to source pixels.
    pub fn to_source(&self, nx: f32, ny: f32) -> (f32, f32) {
        let side = self.target as f32;
        (
            (nx * side - self.offset.0 as f32) / self.scale,
            (ny * side - self.offset.1 as f32) / self.scale,
        )
    }

    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x.clamp(0.0, self.bounds.0.saturating_sub(1) as f32),
            y.clamp(0.0, self.bounds.1.saturating_sub(1) as f32),
        )
    }
}

/// Letterboxes the frame into a black `target` square, RGB in `[0, 1]`, NHWC.
pub fn letterbox_tensor(frame: &Frame, target: u32) -> Result<(Array4<f32>, Letterbox)> {
    check_frame(frame)?;
    let letterbox = Letterbox::fit(frame.width, frame.height, target);
    let (w, h) = letterbox.content;

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut resized = fir::images::Image::new(w, h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut resized, Some(&options))
        .context("failed to resize frame for the palm detector")?;

    let pixels = resized.into_vec();
    let rgba = ArrayView3::from_shape((h as usize, w as usize, 4), &pixels[..])
        .context("resized frame has an unexpected length")?;

    let side = target as usize;
    let (ox, oy) = (letterbox.offset.0 as usize, letterbox.offset.1 as usize);
    let mut input = Array4::<f32>::zeros((1, side, side, 3));
    input
        .slice_mut(s![0, oy..oy + h as usize, ox..ox + w as usize, ..])
        .assign(&rgba.slice(s![.., .., ..3]).mapv(|v| f32::from(v) / 255.0));

    Ok((input, letterbox))
}

/// Rotated square region of the working image that the handpose model sees.
#[derive(Clone, Debug, PartialEq)]
pub struct HandCrop {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub size: u32,
}

impl HandCrop {
    pub fn new(center: (f32, f32), side: f32, angle: f32, size: u32) -> Self {
        Self {
            center,
            side,
            angle,
            size,
        }
    }

    /// Source pixels per crop pixel.
    pub fn pixel_scale(&self) -> f32 {
        self.side / self.size as f32
    }

    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.size as f32 / 2.0;
        let scale = self.pixel_scale();
        let (sin, cos) = self.angle.sin_cos();
        let (dx, dy) = ((x - half) * scale, (y - half) * scale);
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }

    /// Bilinear samples of the crop, RGB in `[0, 1]`, NHWC.
    pub fn tensor(&self, frame: &Frame) -> Result<Array4<f32>> {
        check_frame(frame)?;
        let size = self.size;
        let data: Vec<f32> = (0..size)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..size).flat_map(move |x| {
                    let (sx, sy) = self.to_source(x as f32 + 0.5, y as f32 + 0.5);
                    bilinear_rgb(frame, sx, sy)
                })
            })
            .collect();

        Array4::from_shape_vec((1, size as usize, size as usize, 3), data)
            .context("failed to build handpose crop tensor")
    }

    /// Maps crop-space landmarks back to source pixels; depth is rescaled by the same factor.
    /// Points past the image edge keep their coordinates so finger lengths stay intact.
    pub fn project_landmarks(&self, landmarks: &[Landmark]) -> Vec<Landmark> {
        let scale = self.pixel_scale();
        landmarks
            .iter()
            .map(|&[x, y, z]| {
                let (sx, sy) = self.to_source(x, y);
                [sx, sy, z * scale]
            })
            .collect()
    }
}

pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<Landmark>> {
    ensure!(
        flat.len() >= NUM_LANDMARKS * 3,
        "handpose output has {} values, need {}",
        flat.len(),
        NUM_LANDMARKS * 3
    );
    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

fn bilinear_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let (x0, y0) = (x.floor(), y.floor());
    let texel = |cx: f32, cy: f32| -> [f32; 3] {
        if cx < 0.0 || cy < 0.0 || cx >= frame.width as f32 || cy >= frame.height as f32 {
            return [0.0; 3];
        }
        let idx = (cy as usize * frame.width as usize + cx as usize) * 4;
        match frame.rgba.get(idx..idx + 3) {
            Some(px) => [
                f32::from(px[0]) / 255.0,
                f32::from(px[1]) / 255.0,
                f32::from(px[2]) / 255.0,
            ],
            None => [0.0; 3],
        }
    };

    let top = mix(texel(x0, y0), texel(x0 + 1.0, y0), x - x0);
    let bottom = mix(texel(x0, y0 + 1.0), texel(x0 + 1.0, y0 + 1.0), x - x0);
    mix(top, bottom, y - y0)
}

fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}
