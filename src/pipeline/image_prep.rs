use std::{convert::TryFrom, io::Cursor, path::Path};

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use image::{ExtendedColorType, ImageEncoder, codecs::jpeg::JpegEncoder};
use rayon::prelude::*;
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImagePrepSettings {
    pub working_width: u32,
    pub jpeg_quality: u8,
}

impl Default for ImagePrepSettings {
    fn default() -> Self {
        Self {
            working_width: crate::config::DEFAULT_WORKING_WIDTH,
            jpeg_quality: crate::config::DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Brings a capture into the detector's working space: resize to the working width,
/// JPEG round-trip at the configured quality, decode back to RGBA.
pub fn prepare_for_inference(frame: &Frame, settings: &ImagePrepSettings) -> Result<Frame> {
    let resized = resize_to_width(frame, settings.working_width)?;
    let jpeg = encode_jpeg(&resized, settings.jpeg_quality)?;
    let mut decoded = decode_jpeg(&jpeg)?;
    decoded.timestamp = frame.timestamp;
    Ok(decoded)
}

/// Loads a still image from disk as a capture.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let img = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height))
}

pub fn resize_to_width(frame: &Frame, target_width: u32) -> Result<Frame> {
    if frame.width == 0 || frame.height == 0 {
        return Err(anyhow!("cannot resize empty frame"));
    }
    let expected_len = (frame.width as usize) * (frame.height as usize) * 4;
    if frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }

    let target_width = target_width.max(1);
    let target_height = ((frame.height as f64 * target_width as f64 / frame.width as f64).round()
        as u32)
        .max(1);

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(target_width, target_height, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;

    Ok(Frame {
        rgba: dst_image.into_vec(),
        width: target_width,
        height: target_height,
        timestamp: frame.timestamp,
    })
}

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let rgb: Vec<u8> = frame
        .rgba
        .par_chunks_exact(4)
        .flat_map_iter(|px| [px[0], px[1], px[2]])
        .collect();

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .context("JPEG encode failed")?;
    Ok(out.into_inner())
}

pub fn decode_jpeg(data: &[u8]) -> Result<Frame> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("JPEG decode failed: {err:?}"))?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("JPEG decoder reported no image info"))?;

    let width = u32::try_from(info.width).map_err(|_| anyhow!("JPEG width out of range"))?;
    let height = u32::try_from(info.height).map_err(|_| anyhow!("JPEG height out of range"))?;
    let expected_len = width as usize * height as usize * 4;
    if rgba.len() < expected_len {
        return Err(anyhow!(
            "JPEG decode produced too few bytes: got {}, expected {}",
            rgba.len(),
            expected_len
        ));
    }

    Ok(Frame::new(rgba, width, height))
}
