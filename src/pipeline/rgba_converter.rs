//! Camera buffers of any nokhwa pixel format to packed RGBA frames.

use std::convert::TryFrom;

use anyhow::{Result, anyhow, ensure};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

/// Converts one camera buffer. MJPEG frames take their size from the JPEG header.
pub fn convert_camera_frame(buffer: &Buffer) -> Result<Frame> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = buffer.buffer();

    let rgba = match buffer.source_frame_format() {
        FrameFormat::MJPEG => return mjpeg_to_frame(data),
        FrameFormat::NV12 => nv12_to_rgba(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_rgba(data, width, height)?,
        FrameFormat::RAWRGB => packed_to_rgba(data, width, height, Packed::Rgb)?,
        FrameFormat::RAWBGR => packed_to_rgba(data, width, height, Packed::Bgr)?,
        FrameFormat::GRAY => packed_to_rgba(data, width, height, Packed::Gray)?,
    };
    Ok(Frame::new(rgba, width, height))
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn ensure_len(kind: &str, data: &[u8], expected: usize) -> Result<()> {
    ensure!(
        data.len() >= expected,
        "{kind} buffer too small: got {}, expected {expected}",
        data.len()
    );
    Ok(())
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_plane_len = pixel_count(width, height);
    let uv_plane_len = y_plane_len / 2;
    ensure_len("NV12", data, y_plane_len + uv_plane_len)?;

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_plane_len],
        y_stride: width,
        uv_plane: &data[y_plane_len..y_plane_len + uv_plane_len],
        uv_stride: width,
        width,
        height,
    };

    let mut rgba = vec![0u8; y_plane_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12→RGBA failed: {err:?}"))?;

    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    ensure_len("YUYV", data, pixel_count(width, height) * 2)?;

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422→RGBA failed: {err:?}"))?;

    Ok(rgba)
}

fn mjpeg_to_frame(data: &[u8]) -> Result<Frame> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG decoder returned no image info"))?;
    let width = u32::try_from(info.width).map_err(|_| anyhow!("MJPEG width overflow"))?;
    let height = u32::try_from(info.height).map_err(|_| anyhow!("MJPEG height overflow"))?;
    ensure_len("MJPEG decoded", &rgba, pixel_count(width, height) * 4)?;

    Ok(Frame::new(rgba, width, height))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Packed {
    Rgb,
    Bgr,
    Gray,
}

impl Packed {
    fn channels(self) -> usize {
        match self {
            Packed::Rgb | Packed::Bgr => 3,
            Packed::Gray => 1,
        }
    }
}

fn packed_to_rgba(data: &[u8], width: u32, height: u32, layout: Packed) -> Result<Vec<u8>> {
    let channels = layout.channels();
    ensure_len(
        &format!("{layout:?}"),
        data,
        pixel_count(width, height) * channels,
    )?;

    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(channels))
        .for_each(|(dst, src)| {
            let [r, g, b] = match layout {
                Packed::Rgb => [src[0], src[1], src[2]],
                Packed::Bgr => [src[2], src[1], src[0]],
                Packed::Gray => [src[0]; 3],
            };
            dst.copy_from_slice(&[r, g, b, 255]);
        });

    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_swaps_red_and_blue() {
        let rgba = packed_to_rgba(&[1, 2, 3, 4, 5, 6], 2, 1, Packed::Bgr).unwrap();
        assert_eq!(rgba, vec![3, 2, 1, 255, 6, 5, 4, 255]);
    }

    #[test]
    fn gray_is_replicated() {
        let rgba = packed_to_rgba(&[9, 200], 1, 2, Packed::Gray).unwrap();
        assert_eq!(rgba, vec![9, 9, 9, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(packed_to_rgba(&[1, 2, 3], 2, 1, Packed::Rgb).is_err());
        assert!(yuyv_to_rgba(&[0; 7], 2, 2).is_err());
        assert!(nv12_to_rgba(&[0; 5], 2, 2).is_err());
    }
}
