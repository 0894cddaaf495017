//! Cover art transcoding for the on-disk cover cache
//!
//! Covers are stored as baseline JPEG regardless of what the server sent,
//! so every cached file can be read by the same loaders.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// JPEG quality (0-100) for cached covers
const JPEG_QUALITY: u8 = 90;

/// Decode downloaded cover data and re-encode it as JPEG
pub fn transcode_to_jpeg(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        anyhow::bail!("Received empty image data");
    }

    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to guess image format")?
        .decode()
        .context("Failed to decode cover art")?;

    encode_jpeg(&img)
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .context("Failed to encode cover art as JPEG")?;

    debug!(
        "Transcoded cover art: {}x{} -> {} bytes",
        rgb.width(),
        rgb.height(),
        output.len()
    );
    Ok(output)
}

#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::new_rgba8(width, height);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png fixture");
    out.into_inner()
}
