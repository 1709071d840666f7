//! Pixel cropping of captured photos.
//!
//! Decodes the photo with the `image` crate, turns it upright according to
//! its EXIF orientation tag, cuts out the fixed-ratio rectangle from
//! [`cardkeep_core::geometry::card_crop`], and re-encodes the result as JPEG.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use cardkeep_core::geometry::{card_crop, PixelRect};

use crate::config::CaptureConfig;

/// A cropped card image.
#[derive(Debug, Clone)]
pub struct CroppedImage {
    pub jpeg: Vec<u8>,
    pub source_width: u32,
    pub source_height: u32,
    pub rect: PixelRect,
}

/// Crop `photo` to the card frame described by `settings`.
///
/// Fails when the bytes cannot be decoded or the result cannot be encoded;
/// the capture pipeline falls back to the uncropped photo in that case.
pub fn crop_card(photo: &[u8], settings: &CaptureConfig) -> Result<CroppedImage> {
    let img = decode_upright(photo)?;
    let (width, height) = (img.width(), img.height());

    let rect = card_crop(
        f64::from(width),
        f64::from(height),
        settings.width_ratio,
        settings.aspect_ratio,
    )
    .to_pixels(width, height)
    .ok_or_else(|| anyhow!("photo is too small to crop ({width}x{height})"))?;

    let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, settings.jpeg_quality);
    // JPEG has no alpha channel.
    cropped
        .to_rgb8()
        .write_with_encoder(encoder)
        .context("failed to encode cropped image")?;

    Ok(CroppedImage {
        jpeg,
        source_width: width,
        source_height: height,
        rect,
    })
}

/// Decode `photo` and apply its EXIF orientation, so phone shots taken in
/// portrait are cropped in the frame the user saw.
fn decode_upright(photo: &[u8]) -> Result<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(photo))
        .with_guessed_format()
        .context("failed to read photo")?
        .into_decoder()
        .context("failed to decode photo")?;
    let orientation = decoder
        .orientation()
        .context("failed to read photo orientation")?;
    let mut img = DynamicImage::from_decoder(decoder).context("failed to decode photo")?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// MIME type for the encoded image in `bytes`, defaulting to JPEG.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => "image/jpeg",
    }
}

/// Encode an in-memory RGB image as PNG. Used to build fixtures.
pub fn encode_png(img: &image::RgbImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(out.into_inner())
}
