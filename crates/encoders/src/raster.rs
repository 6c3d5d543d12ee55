//! In-process raster re-encoder.
//!
//! Decodes any format the `image` crate was built with, flattens alpha onto
//! white, optionally downscales with Lanczos3, and writes a baseline JPEG at
//! the descriptor's quality. Runs on the blocking pool under the per-candidate
//! timeout.

use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::error::ImageFormatHint;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, Rgb, RgbImage};
use tracing::debug;

use tightfit_core::{
    CancelToken, CandidateDescriptor, CandidateParams, CandidateResult, EncodeError, Encoder,
};

use crate::blocking::run_bounded;
use crate::output::accept_output;

pub const JPEG_MIME: &str = "image/jpeg";

pub struct ImageCodec {
    corruption_floor: u64,
    timeout: Duration,
}

impl ImageCodec {
    pub fn new(corruption_floor: u64, timeout: Duration) -> Self {
        Self {
            corruption_floor,
            timeout,
        }
    }
}

#[async_trait]
impl Encoder for ImageCodec {
    fn name(&self) -> &str {
        "image"
    }

    async fn invoke(
        &self,
        input: &[u8],
        descriptor: &CandidateDescriptor,
        cancel: &CancelToken,
    ) -> CandidateResult {
        let &CandidateParams::Image {
            quality,
            downscale_factor,
        } = &descriptor.params
        else {
            return CandidateResult::failure(
                descriptor.clone(),
                EncodeError::candidate_failed(&descriptor.name, "not an image candidate"),
            );
        };

        if cancel.is_cancelled() {
            return CandidateResult::failure(descriptor.clone(), EncodeError::Cancelled);
        }

        let data = input.to_vec();
        let outcome = run_bounded(&descriptor.name, self.timeout, cancel, move || {
            transcode_jpeg(&data, quality, downscale_factor)
        })
        .await;

        match outcome {
            Ok(Ok(bytes)) => {
                debug!(
                    candidate = %descriptor.name,
                    quality,
                    size_bytes = bytes.len(),
                    "Image candidate encoded"
                );
                accept_output(descriptor, bytes, JPEG_MIME, "jpg", self.corruption_floor)
            }
            Ok(Err(e)) => CandidateResult::failure(descriptor.clone(), e.into_encode_error(&descriptor.name)),
            Err(e) => CandidateResult::failure(descriptor.clone(), e),
        }
    }
}

#[derive(Debug)]
enum TranscodeError {
    /// The input format is recognised but no decoder is compiled in.
    Unsupported(String),
    Failed(String),
}

impl TranscodeError {
    fn into_encode_error(self, candidate: &str) -> EncodeError {
        match self {
            Self::Unsupported(reason) => EncodeError::unavailable("image", reason),
            Self::Failed(reason) => EncodeError::candidate_failed(candidate, reason),
        }
    }
}

impl From<ImageError> for TranscodeError {
    fn from(e: ImageError) -> Self {
        match &e {
            ImageError::Unsupported(u) if matches!(u.format_hint(), ImageFormatHint::Exact(_)) => {
                Self::Unsupported(e.to_string())
            }
            _ => Self::Failed(e.to_string()),
        }
    }
}

fn transcode_jpeg(
    input: &[u8],
    quality: u8,
    downscale_factor: Option<f32>,
) -> Result<Vec<u8>, TranscodeError> {
    let decoded = image::load_from_memory(input)?;

    let resized = match downscale_factor {
        Some(factor) if factor > 0.0 && factor < 1.0 => {
            let (w, h) = scaled_dimensions(decoded.width(), decoded.height(), factor);
            decoded.resize_exact(w, h, FilterType::Lanczos3)
        }
        _ => decoded,
    };

    let rgb = if resized.color().has_alpha() {
        flatten_onto_white(&resized)
    } else {
        resized.to_rgb8()
    };

    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder.encode_image(&rgb)?;
    }
    Ok(out)
}

/// Scale both sides by `factor`, never below one pixel and never enlarging.
fn scaled_dimensions(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let scale = |side: u32| -> u32 {
        let scaled = (side as f32 * factor).round().max(1.0) as u32;
        scaled.min(side)
    };
    (scale(width), scale(height))
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend =
            |channel: u8| -> u8 { ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8 };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn noise(x: u32, y: u32, salt: u32) -> u8 {
        let mut s = x.wrapping_mul(0x9E37_79B9) ^ y.wrapping_mul(0x85EB_CA6B) ^ salt;
        s ^= s >> 13;
        s = s.wrapping_mul(0xC2B2_AE35);
        s ^= s >> 16;
        (s & 0xFF) as u8
    }

    fn noise_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([noise(x, y, 1), noise(x, y, 2), noise(x, y, 3)])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn codec() -> ImageCodec {
        ImageCodec::new(512, Duration::from_secs(30))
    }

    fn image_candidate(quality: u8, downscale_factor: Option<f32>) -> CandidateDescriptor {
        CandidateDescriptor::new(
            format!("q{quality}"),
            CandidateParams::Image {
                quality,
                downscale_factor,
            },
            0,
        )
    }

    #[tokio::test]
    async fn reencodes_png_as_jpeg() {
        let codec = codec();
        let input = noise_png(256, 256);
        let result = codec
            .invoke(&input, &image_candidate(90, None), &CancelToken::never())
            .await;
        let artifact = result.artifact().expect("encode should succeed");
        assert_eq!(artifact.mime_type(), JPEG_MIME);
        assert_eq!(artifact.suggested_filename(), "q90.jpg");

        let decoded = image::load_from_memory(artifact.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (256, 256));
    }

    #[tokio::test]
    async fn lower_quality_is_smaller() {
        let codec = codec();
        let input = noise_png(256, 256);
        let high = codec
            .invoke(&input, &image_candidate(90, None), &CancelToken::never())
            .await;
        let low = codec
            .invoke(&input, &image_candidate(40, None), &CancelToken::never())
            .await;
        assert!(low.artifact().unwrap().size_bytes() < high.artifact().unwrap().size_bytes());
    }

    #[tokio::test]
    async fn downscale_shrinks_dimensions() {
        let codec = codec();
        let input = noise_png(256, 200);
        let result = codec
            .invoke(&input, &image_candidate(75, Some(0.8)), &CancelToken::never())
            .await;
        let decoded = image::load_from_memory(result.artifact().unwrap().bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (205, 160));
    }

    #[tokio::test]
    async fn transparent_input_is_flattened() {
        let img = RgbaImage::from_fn(64, 64, |x, y| Rgba([noise(x, y, 4), 0, 0, (x * 4) as u8]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();

        let codec = ImageCodec::new(0, Duration::from_secs(30));
        let result = codec
            .invoke(&buf.into_inner(), &image_candidate(90, None), &CancelToken::never())
            .await;
        let decoded = image::load_from_memory(result.artifact().unwrap().bytes()).unwrap();
        assert!(!decoded.color().has_alpha());
    }

    #[tokio::test]
    async fn garbage_input_fails_candidate() {
        let codec = codec();
        let result = codec
            .invoke(b"definitely not an image", &image_candidate(90, None), &CancelToken::never())
            .await;
        assert!(matches!(
            result.error(),
            Some(EncodeError::CandidateFailed { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let (handle, token) = tightfit_core::CancelHandle::new();
        handle.cancel();
        let codec = codec();
        let result = codec
            .invoke(&noise_png(32, 32), &image_candidate(90, None), &token)
            .await;
        assert_eq!(result.error(), Some(&EncodeError::Cancelled));
    }

    #[tokio::test]
    async fn rejects_document_descriptor() {
        let codec = codec();
        let d = CandidateDescriptor::new("structural", CandidateParams::Structural, 0);
        let result = codec.invoke(b"x", &d, &CancelToken::never()).await;
        assert!(result.error().is_some());
    }

    #[tokio::test]
    async fn slow_transcode_hits_timeout() {
        let codec = ImageCodec::new(512, Duration::from_millis(1));
        let input = noise_png(2000, 2000);
        let result = codec
            .invoke(&input, &image_candidate(90, Some(0.8)), &CancelToken::never())
            .await;
        assert!(matches!(
            result.error(),
            Some(EncodeError::TimedOut { candidate, .. }) if candidate == "q90"
        ));
        assert!(result.artifact().is_none());
    }

    #[test]
    fn scaled_dimensions_never_enlarge_or_vanish() {
        assert_eq!(scaled_dimensions(100, 50, 0.8), (80, 40));
        assert_eq!(scaled_dimensions(1, 1, 0.8), (1, 1));
        assert_eq!(scaled_dimensions(10, 10, 0.01), (1, 1));
    }
}
