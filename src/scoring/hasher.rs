//! Content fingerprinting of photos.
//!
//! Photos are decoded, bounded to `max_dimension` on the longest side,
//! re-encoded as baseline JPEG at a fixed quality and hashed with SHA-256.
//! The digest of that normalized buffer is the dedup key for evaluations.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationPolicy {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            jpeg_quality: 80,
        }
    }
}

/// The bytes sent to the scoring backend together with their fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPhoto {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub hash: String,
}

pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn normalize_image(image: &DynamicImage, policy: NormalizationPolicy) -> Result<NormalizedPhoto> {
    let max = policy.max_dimension.max(1);
    let resized = if image.width() > max || image.height() > max {
        image.resize(max, max, FilterType::Triangle)
    } else {
        image.clone()
    };

    let rgb = resized.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, policy.jpeg_quality)
        .encode_image(&rgb)
        .context("failed to encode normalized photo")?;
    let jpeg = buffer.into_inner();

    Ok(NormalizedPhoto {
        hash: content_hash(&jpeg),
        width: rgb.width(),
        height: rgb.height(),
        jpeg,
    })
}

/// Decodes stored photo bytes (any format `image` understands) and normalizes them.
pub fn normalize_bytes(bytes: &[u8], policy: NormalizationPolicy) -> Result<NormalizedPhoto> {
    let image = image::load_from_memory(bytes).context("failed to decode photo")?;
    normalize_image(&image, policy)
}
