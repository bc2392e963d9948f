//! Photo storage collaborator.
//!
//! The orchestrator only needs raw bytes back. Read failures are logged and
//! reported as "no photo"; they never abort an evaluation on their own.

use std::{
    fs,
    io::{Cursor, ErrorKind},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use uuid::Uuid;

const ENABLE_LOGS: bool = true;
const LOG_SCOPE: &str = "photos";

use crate::log_warn;

const FOLDER_NAME: &str = "entry_photos";
const FULL_JPEG_QUALITY: u8 = 85;
const THUMB_JPEG_QUALITY: u8 = 70;
const THUMB_MAX_PIXEL: u32 = 240;

pub trait PhotoStore: Send + Sync {
    fn load_full(&self, photo_id: &Uuid) -> Option<Vec<u8>>;

    fn load_thumbnail(&self, photo_id: &Uuid) -> Option<Vec<u8>>;

    /// Full resolution when available, thumbnail otherwise.
    fn load_best(&self, photo_id: &Uuid) -> Option<Vec<u8>> {
        self.load_full(photo_id)
            .or_else(|| self.load_thumbnail(photo_id))
    }
}

#[derive(Debug, Clone)]
pub struct FsPhotoStore {
    folder: PathBuf,
}

impl FsPhotoStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let folder = root.as_ref().join(FOLDER_NAME);
        fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create photo folder {}", folder.display()))?;
        Ok(Self { folder })
    }

    pub fn full_path(&self, photo_id: &Uuid) -> PathBuf {
        self.folder.join(format!("full_{photo_id}.jpg"))
    }

    pub fn thumbnail_path(&self, photo_id: &Uuid) -> PathBuf {
        self.folder.join(format!("thumb_{photo_id}.jpg"))
    }

    /// Stores a decoded image under a fresh id: the full image plus a
    /// thumbnail no larger than 240px on its longest side.
    pub fn save(&self, image: &DynamicImage) -> Result<Uuid> {
        let photo_id = Uuid::new_v4();

        let full = encode_jpeg(image, FULL_JPEG_QUALITY)?;
        fs::write(self.full_path(&photo_id), full)
            .with_context(|| format!("failed to write full photo {photo_id}"))?;

        let thumb = image.thumbnail(THUMB_MAX_PIXEL, THUMB_MAX_PIXEL);
        let thumb = encode_jpeg(&thumb, THUMB_JPEG_QUALITY)?;
        fs::write(self.thumbnail_path(&photo_id), thumb)
            .with_context(|| format!("failed to write thumbnail {photo_id}"))?;

        Ok(photo_id)
    }

    pub fn save_bytes(&self, bytes: &[u8]) -> Result<Uuid> {
        let image = image::load_from_memory(bytes).context("failed to decode photo")?;
        self.save(&image)
    }

    pub fn delete(&self, photo_id: &Uuid) {
        for path in [self.thumbnail_path(photo_id), self.full_path(photo_id)] {
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != ErrorKind::NotFound {
                    log_warn!("failed to remove {}: {err}", path.display());
                }
            }
        }
    }

    fn read(&self, path: &Path) -> Option<Vec<u8>> {
        match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                log_warn!("failed to read {}: {err}", path.display());
                None
            }
        }
    }
}

impl PhotoStore for FsPhotoStore {
    fn load_full(&self, photo_id: &Uuid) -> Option<Vec<u8>> {
        self.read(&self.full_path(photo_id))
    }

    fn load_thumbnail(&self, photo_id: &Uuid) -> Option<Vec<u8>> {
        self.read(&self.thumbnail_path(photo_id))
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let rgb = image.to_rgb8();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .context("failed to encode JPEG")?;
    Ok(buffer.into_inner())
}
