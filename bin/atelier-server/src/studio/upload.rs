//! Uploaded image storage.
//!
//! Images are re-encoded as PNG and stored content-addressed under
//! `<uploads>/<user id>/<sha256>.png`. The path relative to the uploads root
//! is what gets persisted in `messages.image_filename`.

use std::io::{Cursor, ErrorKind};
use std::path::{Component, Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid image file")]
    InvalidImage(#[from] image::ImageError),

    #[error("invalid filename")]
    InvalidFilename,

    #[error("upload storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode any supported image and re-encode it as PNG.
///
/// Colour types other than 8-bit RGB/RGBA are converted to RGBA first.
pub fn to_png(bytes: &[u8]) -> Result<Vec<u8>, UploadError> {
    let decoded = image::load_from_memory(bytes)?;
    let image = match decoded {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => decoded,
        other => DynamicImage::ImageRgba8(other.to_rgba8()),
    };
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

/// [`to_png`] on the blocking pool.
pub async fn to_png_blocking(bytes: Vec<u8>) -> Result<Vec<u8>, UploadError> {
    tokio::task::spawn_blocking(move || to_png(&bytes))
        .await
        .map_err(|e| UploadError::Io(std::io::Error::other(e)))?
}

/// Store `png` for `user_id` and return its path relative to `root`.
///
/// An existing file with the same digest is never overwritten; a `_<n>`
/// suffix is appended instead.
pub async fn save_png(root: &Path, user_id: &str, png: &[u8]) -> Result<String, UploadError> {
    let user_dir = root.join(user_id);
    tokio::fs::create_dir_all(&user_dir).await?;

    let digest = hex::encode(Sha256::digest(png));
    let mut name = format!("{digest}.png");
    let mut counter = 1u32;
    loop {
        let path = user_dir.join(&name);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(png).await?;
                file.flush().await?;
                break;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                name = format!("{digest}_{counter}.png");
                counter += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(format!("{user_id}/{name}"))
}

/// Map a client-supplied relative filename onto `root`, rejecting anything
/// that could escape it.
pub fn resolve(root: &Path, filename: &str) -> Result<PathBuf, UploadError> {
    if filename.is_empty() || filename.contains('\\') || filename.contains("..") {
        return Err(UploadError::InvalidFilename);
    }
    let relative = Path::new(filename);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(UploadError::InvalidFilename);
    }
    Ok(root.join(relative))
}

/// Delete every upload of `user_id`. A missing directory is not an error.
pub async fn remove_user_uploads(root: &Path, user_id: &str) -> Result<(), UploadError> {
    match tokio::fs::remove_dir_all(root.join(user_id)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
pub(crate) fn tiny_png() -> Vec<u8> {
    let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, image::Luma([200])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("encode");
    out
}

/// A 3x2 RGB image encoded as `format`.
#[cfg(test)]
pub(crate) fn tiny_image(format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(3, 2, image::Rgb([180, 90, 30])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format)
        .expect("encode");
    out
}
