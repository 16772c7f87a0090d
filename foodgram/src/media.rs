//! Uploaded image handling.
//!
//! Clients send images inline as data URIs (`data:image/png;base64,iVBOR...`). [`DecodedImage`]
//! parses and sanity-checks them; [`MediaStorage`] writes them under the configured media root
//! with a random file name and turns stored relative paths back into absolute URLs served from
//! `/media/`.

use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::Error;

/// Accepted image formats, by file extension
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "gif", "webp", "bmp"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("Invalid image format. Expected data:image/<type>;base64,<data>")]
    Malformed,

    #[error("Unsupported image type '{0}'. Allowed types: png, jpg, gif, webp, bmp")]
    UnsupportedType(String),

    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    NotAnImage,
}

/// A decoded data URI image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Parse `data:image/<type>;base64,<payload>`.
    pub fn parse(data: &str) -> Result<Self, ImageError> {
        let (header, payload) = data
            .strip_prefix("data:image/")
            .and_then(|rest| rest.split_once(";base64,"))
            .ok_or(ImageError::Malformed)?;

        let subtype = header.to_ascii_lowercase();
        let extension = match subtype.as_str() {
            "jpeg" | "jpg" | "pjpeg" => "jpg",
            other => ALLOWED_EXTENSIONS
                .iter()
                .copied()
                .find(|ext| *ext == other)
                .ok_or_else(|| ImageError::UnsupportedType(other.to_string()))?,
        };

        // Some clients wrap long payloads
        let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = general_purpose::STANDARD
            .decode(payload.as_bytes())
            .map_err(|_| ImageError::Malformed)?;

        if !looks_like_image(&bytes) {
            return Err(ImageError::NotAnImage);
        }

        Ok(Self { extension, bytes })
    }
}

/// Magic number check for the accepted formats
fn looks_like_image(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\x89PNG\r\n\x1a\n")
        || bytes.starts_with(&[0xFF, 0xD8, 0xFF])
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || (bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP")
        || bytes.starts_with(b"BM")
}

/// Directory under the media root an image belongs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDir {
    RecipeImages,
    Avatars,
}

impl MediaDir {
    fn as_str(self) -> &'static str {
        match self {
            MediaDir::RecipeImages => "recipes/images",
            MediaDir::Avatars => "users/avatars",
        }
    }
}

/// Filesystem-backed media storage
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    base_url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: &Url) -> Self {
        Self {
            root: root.into(),
            base_url: format!("{}/media", public_url.as_str().trim_end_matches('/')),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.media_root.clone(), &config.public_url)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute URL of a stored file
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Write an image and return its path relative to the media root
    pub async fn save(&self, image: &DecodedImage, dir: MediaDir) -> Result<String, Error> {
        let relative = format!("{}/{}.{}", dir.as_str(), Uuid::new_v4(), image.extension);
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Error::Internal {
                operation: format!("create media directory {}: {e}", parent.display()),
            })?;
        }
        tokio::fs::write(&target, &image.bytes).await.map_err(|e| Error::Internal {
            operation: format!("write media file {}: {e}", target.display()),
        })?;

        debug!("Stored {} bytes at {}", image.bytes.len(), relative);
        Ok(relative)
    }

    /// Delete a stored file. Failures are logged and otherwise ignored.
    pub async fn remove(&self, path: &str) {
        if path.is_empty() || Path::new(path).components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            warn!("Refusing to remove media path {:?}", path);
            return;
        }

        let target = self.root.join(path);
        if let Err(e) = tokio::fs::remove_file(&target).await {
            warn!("Failed to remove media file {}: {}", target.display(), e);
        }
    }
}
