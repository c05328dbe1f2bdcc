use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    constants::{IMAGE_FORMATS, RECIPE_IMAGE_DIR},
    error::{Error, HtmlError, TypeError},
};

#[derive(Debug, PartialEq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Decodes `data:image/<format>;base64,<payload>`.
pub fn decode_data_uri(value: &str) -> Result<DecodedImage, TypeError> {
    let (header, payload) = value
        .split_once(";base64,")
        .ok_or_else(|| TypeError::new("Image must be a base64 data URI"))?;
    let format = header
        .strip_prefix("data:image/")
        .ok_or_else(|| TypeError::new("Image must be a base64 data URI"))?
        .to_ascii_lowercase();

    let extension = IMAGE_FORMATS
        .iter()
        .find_map(|(mime, ext)| (*mime == format).then_some(*ext))
        .ok_or_else(|| TypeError::new("Unsupported image format"))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| TypeError::new("Invalid base64 image data"))?;
    if bytes.is_empty() {
        return Err(TypeError::new("The submitted image is empty"));
    }

    Ok(DecodedImage { extension, bytes })
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, url: &str) -> Self {
        let url = match url.ends_with('/') {
            true => url.to_string(),
            false => format!("{url}/"),
        };
        Self {
            root: root.into(),
            url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL for a stored relative path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    pub fn resolve(&self, image: Option<String>) -> Option<String> {
        image.map(|path| self.url_for(&path))
    }

    /// Writes a recipe image and returns its path relative to the media root.
    pub async fn save_recipe_image(&self, data_uri: &str) -> Result<String, Error> {
        let image = decode_data_uri(data_uri).map_err(|e| Error::field("image", &e.to_string()))?;
        let relative = format!(
            "{}/{}.{}",
            RECIPE_IMAGE_DIR,
            uuid::Uuid::new_v4(),
            image.extension
        );

        let dir = self.root.join(RECIPE_IMAGE_DIR);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            log::error!("Could not create {}: {e}", dir.display());
            HtmlError::InternalServerError.new("Could not store image")
        })?;
        tokio::fs::write(self.root.join(&relative), &image.bytes)
            .await
            .map_err(|e| {
                log::error!("Could not write {relative}: {e}");
                HtmlError::InternalServerError.new("Could not store image")
            })?;

        log::trace!("> Stored {relative} ({} bytes)", image.bytes.len());
        Ok(relative)
    }

    /// Best-effort removal; a missing file is not an error.
    pub async fn delete(&self, relative: &str) {
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Could not remove {relative}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_uri() {
        let image = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn maps_jpeg_to_jpg() {
        let image = decode_data_uri("data:image/JPEG;base64,aGVsbG8=").unwrap();
        assert_eq!(image.extension, "jpg");
    }

    #[test]
    fn rejects_bad_images() {
        assert!(decode_data_uri("aGVsbG8=").is_err());
        assert!(decode_data_uri("data:image/svg+xml;base64,aGVsbG8=").is_err());
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
        assert!(decode_data_uri("data:text/plain;base64,aGVsbG8=").is_err());
    }

    #[test]
    fn builds_urls() {
        let storage = MediaStorage::new("/srv/media", "/media");
        assert_eq!(
            storage.url_for("recipes/images/a.png"),
            "/media/recipes/images/a.png"
        );
        assert_eq!(storage.resolve(None), None);
    }

    #[tokio::test]
    async fn saves_and_deletes_recipe_images() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", uuid::Uuid::new_v4()));
        let storage = MediaStorage::new(&root, "/media/");

        let relative = storage
            .save_recipe_image("data:image/gif;base64,R0lGODlh")
            .await
            .unwrap();
        assert!(relative.starts_with("recipes/images/"));
        assert!(relative.ends_with(".gif"));
        assert!(root.join(&relative).exists());

        storage.delete(&relative).await;
        assert!(!root.join(&relative).exists());
        storage.delete(&relative).await;

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
