use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::identity::domain::image_store::ImageStore;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::{BoxError, StoreError};

/// Extra margin around the face when cropping, as a fraction of the box side.
pub const DEFAULT_CROP_PADDING: f64 = 0.4;

/// Stores snapshots as `<root>/<id>.jpg`; the reference is the file name.
///
/// By default the submitted bytes are written untouched. With cropping
/// enabled the face is cut out as a padded square and re-encoded as JPEG,
/// falling back to the raw bytes when the image cannot be decoded.
#[derive(Debug, Clone)]
pub struct DirectoryImageStore {
    root: PathBuf,
    crop_padding: Option<f64>,
}

impl DirectoryImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            crop_padding: None,
        }
    }

    pub fn with_crop(mut self, padding: f64) -> Self {
        self.crop_padding = Some(padding.max(0.0));
        self
    }

    /// Maps a reference back to a path, rejecting anything that is not a
    /// bare file name.
    fn resolve(&self, image_ref: &str) -> Result<PathBuf, StoreError> {
        let name = Path::new(image_ref);
        let is_bare = name.components().count() == 1
            && name.file_name().is_some_and(|f| f == name.as_os_str());
        if image_ref.is_empty() || !is_bare {
            return Err(StoreError::InvalidReference(image_ref.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn cropped_jpeg(image_bytes: &[u8], bbox: &BoundingBox, padding: f64) -> Option<Vec<u8>> {
        let img = image::load_from_memory(image_bytes)
            .map_err(|e| log::warn!("Cannot decode snapshot for cropping: {e}"))
            .ok()?;
        let (x, y, w, h) = bbox.square_crop(img.width(), img.height(), padding)?;
        let face = img.crop_imm(x, y, w, h).to_rgb8();

        let mut buf = Vec::new();
        face.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Jpeg)
            .map_err(|e| log::warn!("Cannot encode face crop: {e}"))
            .ok()?;
        Some(buf)
    }
}

impl ImageStore for DirectoryImageStore {
    fn store(&self, image_bytes: &[u8], bbox: &BoundingBox, id: &str) -> Result<String, BoxError> {
        let image_ref = format!("{id}.jpg");
        let path = self.resolve(&image_ref)?;
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Write {
            path: self.root.clone(),
            source,
        })?;

        let cropped = self
            .crop_padding
            .and_then(|padding| Self::cropped_jpeg(image_bytes, bbox, padding));
        let data = cropped.as_deref().unwrap_or(image_bytes);

        fs::write(&path, data).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        log::debug!("Saved face image to {}", path.display());
        Ok(image_ref)
    }

    fn exists(&self, image_ref: &str) -> bool {
        self.resolve(image_ref).is_ok_and(|p| p.is_file())
    }

    fn remove(&self, image_ref: &str) -> Result<(), BoxError> {
        let path = self.resolve(image_ref)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write { path, source }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use rstest::rstest;
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([50, 100, 200]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(20.0, 20.0, 60.0, 60.0)
    }

    #[test]
    fn test_store_writes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryImageStore::new(dir.path().join("faces"));
        let image_ref = store.store(b"raw-bytes", &bbox(), "abc").unwrap();

        assert_eq!(image_ref, "abc.jpg");
        assert!(store.exists(&image_ref));
        assert_eq!(fs::read(dir.path().join("faces/abc.jpg")).unwrap(), b"raw-bytes");
    }

    #[test]
    fn test_store_with_crop_writes_square_face() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryImageStore::new(dir.path()).with_crop(0.0);
        let image_ref = store.store(&png_bytes(100, 100), &bbox(), "face").unwrap();

        let saved = image::open(dir.path().join(image_ref)).unwrap();
        assert_eq!(saved.width(), 40);
        assert_eq!(saved.height(), 40);
    }

    #[test]
    fn test_crop_falls_back_to_raw_bytes_when_undecodable() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryImageStore::new(dir.path()).with_crop(0.4);
        let image_ref = store.store(b"garbage", &bbox(), "x").unwrap();
        assert_eq!(fs::read(dir.path().join(image_ref)).unwrap(), b"garbage");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryImageStore::new(dir.path());
        let image_ref = store.store(b"x", &bbox(), "gone").unwrap();
        store.remove(&image_ref).unwrap();
        assert!(!store.exists(&image_ref));
        store.remove(&image_ref).unwrap();
    }

    #[rstest]
    #[case("")]
    #[case("../escape.jpg")]
    #[case("nested/face.jpg")]
    #[case("/etc/passwd")]
    fn test_rejects_non_bare_references(#[case] image_ref: &str) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryImageStore::new(dir.path());
        assert!(!store.exists(image_ref));
        assert!(store.remove(image_ref).is_err());
    }
}
