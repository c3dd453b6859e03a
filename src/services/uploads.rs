//! Files uploaded by admins: multipart intake, storage under the uploads
//! root, and the gallery image pipeline.

use axum::extract::Multipart;
use chrono::Utc;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DOCUMENTS: &str = "documents";
pub const GALLERY: &str = "galerie";
pub const AVATARS: &str = "avatars";
pub const EXCEL: &str = "excel";

pub const MAX_IMAGE_WIDTH: u32 = 1920;
pub const JPEG_QUALITY: u8 = 80;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Missing file field '{0}'")]
    MissingFile(&'static str),

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Malformed multipart body: {0}")]
    Malformed(String),

    #[error("Invalid file name '{0}'")]
    InvalidName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A multipart body split into text fields and file parts.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Read the whole body, refusing any file part above `max_file_bytes`.
    pub async fn read(multipart: &mut Multipart, max_file_bytes: usize) -> Result<Self, UploadError> {
        let mut form = Self::default();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let value = field.text().await.map_err(|e| UploadError::Malformed(e.to_string()))?;
                form.fields.insert(name, value);
                continue;
            };
            let content_type = field.content_type().map(str::to_string);

            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| UploadError::Malformed(e.to_string()))?
            {
                if bytes.len() + chunk.len() > max_file_bytes {
                    return Err(UploadError::TooLarge { limit: max_file_bytes });
                }
                bytes.extend_from_slice(&chunk);
            }

            debug!(field = %name, file = %file_name, bytes = bytes.len(), "multipart file received");
            form.files.insert(
                name,
                UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                },
            );
        }

        Ok(form)
    }

    /// Trimmed text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn take_file(&mut self, name: &'static str) -> Result<UploadedFile, UploadError> {
        let file = self.files.remove(name).ok_or(UploadError::MissingFile(name))?;
        if file.bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        Ok(file)
    }
}

/// Every character outside `[A-Za-z0-9.]` becomes `-`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect()
}

/// `{millis}-{sanitized original}`, unique enough for admin uploads.
pub fn timestamped_name(original: &str) -> String {
    format!("{}-{}", Utc::now().timestamp_millis(), sanitize_file_name(original))
}

pub fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
    pub size: u64,
}

/// Folders under the uploads root, served publicly at `/uploads`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    fn file_path(&self, folder: &str, file_name: &str) -> Result<PathBuf, UploadError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with("..") {
            return Err(UploadError::InvalidName(file_name.to_string()));
        }
        Ok(self.dir(folder).join(file_name))
    }

    pub async fn save(&self, folder: &str, file_name: &str, bytes: &[u8]) -> Result<StoredFile, UploadError> {
        let path = self.file_path(folder, file_name)?;
        tokio::fs::create_dir_all(self.dir(folder)).await?;
        tokio::fs::write(&path, bytes).await?;

        Ok(StoredFile {
            url: format!("/uploads/{}/{}", folder, file_name),
            file_name: file_name.to_string(),
            size: bytes.len() as u64,
            path,
        })
    }

    pub async fn read(&self, folder: &str, file_name: &str) -> Result<Vec<u8>, UploadError> {
        let path = self.file_path(folder, file_name)?;
        Ok(tokio::fs::read(path).await?)
    }

    /// Remove a stored file. A missing file only logs a warning.
    pub async fn remove(&self, folder: &str, file_name: &str) {
        let path = match self.file_path(folder, file_name) {
            Ok(path) => path,
            Err(e) => {
                warn!("Refusing to delete upload: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), "Uploaded file could not be deleted: {}", e);
        }
    }
}

/// An image ready to be written: possibly resized and re-encoded.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "png",
            ImageFormat::WebP => "webp",
            _ => "jpg",
        }
    }
}

/// Sniff the real format; only JPEG, PNG and WebP are accepted.
pub fn detect_image(bytes: &[u8]) -> Result<ImageFormat, UploadError> {
    let format = image::guess_format(bytes).map_err(|e| UploadError::InvalidImage(e.to_string()))?;
    match format {
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP => Ok(format),
        other => Err(UploadError::UnsupportedType(format!("{:?}", other).to_lowercase())),
    }
}

/// Cap the width at [`MAX_IMAGE_WIDTH`] keeping the aspect ratio. JPEGs are
/// always re-encoded at [`JPEG_QUALITY`]; other formats are only re-encoded
/// when resized. CPU bound, call from `spawn_blocking`.
pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage, UploadError> {
    let format = detect_image(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| UploadError::InvalidImage(e.to_string()))?;

    let resized = img.width() > MAX_IMAGE_WIDTH;
    let img = if resized {
        img.resize(MAX_IMAGE_WIDTH, u32::MAX, FilterType::Lanczos3)
    } else {
        img
    };
    let (width, height) = (img.width(), img.height());

    let bytes = match format {
        ImageFormat::Jpeg => encode_jpeg(&img)?,
        _ if resized => {
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, format)
                .map_err(|e| UploadError::InvalidImage(e.to_string()))?;
            out.into_inner()
        }
        _ => bytes.to_vec(),
    };

    Ok(PreparedImage {
        bytes,
        format,
        width,
        height,
    })
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, UploadError> {
    let mut out = Vec::new();
    let rgb = img.to_rgb8();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| UploadError::InvalidImage(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("Fiche PSC1 (2025).pdf"), "Fiche-PSC1--2025-.pdf");
        assert_eq!(sanitize_file_name("été.docx"), "-t-.docx");
        assert!(timestamped_name("a b.pdf").ends_with("-a-b.pdf"));
    }

    #[test]
    fn mime_by_extension() {
        assert_eq!(mime_for("x.PDF"), "application/pdf");
        assert_eq!(mime_for("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for("archive"), "application/octet-stream");
    }

    #[test]
    fn wide_images_are_resized_keeping_ratio() {
        let prepared = prepare_image(&png(2400, 1200)).unwrap();
        assert_eq!(prepared.width, MAX_IMAGE_WIDTH);
        assert_eq!(prepared.height, 960);
        assert_eq!(prepared.format, ImageFormat::Png);
        assert_eq!(detect_image(&prepared.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn small_png_is_kept_as_is() {
        let original = png(64, 32);
        let prepared = prepare_image(&original).unwrap();
        assert_eq!(prepared.bytes, original);
        assert_eq!(prepared.extension(), "png");
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(matches!(
            prepare_image(b"%PDF-1.7 not an image"),
            Err(UploadError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn store_round_trip_and_missing_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let stored = store.save(DOCUMENTS, "1-doc.pdf", b"%PDF").await.unwrap();
        assert_eq!(stored.url, "/uploads/documents/1-doc.pdf");
        assert_eq!(stored.size, 4);
        assert_eq!(store.read(DOCUMENTS, "1-doc.pdf").await.unwrap(), b"%PDF");

        store.remove(DOCUMENTS, "1-doc.pdf").await;
        assert!(!stored.path.exists());
        // second delete only warns
        store.remove(DOCUMENTS, "1-doc.pdf").await;

        assert!(matches!(
            store.save(DOCUMENTS, "../escape", b"x").await,
            Err(UploadError::InvalidName(_))
        ));
    }
}
