use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{Display, EnumIter, EnumString};

/// Which derived image of a job to fetch.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, EnumIter, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageKind {
    Baseline,
    Current,
    Combined,
}

/// A client-held image to upload with a new job.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { file_name, bytes })
    }

    pub fn mime_type(&self) -> &'static str {
        image::guess_format(&self.bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
    }
}

/// An image fetched from the backend, owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedImage {
    pub job_id: String,
    pub kind: ImageKind,
    bytes: Vec<u8>,
    format: Option<ImageFormat>,
}

impl RetrievedImage {
    pub fn new(job_id: impl Into<String>, kind: ImageKind, bytes: Vec<u8>) -> Self {
        let format = image::guess_format(&bytes).ok();
        Self {
            job_id: job_id.into(),
            kind,
            bytes,
            format,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Format sniffed from the magic bytes, if recognizable.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
    }

    /// Decode into pixels for display.
    pub fn decode(&self) -> Result<DynamicImage, image::ImageError> {
        match self.format {
            Some(format) => image::load_from_memory_with_format(&self.bytes, format),
            None => image::load_from_memory(&self.bytes),
        }
    }

    /// File name to use when saving this image locally.
    pub fn file_name(&self) -> String {
        let ext = self
            .format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin");
        format!("{}_{}.{}", self.job_id, self.kind, ext)
    }
}

/// The before/after images of a finished job.
///
/// The backend serves the annotated rendering at the baseline and current
/// endpoints, so the plain and annotated slots hold the same resource.
#[derive(Debug, Clone)]
pub struct ImageSet {
    pub before_image: RetrievedImage,
    pub after_image: RetrievedImage,
    pub before_image_annotated: RetrievedImage,
    pub after_image_annotated: RetrievedImage,
}

impl ImageSet {
    pub fn from_pair(baseline: RetrievedImage, current: RetrievedImage) -> Self {
        Self {
            before_image_annotated: baseline.clone(),
            after_image_annotated: current.clone(),
            before_image: baseline,
            after_image: current,
        }
    }
}
