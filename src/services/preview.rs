use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::Engine;

/// Base64-encode a client-held image for inline preview. No network involved.
pub fn encode_for_preview<R: Read>(mut source: R) -> Result<String, PreviewError> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

pub fn encode_file_for_preview(path: &Path) -> Result<String, PreviewError> {
    let file = File::open(path)?;
    encode_for_preview(file)
}

pub fn to_data_url(mime_type: &str, encoded: &str) -> String {
    format!("data:{};base64,{}", mime_type, encoded)
}

/// Data URL for raw image bytes, with the MIME type sniffed from the content.
pub fn preview_data_url(bytes: &[u8]) -> Result<String, PreviewError> {
    let mime = image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    Ok(to_data_url(mime, &encode_for_preview(bytes)?))
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Preview source could not be read: {0}")]
    Read(#[from] std::io::Error),
}
