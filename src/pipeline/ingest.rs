use image::ImageFormat;
use std::io::Cursor;
use thiserror::Error;

use crate::utils::path::extension_of;

pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no image file was sent")]
    MissingFile,
    #[error("the uploaded file is empty")]
    Empty,
    #[error("filename {0:?} has no extension")]
    MissingExtension(String),
    #[error("unsupported file type .{0} (accepted: jpg, jpeg, png, gif)")]
    UnsupportedExtension(String),
    #[error("file content is not a supported image")]
    NotAnImage,
    #[error("file content is {detected:?} but the extension is .{ext}")]
    FormatMismatch { ext: String, detected: ImageFormat },
    #[error("image could not be decoded: {0}")]
    Undecodable(String),
    #[error("{0}")]
    InvalidMetadata(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedImage {
    pub ext: String,
    pub format: ImageFormat,
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

/// Check that `bytes` really are an image of an accepted type matching the
/// extension of `filename`, and read its dimensions from the header.
pub fn validate_upload(filename: &str, bytes: &[u8]) -> Result<ValidatedImage, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::Empty);
    }
    let ext = extension_of(filename).ok_or_else(|| IngestError::MissingExtension(filename.to_string()))?;
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(IngestError::UnsupportedExtension(ext));
    }
    let declared = ImageFormat::from_extension(&ext).ok_or_else(|| IngestError::UnsupportedExtension(ext.clone()))?;
    let detected = image::guess_format(bytes).map_err(|_| IngestError::NotAnImage)?;
    if detected != declared {
        return Err(IngestError::FormatMismatch { ext, detected });
    }
    let (width, height) = image::io::Reader::with_format(Cursor::new(bytes), detected)
        .into_dimensions()
        .map_err(|e| IngestError::Undecodable(e.to_string()))?;
    let mime = mime_guess::from_ext(&ext).first_or_octet_stream().to_string();
    Ok(ValidatedImage { ext, format: detected, mime, width, height })
}
