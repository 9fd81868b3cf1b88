//! Turns raw upload bytes plus caller-supplied fields into everything the
//! store needs: a validated image and merged metadata.

pub mod ingest;
pub mod metadata;

use crate::models::photo::{validate_metadata, PhotoMetadata};
use ingest::{IngestError, ValidatedImage};

#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub image: ValidatedImage,
    pub metadata: PhotoMetadata,
}

/// Validate the file, read its EXIF fields and let `supplied` override them.
pub fn prepare_upload(filename: &str, bytes: &[u8], supplied: PhotoMetadata) -> Result<PreparedUpload, IngestError> {
    let image = ingest::validate_upload(filename, bytes)?;
    let extracted = metadata::extract(bytes);
    let metadata = supplied.or(extracted);
    validate_metadata(&metadata).map_err(IngestError::InvalidMetadata)?;
    Ok(PreparedUpload { image, metadata })
}
