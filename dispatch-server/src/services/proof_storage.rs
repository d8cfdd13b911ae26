//! Proof-of-delivery image storage
//!
//! Uploaded photos are validated, re-encoded to JPEG and stored under
//! `{work_dir}/uploads/proofs/{sha256}.jpg`. The file name doubles as the
//! evidence reference written onto the order, so identical uploads share
//! one file.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Supported upload formats
const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// JPEG quality for stored proofs
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Empty file provided")]
    Empty,

    #[error("Unsupported file format '{0}'. Supported: png, jpg, jpeg, webp")]
    UnsupportedFormat(String),

    #[error("Invalid image file: {0}")]
    InvalidImage(String),

    #[error("Invalid proof reference: {0}")]
    InvalidReference(String),

    #[error("Proof not found: {0}")]
    NotFound(String),

    #[error("Proof storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Proof storage failure: {0}")]
    Backend(String),
}

/// Stores delivery evidence and resolves references
#[async_trait]
pub trait ProofStorage: Send + Sync {
    /// Validate and persist an uploaded image; returns the reference
    async fn store(&self, bytes: Vec<u8>, filename: &str) -> Result<String, ProofError>;

    /// Whether `reference` names a stored proof
    async fn exists(&self, reference: &str) -> Result<bool, ProofError>;

    /// Stored bytes (JPEG)
    async fn read(&self, reference: &str) -> Result<Vec<u8>, ProofError>;
}

/// Filesystem-backed proof storage
#[derive(Debug, Clone)]
pub struct LocalProofStorage {
    dir: PathBuf,
    max_size: usize,
}

impl LocalProofStorage {
    pub fn new(dir: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_size,
        }
    }

    fn path_for(&self, reference: &str) -> Result<PathBuf, ProofError> {
        validate_reference(reference)?;
        Ok(self.dir.join(reference))
    }
}

/// References are bare file names: no separators, no parent components
fn validate_reference(reference: &str) -> Result<(), ProofError> {
    if reference.is_empty()
        || reference.contains("..")
        || reference.contains('/')
        || reference.contains('\\')
    {
        return Err(ProofError::InvalidReference(reference.to_string()));
    }
    Ok(())
}

fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Size, extension and decodability checks
fn validate_upload(data: &[u8], filename: &str, max_size: usize) -> Result<(), ProofError> {
    if data.is_empty() {
        return Err(ProofError::Empty);
    }
    if data.len() > max_size {
        return Err(ProofError::TooLarge {
            size: data.len(),
            max: max_size,
        });
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(ProofError::UnsupportedFormat(ext));
    }
    Ok(())
}

/// Decode and re-encode as JPEG
fn compress_image(data: &[u8]) -> Result<Vec<u8>, ProofError> {
    let img = image::load_from_memory(data).map_err(|e| ProofError::InvalidImage(e.to_string()))?;

    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let rgb_img = img.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
        rgb_img
            .write_with_encoder(encoder)
            .map_err(|e| ProofError::Backend(format!("Failed to compress image: {e}")))?;
    }
    Ok(buffer)
}

/// Write to a temp file in `dir`, then rename onto `path`
///
/// A reference only ever names a complete file; an interrupted write leaves
/// a `.tmp` file behind instead.
async fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> Result<(), ProofError> {
    let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&tmp, data).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ProofStorage for LocalProofStorage {
    async fn store(&self, bytes: Vec<u8>, filename: &str) -> Result<String, ProofError> {
        validate_upload(&bytes, filename, self.max_size)?;

        let compressed = tokio::task::spawn_blocking(move || compress_image(&bytes))
            .await
            .map_err(|e| ProofError::Backend(format!("Image worker failed: {e}")))??;

        let reference = format!("{}.jpg", calculate_hash(&compressed));
        let path = self.dir.join(&reference);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(reference = %reference, "Duplicate proof upload, reusing stored file");
            return Ok(reference);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        write_atomic(&self.dir, &path, &compressed).await?;

        tracing::info!(
            original_name = %filename,
            size = compressed.len(),
            reference = %reference,
            "Delivery proof stored"
        );
        Ok(reference)
    }

    async fn exists(&self, reference: &str) -> Result<bool, ProofError> {
        let path = self.path_for(reference)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn read(&self, reference: &str) -> Result<Vec<u8>, ProofError> {
        let path = self.path_for(reference)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProofError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
