//! Evidence attachment handler
//!
//! Uploaded files are checked for type, size and emptiness, then stored
//! content-addressed: the key is the SHA256 of the bytes plus the file
//! extension, and the grievance keeps `/evidence/{key}` as the URL.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info};

use crate::db::schemas::Evidence;
use crate::types::{PortalError, Result};

/// URL prefix evidence is served under
pub const EVIDENCE_URL_PREFIX: &str = "/evidence/";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "heic", "tif", "tiff"];

const PDF: &str = "application/pdf";
const MSWORD: &str = "application/msword";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const OCTET_STREAM: &str = "application/octet-stream";

/// A file taken from a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Type information for an accepted upload
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedType {
    pub mime: String,
    pub extension: String,
}

/// Backend holding evidence bytes by key
#[async_trait]
pub trait EvidenceStorage: Send + Sync {
    /// Store bytes under `key`; storing the same key twice is a no-op
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>>;
}

// =============================================================================
// Local directory backend
// =============================================================================

/// Stores evidence under a root directory, fanned out by key prefix
pub struct LocalEvidenceStorage {
    root_dir: PathBuf,
}

impl LocalEvidenceStorage {
    pub async fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)
            .await
            .map_err(|e| PortalError::Storage(format!("Cannot create {}: {}", root_dir.display(), e)))?;

        info!(path = %root_dir.display(), "Initialized evidence store");
        Ok(Self { root_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let subdir = &key[..2.min(key.len())];
        self.root_dir.join(subdir).join(key)
    }
}

#[async_trait]
impl EvidenceStorage for LocalEvidenceStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if fs::metadata(&path).await.is_ok() {
            debug!(key = %key, "Evidence already stored");
            return Ok(());
        }

        let storage_err = |e: std::io::Error| PortalError::Storage(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(storage_err)?;
        }

        // Write beside the target then rename, so readers never see a partial file
        let partial = path.with_extension(format!("partial-{}", uuid::Uuid::new_v4()));
        fs::write(&partial, bytes).await.map_err(storage_err)?;
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(storage_err(e));
        }

        info!(key = %key, size = bytes.len(), "Stored evidence");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortalError::Storage(format!("Failed to read {}: {}", key, e))),
        }
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Default)]
pub struct MemoryEvidenceStorage {
    files: DashMap<String, Bytes>,
}

impl MemoryEvidenceStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl EvidenceStorage for MemoryEvidenceStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.files
            .entry(key.to_string())
            .or_insert_with(|| Bytes::copy_from_slice(bytes));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.files.get(key).map(|b| b.value().clone()))
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Validates uploads and turns them into Evidence records
#[derive(Clone)]
pub struct EvidenceHandler {
    storage: Arc<dyn EvidenceStorage>,
    max_bytes: usize,
}

impl EvidenceHandler {
    pub fn new(storage: Arc<dyn EvidenceStorage>, max_bytes: usize) -> Self {
        Self { storage, max_bytes }
    }

    /// Check size and type without storing anything
    pub fn validate(&self, file: &UploadedFile) -> Result<AcceptedType> {
        if file.bytes.is_empty() {
            return Err(PortalError::Validation("Uploaded file is empty".into()));
        }
        if file.bytes.len() > self.max_bytes {
            return Err(PortalError::Validation(format!(
                "File exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        accepted_type(file.content_type.as_deref(), file.file_name.as_deref()).ok_or_else(|| {
            PortalError::Validation(
                "Unsupported file type; upload an image, PDF or Word document".into(),
            )
        })
    }

    /// Validate and store a file, returning the Evidence to record
    ///
    /// Nothing about the grievance changes here; a storage failure leaves no trace.
    pub async fn store(&self, file: &UploadedFile, description: &str, uploader: &str) -> Result<Evidence> {
        let accepted = self.validate(file)?;
        let key = format!("{}.{}", content_hash(&file.bytes), accepted.extension);

        self.storage.put(&key, &file.bytes).await.map_err(|e| {
            error!(key = %key, error = %e, "Evidence storage failed");
            match e {
                PortalError::Storage(_) => e,
                other => PortalError::Storage(other.to_string()),
            }
        })?;

        Ok(Evidence {
            url: format!("{}{}", EVIDENCE_URL_PREFIX, key),
            file_type: accepted.mime,
            description: description.trim().to_string(),
            uploaded_by: uploader.to_string(),
            uploaded_at: Utc::now(),
        })
    }

    /// Fetch stored bytes and the content type to serve them with
    pub async fn open(&self, key: &str) -> Result<(Bytes, &'static str)> {
        let not_found = || PortalError::NotFound("Evidence file not found".into());

        let extension = parse_key(key).ok_or_else(not_found)?;
        let bytes = self.storage.get(key).await?.ok_or_else(not_found)?;
        Ok((bytes, mime_for_extension(extension).unwrap_or(OCTET_STREAM)))
    }
}

/// Hex SHA256 of the file contents
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Decide whether a declared type and file name are acceptable evidence
pub fn accepted_type(content_type: Option<&str>, file_name: Option<&str>) -> Option<AcceptedType> {
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let extension = file_name.and_then(extension_of);

    let accepted = |mime: &str, ext: &str| AcceptedType {
        mime: mime.to_string(),
        extension: ext.to_string(),
    };

    match declared.as_str() {
        PDF => Some(accepted(PDF, "pdf")),
        MSWORD => Some(accepted(MSWORD, "doc")),
        DOCX => Some(accepted(DOCX, "docx")),
        "" | OCTET_STREAM => {
            let ext = extension?;
            mime_for_extension(&ext).map(|mime| accepted(mime, &ext))
        }
        image if image.starts_with("image/") => {
            let ext = extension
                .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
                .or_else(|| image_extension_for(image))?;
            Some(accepted(image, &ext))
        }
        _ => None,
    }
}

/// Known content type for an extension
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "pdf" => PDF,
        "doc" => MSWORD,
        "docx" => DOCX,
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

fn image_extension_for(mime: &str) -> Option<String> {
    let subtype = mime.strip_prefix("image/")?;
    let ext = match subtype {
        "jpeg" | "pjpeg" => "jpg",
        "svg+xml" => "svg",
        other if !other.is_empty() && other.chars().all(|c| c.is_ascii_alphanumeric()) => other,
        _ => return None,
    };
    Some(ext.to_string())
}

fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.trim().to_ascii_lowercase();
    (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
}

/// `<64 hex>.<alnum ext>`; returns the extension
fn parse_key(key: &str) -> Option<&str> {
    let (hash, ext) = key.split_once('.')?;
    let hash_ok = hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit());
    let ext_ok = !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric());
    (hash_ok && ext_ok).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, content_type: Option<&str>, bytes: &'static [u8]) -> UploadedFile {
        UploadedFile {
            file_name: Some(name.into()),
            content_type: content_type.map(String::from),
            bytes: Bytes::from_static(bytes),
        }
    }

    fn handler(max: usize) -> (EvidenceHandler, Arc<MemoryEvidenceStorage>) {
        let storage = Arc::new(MemoryEvidenceStorage::new());
        (EvidenceHandler::new(storage.clone(), max), storage)
    }

    #[test]
    fn test_accepted_types() {
        assert_eq!(
            accepted_type(Some("image/png"), Some("pothole.png")).unwrap().extension,
            "png"
        );
        assert_eq!(
            accepted_type(Some("image/jpeg"), Some("upload")).unwrap().extension,
            "jpg"
        );
        assert_eq!(
            accepted_type(Some("application/pdf; charset=binary"), Some("x")).unwrap().mime,
            PDF
        );
        assert_eq!(accepted_type(Some(DOCX), None).unwrap().extension, "docx");
        assert_eq!(
            accepted_type(Some(OCTET_STREAM), Some("Report.DOC")).unwrap(),
            AcceptedType {
                mime: MSWORD.into(),
                extension: "doc".into()
            }
        );
        assert_eq!(accepted_type(None, Some("photo.jpeg")).unwrap().mime, "image/jpeg");
    }

    #[test]
    fn test_rejected_types() {
        assert!(accepted_type(Some("text/html"), Some("a.pdf")).is_none());
        assert!(accepted_type(Some("application/zip"), Some("a.zip")).is_none());
        assert!(accepted_type(Some(OCTET_STREAM), Some("run.exe")).is_none());
        assert!(accepted_type(None, Some("no-extension")).is_none());
    }

    #[tokio::test]
    async fn test_store_produces_content_addressed_url() {
        let (handler, storage) = handler(1024);
        let evidence = handler
            .store(&upload("fixed.jpg", Some("image/jpeg"), b"jpeg bytes"), " after repair ", "officer-1")
            .await
            .unwrap();

        let expected_key = format!("{}.jpg", content_hash(b"jpeg bytes"));
        assert_eq!(evidence.url, format!("/evidence/{}", expected_key));
        assert_eq!(evidence.file_type, "image/jpeg");
        assert_eq!(evidence.description, "after repair");
        assert_eq!(evidence.uploaded_by, "officer-1");
        assert_eq!(storage.len(), 1);

        let (bytes, content_type) = handler.open(&expected_key).await.unwrap();
        assert_eq!(&bytes[..], b"jpeg bytes");
        assert_eq!(content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_empty_and_oversized_files_rejected() {
        let (handler, storage) = handler(4);
        let empty = handler.store(&upload("a.pdf", Some(PDF), b""), "", "o").await;
        assert!(matches!(empty, Err(PortalError::Validation(_))));
        let large = handler.store(&upload("a.pdf", Some(PDF), b"12345"), "", "o").await;
        assert!(matches!(large, Err(PortalError::Validation(_))));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_open_rejects_malformed_keys() {
        let (handler, _) = handler(1024);
        let unknown = format!("{}.pdf", "0".repeat(64));
        for key in ["../../etc/passwd", "abc.pdf", "", unknown.as_str()] {
            assert!(matches!(handler.open(key).await, Err(PortalError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalEvidenceStorage::new(dir.path()).await.unwrap();
        let key = format!("{}.pdf", content_hash(b"%PDF-1.4"));

        storage.put(&key, b"%PDF-1.4").await.unwrap();
        storage.put(&key, b"%PDF-1.4").await.unwrap();

        assert_eq!(storage.get(&key).await.unwrap().unwrap(), Bytes::from_static(b"%PDF-1.4"));
        assert!(dir.path().join(&key[..2]).join(&key).exists());
        assert!(storage.get(&format!("{}.pdf", "a".repeat(64))).await.unwrap().is_none());
    }
}
