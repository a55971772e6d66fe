//! Product photo uploads.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{StorefrontError, StorefrontResult};
use crate::storage::{ObjectStorage, UploadOptions};

/// Largest accepted payload (5 MiB)
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_BUCKET: &str = "products";
const FALLBACK_EXTENSION: &str = "bin";

/// A file as received from the caller
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    /// Original client-side name, only its extension is kept
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub file: Option<UploadFile>,
    pub bucket: String,
    /// Empty for the bucket root
    pub folder: String,
}

impl UploadRequest {
    pub fn new(file: Option<UploadFile>) -> Self {
        Self {
            file,
            bucket: DEFAULT_BUCKET.to_string(),
            folder: String::new(),
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub url: String,
    /// Object path inside the bucket
    pub path: String,
}

pub struct FileUploadService<O: ObjectStorage> {
    storage: Option<Arc<O>>,
}

impl<O: ObjectStorage> FileUploadService<O> {
    pub fn new(storage: O) -> Self {
        Self::from_shared(Arc::new(storage))
    }

    pub fn from_shared(storage: Arc<O>) -> Self {
        Self {
            storage: Some(storage),
        }
    }

    pub fn unconfigured() -> Self {
        Self { storage: None }
    }

    fn storage(&self) -> StorefrontResult<&O> {
        self.storage.as_deref().ok_or_else(|| {
            StorefrontError::Configuration("no object storage configured".to_string())
        })
    }

    /// Validate the file, store it under a fresh name and return its public
    /// URL. Never overwrites an existing object.
    #[instrument(skip(self, request), fields(bucket = %request.bucket, folder = %request.folder))]
    pub async fn upload_file(&self, request: UploadRequest) -> StorefrontResult<UploadResult> {
        let file = validate(request.file)?;
        let storage = self.storage()?;

        let path = object_path(&request.folder, &generate_file_name(&file.file_name));
        let options = UploadOptions {
            content_type: file.content_type,
            ..UploadOptions::default()
        };
        let size = file.bytes.len();

        storage
            .upload(&request.bucket, &path, file.bytes, options)
            .await?;

        let url = storage.public_url(&request.bucket, &path);
        info!(%path, size, "File uploaded");
        Ok(UploadResult { url, path })
    }

    #[instrument(skip(self))]
    pub async fn delete_file(&self, bucket: &str, path: &str) -> StorefrontResult<()> {
        self.storage()?
            .remove(bucket, vec![path.to_string()])
            .await?;
        info!(%bucket, %path, "File deleted");
        Ok(())
    }
}

impl<O: ObjectStorage> Clone for FileUploadService<O> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

fn validate(file: Option<UploadFile>) -> StorefrontResult<UploadFile> {
    let file = file.ok_or_else(|| StorefrontError::Validation("no file provided".to_string()))?;
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(StorefrontError::Validation(format!(
            "file is {} bytes, the limit is {MAX_UPLOAD_BYTES}",
            file.size()
        )));
    }
    Ok(file)
}

/// Lowercased extension of `file_name`, `bin` when it has none usable
fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// `{random}_{unix millis}.{ext}` with a 122-bit random component
fn generate_file_name(original: &str) -> String {
    format!(
        "{}_{}.{}",
        Uuid::new_v4().simple(),
        Utc::now().timestamp_millis(),
        extension(original)
    )
}

fn object_path(folder: &str, file_name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{folder}/{file_name}")
    }
}
