// ABOUTME: Image blob storage behind an async trait
// ABOUTME: Disk backend with path-traversal-safe keys, in-memory backend for tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Media Store
//!
//! Blob storage for uploaded meal photos. The wider platform owns upload
//! handling and S3 replication; the analysis core only needs to read (and in
//! tests, write) image bytes by storage key, so the seam is a small async
//! trait with a disk backend for deployments and an in-memory backend for
//! tests.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::errors::{AppError, AppResult};

/// Blob store abstraction for image bytes
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Store bytes under a key, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unsafe or the write fails
    async fn save(&self, key: &str, bytes: &[u8]) -> AppResult<()>;

    /// Load the bytes stored under a key
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unsafe, missing, or the read fails
    async fn load(&self, key: &str) -> AppResult<Vec<u8>>;

    /// Check whether a key exists
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unsafe
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Delete the bytes stored under a key; deleting a missing key is not an
    /// error
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unsafe or the delete fails
    async fn delete(&self, key: &str) -> AppResult<()>;
}

/// Disk-backed image store rooted at a configured directory
pub struct DiskImageStore {
    root: PathBuf,
}

impl DiskImageStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Join a storage key under the root, rejecting keys that would escape
    /// it (absolute paths, parent-directory components, empty keys).
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        if key.is_empty() {
            return Err(AppError::invalid_input("Storage key must not be empty"));
        }

        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                Component::CurDir
                | Component::ParentDir
                | Component::RootDir
                | Component::Prefix(_) => {
                    return Err(AppError::invalid_input(format!(
                        "Storage key escapes the media root: {key}"
                    )));
                }
            }
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl ImageStore for DiskImageStore {
    async fn save(&self, key: &str, bytes: &[u8]) -> AppResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage(format!("Failed to create media dir: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::storage(format!("Failed to write media blob '{key}': {e}")))?;
        Ok(())
    }

    async fn load(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::not_found(format!("Media blob '{key}'")))
            }
            Err(e) => Err(AppError::storage(format!(
                "Failed to read media blob '{key}': {e}"
            ))),
        }
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage(format!(
                "Failed to delete media blob '{key}': {e}"
            ))),
        }
    }
}

/// In-memory image store for tests
#[derive(Default, Clone)]
pub struct MemoryImageStore {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryImageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ImageStore for MemoryImageStore {
    async fn save(&self, key: &str, bytes: &[u8]) -> AppResult<()> {
        self.files
            .write()
            .await
            .insert(key.to_owned(), bytes.to_vec());
        Ok(())
    }

    async fn load(&self, key: &str) -> AppResult<Vec<u8>> {
        self.files
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Media blob '{key}'")))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.files.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.files.write().await.remove(key);
        Ok(())
    }
}
