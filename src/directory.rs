//! Directories on top of a store that has none.
//!
//! A directory exists if a zero-byte marker object sits at its slashed key,
//! or if any object lives below that prefix.

use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

use crate::{error::Result, path, storage::ObjectStoreGateway};

/// Content type stamped on marker objects.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

#[derive(Clone)]
pub struct DirectoryMarkers {
    gateway: Arc<ObjectStoreGateway>,
}

impl DirectoryMarkers {
    pub fn new(gateway: Arc<ObjectStoreGateway>) -> Self {
        Self { gateway }
    }

    pub async fn is_directory_exists(&self, directory: &str) -> Result<bool> {
        if directory.is_empty() {
            return Ok(true);
        }

        let normalized = path::as_directory(directory);
        if self.gateway.object_exists(&normalized).await? {
            return Ok(true);
        }
        self.gateway.has_entries(&normalized).await
    }

    pub async fn create_directory_object(&self, directory: &str) -> Result<()> {
        let normalized = path::as_directory(directory);
        self.gateway
            .put_object(&normalized, Bytes::new(), DIRECTORY_CONTENT_TYPE)
            .await?;
        debug!(key = %normalized, "Created directory marker");
        Ok(())
    }

    /// A key is a directory if it is spelled as one, or if anything is
    /// stored below `key/`.
    pub async fn is_directory(&self, key: &str) -> Result<bool> {
        if path::is_directory_path(key) {
            return Ok(true);
        }
        self.gateway.has_entries(&path::as_directory(key)).await
    }

    /// Materializes a marker for every missing ancestor of `key`, outermost
    /// first. Returns how many markers were written.
    pub async fn ensure_ancestors(&self, key: &str) -> Result<usize> {
        let mut created = 0;
        for ancestor in path::ancestors(key) {
            if !self.is_directory_exists(&ancestor).await? {
                self.create_directory_object(&ancestor).await?;
                created += 1;
            }
        }
        Ok(created)
    }
}
