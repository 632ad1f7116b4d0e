//! Zip bundling of a directory subtree for download.

use std::{
    io::{Cursor, Write},
    sync::Arc,
};
use tracing::{debug, warn};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{
    error::{Error, Result},
    models::DownloadResult,
    path,
    storage::ObjectStoreGateway,
};

pub const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Clone)]
pub struct ArchiveBundler {
    gateway: Arc<ObjectStoreGateway>,
}

impl ArchiveBundler {
    pub fn new(gateway: Arc<ObjectStoreGateway>) -> Self {
        Self { gateway }
    }

    /// Packs every object below `directory` into a zip archive. Entry names
    /// are the keys relative to `directory`; nested markers become directory
    /// entries. Any unreadable member fails the whole archive.
    pub async fn download_directory(&self, directory: &str) -> Result<DownloadResult> {
        let directory = path::as_directory(directory);
        let entries = self
            .gateway
            .collect_objects(&directory, true)
            .await
            .map_err(|e| Error::OperationFailed(format!("failed to list {}: {}", directory, e)))?;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut files = 0usize;

        for entry in &entries {
            let name = path::relative_to_root(&entry.key, &directory);
            if name.is_empty() {
                continue;
            }

            if path::is_directory_path(name) {
                writer.add_directory(name, options)?;
                continue;
            }

            let data = self.gateway.get_object(&entry.key).await.map_err(|e| {
                warn!(key = %entry.key, error = %e, "Aborting archive on unreadable member");
                Error::OperationFailed(format!("failed to package {}: {}", entry.key, e))
            })?;

            writer.start_file(name, options)?;
            writer.write_all(&data)?;
            files += 1;
        }

        let archive = writer.finish()?.into_inner();
        debug!(
            directory = %directory,
            files,
            bytes = archive.len(),
            "Built directory archive"
        );

        Ok(DownloadResult {
            data: archive.into(),
            content_type: ZIP_CONTENT_TYPE,
            filename: format!("{}.zip", path::resource_name(&directory)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use bytes::Bytes;
    use std::io::Read;
    use zip::ZipArchive;

    async fn bundler_with(objects: &[(&str, &str)]) -> ArchiveBundler {
        let gateway = Arc::new(ObjectStoreGateway::new(Arc::new(MemoryStore::with_bucket())));
        for (key, body) in objects {
            gateway
                .put_object(key, Bytes::from(body.to_string()), "text/plain")
                .await
                .unwrap();
        }
        ArchiveBundler::new(gateway)
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<Bytes>>, name: &str) -> String {
        let mut content = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    #[tokio::test]
    async fn archives_subtree_with_relative_names() {
        let bundler = bundler_with(&[
            ("u/proj/", ""),
            ("u/proj/notes.txt", "0123456789"),
            ("u/proj/src/", ""),
            ("u/proj/src/main.rs", "fn main() {}"),
            ("u/other.txt", "not included"),
        ])
        .await;

        let result = bundler.download_directory("u/proj/").await.unwrap();
        assert_eq!(result.filename, "proj.zip");
        assert_eq!(result.content_type, ZIP_CONTENT_TYPE);

        let mut archive = ZipArchive::new(Cursor::new(result.data)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["notes.txt", "src/", "src/main.rs"]);
        assert_eq!(read_entry(&mut archive, "notes.txt"), "0123456789");
        assert_eq!(read_entry(&mut archive, "src/main.rs"), "fn main() {}");
    }

    #[tokio::test]
    async fn empty_directory_gives_empty_archive() {
        let bundler = bundler_with(&[("u/empty/", "")]).await;
        let result = bundler.download_directory("u/empty").await.unwrap();
        assert_eq!(result.filename, "empty.zip");

        let archive = ZipArchive::new(Cursor::new(result.data)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
