//! Resource operations over a user's virtual file tree.
//!
//! Every operation validates the request, resolves the user-scoped keys and
//! then runs a plain sequence of store calls. Nothing is locked across keys:
//! multi-object operations (move, directory delete) can be interrupted half
//! way, which is reported through [`Error::Incomplete`].

use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info};

use crate::{
    archive::ArchiveBundler,
    directory::DirectoryMarkers,
    error::{Error, Result},
    guard,
    models::{AuthenticatedUser, DownloadResult, ResourceDescriptor, UploadFile},
    path,
    storage::{ObjectStoreGateway, DEFAULT_CONTENT_TYPE},
};

/// Download name of the user's whole tree.
const ROOT_ARCHIVE_NAME: &str = "files.zip";

#[derive(Clone)]
pub struct ResourceService {
    gateway: Arc<ObjectStoreGateway>,
    directories: DirectoryMarkers,
    archives: ArchiveBundler,
}

/// Keys of one request, already scoped to the calling user.
struct UserScope {
    root: String,
    user_id: i64,
}

impl UserScope {
    fn new(user_id: i64) -> Self {
        Self {
            root: path::user_root_path(user_id),
            user_id,
        }
    }

    fn key(&self, relative: &str) -> String {
        path::full_user_path(self.user_id, relative)
    }

    fn directory_key(&self, relative: &str) -> String {
        path::normalize(&self.key(relative))
    }

    fn is_root(&self, key: &str) -> bool {
        key == self.root
    }

    fn describe(&self, key: &str, size: Option<u64>) -> ResourceDescriptor {
        ResourceDescriptor::from_key(key, &self.root, size)
    }
}

impl ResourceService {
    pub fn new(gateway: Arc<ObjectStoreGateway>) -> Self {
        Self {
            directories: DirectoryMarkers::new(Arc::clone(&gateway)),
            archives: ArchiveBundler::new(Arc::clone(&gateway)),
            gateway,
        }
    }

    pub fn gateway(&self) -> &Arc<ObjectStoreGateway> {
        &self.gateway
    }

    pub async fn get_info(
        &self,
        resource: &str,
        user: Option<&AuthenticatedUser>,
    ) -> Result<ResourceDescriptor> {
        let scope = UserScope::new(guard::validate(user, &[resource])?);
        let key = scope.key(resource);

        if path::is_directory_path(&key) {
            if !self.directory_exists(&scope, &key).await? {
                return Err(Error::ResourceNotFound(resource.to_string()));
            }
            return Ok(scope.describe(&key, None));
        }

        let stat = self
            .gateway
            .stat_object(&key)
            .await?
            .ok_or_else(|| Error::ResourceNotFound(resource.to_string()))?;
        Ok(scope.describe(&key, Some(stat.size)))
    }

    pub async fn delete(&self, resource: &str, user: Option<&AuthenticatedUser>) -> Result<()> {
        let scope = UserScope::new(guard::validate(user, &[resource])?);
        let key = scope.key(resource);

        if scope.is_root(&key) {
            return Err(Error::IncorrectPath("the root directory cannot be deleted".to_string()));
        }

        if path::is_directory_path(&key) {
            let keys: Vec<String> = self
                .gateway
                .collect_objects(&key, true)
                .await?
                .into_iter()
                .map(|entry| entry.key)
                .collect();
            if keys.is_empty() {
                return Err(Error::ResourceNotFound(resource.to_string()));
            }

            self.remove_all("delete", &keys, 0, keys.len()).await?;
            info!(user_id = scope.user_id, key = %key, objects = keys.len(), "Deleted directory");
            return Ok(());
        }

        if !self.gateway.object_exists(&key).await? {
            return Err(Error::ResourceNotFound(resource.to_string()));
        }
        self.gateway.remove_object(&key).await?;
        info!(user_id = scope.user_id, key = %key, "Deleted file");
        Ok(())
    }

    /// Moves or renames a file or directory by copying every object to the
    /// new location and then deleting the originals.
    pub async fn move_resource(
        &self,
        from: &str,
        to: &str,
        user: Option<&AuthenticatedUser>,
    ) -> Result<ResourceDescriptor> {
        let scope = UserScope::new(guard::validate(user, &[from, to])?);
        let source = scope.key(from);
        let target = scope.key(to);
        let is_directory = path::is_directory_path(&source);

        if scope.is_root(&source) || scope.is_root(&target) {
            return Err(Error::IncorrectPath("the root directory cannot be moved".to_string()));
        }
        if is_directory != path::is_directory_path(&target) {
            return Err(Error::IncorrectPath(format!(
                "cannot move {} to {}: source and target must both be files or both be directories",
                from, to
            )));
        }
        if is_directory && target != source && target.starts_with(&source) {
            return Err(Error::IncorrectPath(format!(
                "cannot move {} into itself",
                from
            )));
        }

        if !self.resource_exists(&scope, &source).await? {
            return Err(Error::ResourceNotFound(from.to_string()));
        }

        let target_parent = path::parent_path(&target);
        if !self.directory_exists(&scope, &target_parent).await? {
            return Err(Error::ResourceNotFound(format!(
                "target directory does not exist: {}",
                path::relative_to_root(&target_parent, &scope.root)
            )));
        }
        // A file may not take the name of a folder, explicit or implicit.
        if self.resource_exists(&scope, &target).await?
            || (!is_directory && self.directories.is_directory(&target).await?)
        {
            return Err(Error::ResourceAlreadyExists(to.to_string()));
        }

        let sources: Vec<String> = if is_directory {
            self.gateway
                .collect_objects(&source, true)
                .await?
                .into_iter()
                .map(|entry| entry.key)
                .collect()
        } else {
            vec![source.clone()]
        };

        // Copies and removals both count as steps of the move.
        let total = sources.len() * 2;
        for (copied, key) in sources.iter().enumerate() {
            let destination = format!("{}{}", target, &key[source.len()..]);
            if let Err(e) = self.gateway.copy_object(key, &destination).await {
                return Err(Error::incomplete("move", copied, total, e));
            }
        }
        self.remove_all("move", &sources, sources.len(), total).await?;

        info!(
            user_id = scope.user_id,
            from = %source,
            to = %target,
            objects = sources.len(),
            "Moved resource"
        );

        if is_directory {
            return Ok(scope.describe(&target, None));
        }
        let stat = self.gateway.stat_object(&target).await?.ok_or_else(|| {
            Error::OperationFailed(format!("moved object disappeared: {}", to))
        })?;
        Ok(scope.describe(&target, Some(stat.size)))
    }

    /// Case-insensitive substring search over every path in the user's tree.
    pub async fn search(
        &self,
        query: &str,
        user: Option<&AuthenticatedUser>,
    ) -> Result<Vec<ResourceDescriptor>> {
        let scope = UserScope::new(guard::validate(user, &[query])?);
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(Error::InvalidRequest("search query must not be empty".to_string()));
        }

        let results: Vec<ResourceDescriptor> = self
            .gateway
            .collect_objects(&scope.root, true)
            .await?
            .into_iter()
            .filter(|entry| !scope.is_root(&entry.key))
            .filter(|entry| {
                path::relative_to_root(&entry.key, &scope.root)
                    .to_lowercase()
                    .contains(&needle)
            })
            .map(|entry| scope.describe(&entry.key, Some(entry.size)))
            .collect();

        debug!(user_id = scope.user_id, query = %query, hits = results.len(), "Search finished");
        Ok(results)
    }

    /// Stores each file below `target`, recreating the sub-directories named
    /// in its relative path. Stops at the first failure; files written
    /// before it stay in place.
    pub async fn upload(
        &self,
        files: Vec<UploadFile>,
        target: &str,
        user: Option<&AuthenticatedUser>,
    ) -> Result<Vec<ResourceDescriptor>> {
        let user_id = guard::validate(user, &[target])?;
        let scope = UserScope::new(user_id);
        if files.is_empty() {
            return Err(Error::InvalidRequest("no files to upload".to_string()));
        }

        let base = scope.directory_key(target);
        let mut uploaded = Vec::with_capacity(files.len());

        for file in files {
            let relative = file.relative_path.replace('\\', "/");
            let relative = relative.trim().trim_start_matches('/');
            guard::validate_path(relative)?;
            if relative.is_empty() || path::is_directory_path(relative) {
                return Err(Error::IncorrectPath(format!(
                    "invalid file name: {:?}",
                    file.relative_path
                )));
            }

            let key = format!("{}{}", base, relative);
            if self.gateway.object_exists(&key).await? {
                return Err(Error::ResourceAlreadyExists(format!(
                    "{}{}",
                    path::relative_to_root(&base, &scope.root),
                    relative
                )));
            }

            self.directories.ensure_ancestors(&key).await?;

            let size = file.data.len() as u64;
            let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
            self.gateway.put_object(&key, file.data, content_type).await?;

            info!(user_id, key = %key, size, "Uploaded file");
            uploaded.push(scope.describe(&key, Some(size)));
        }

        Ok(uploaded)
    }

    pub async fn create_empty_folder(
        &self,
        folder: &str,
        user: Option<&AuthenticatedUser>,
    ) -> Result<ResourceDescriptor> {
        let scope = UserScope::new(guard::validate(user, &[folder])?);
        let key = scope.directory_key(folder);

        if scope.is_root(&key) {
            return Err(Error::ResourceAlreadyExists("/".to_string()));
        }

        let parent = path::parent_path(&key);
        if !self.directory_exists(&scope, &parent).await? {
            return Err(Error::ResourceNotFound(format!(
                "parent directory does not exist: {}",
                path::relative_to_root(&parent, &scope.root)
            )));
        }
        if self.directories.is_directory_exists(&key).await? {
            return Err(Error::ResourceAlreadyExists(folder.to_string()));
        }

        self.directories.create_directory_object(&key).await?;
        info!(user_id = scope.user_id, key = %key, "Created folder");
        Ok(scope.describe(&key, None))
    }

    /// Immediate children of a directory. Deeper keys collapse into one
    /// directory entry per child folder.
    pub async fn list_directory(
        &self,
        directory: &str,
        user: Option<&AuthenticatedUser>,
    ) -> Result<Vec<ResourceDescriptor>> {
        let scope = UserScope::new(guard::validate(user, &[directory])?);
        self.ensure_user_root(&scope).await?;

        let key = scope.directory_key(directory);
        if !self.directory_exists(&scope, &key).await? {
            return Err(Error::ResourceNotFound(directory.to_string()));
        }

        let mut seen = HashSet::new();
        let mut children = Vec::new();
        for entry in self.gateway.collect_objects(&key, false).await? {
            let Some(child) = entry.key.strip_prefix(&key) else {
                continue;
            };
            if child.is_empty() {
                continue;
            }

            let descriptor = match child.find(path::SEPARATOR) {
                Some(index) => scope.describe(&entry.key[..key.len() + index + 1], None),
                None => scope.describe(&entry.key, Some(entry.size)),
            };
            if seen.insert(descriptor.name.clone()) {
                children.push(descriptor);
            }
        }

        Ok(children)
    }

    /// Raw bytes for a file, a zip archive for a directory.
    pub async fn download(
        &self,
        resource: &str,
        user: Option<&AuthenticatedUser>,
    ) -> Result<DownloadResult> {
        let scope = UserScope::new(guard::validate(user, &[resource])?);
        let key = scope.key(resource);

        if path::is_directory_path(&key) {
            if !self.directory_exists(&scope, &key).await? {
                return Err(Error::ResourceNotFound(resource.to_string()));
            }
            let mut archive = self.archives.download_directory(&key).await?;
            if scope.is_root(&key) {
                archive.filename = ROOT_ARCHIVE_NAME.to_string();
            }
            return Ok(archive);
        }

        if !self.gateway.object_exists(&key).await? {
            return Err(Error::ResourceNotFound(resource.to_string()));
        }
        let data = self.gateway.get_object(&key).await?;
        Ok(DownloadResult {
            data,
            content_type: DEFAULT_CONTENT_TYPE,
            filename: path::resource_name(&key).to_string(),
        })
    }

    async fn ensure_user_root(&self, scope: &UserScope) -> Result<()> {
        self.gateway.ensure_bucket().await?;
        if !self.directories.is_directory_exists(&scope.root).await? {
            self.directories.create_directory_object(&scope.root).await?;
        }
        Ok(())
    }

    /// The user's root counts as present even before its marker is written.
    async fn directory_exists(&self, scope: &UserScope, key: &str) -> Result<bool> {
        if key.is_empty() || scope.is_root(key) {
            return Ok(true);
        }
        self.directories.is_directory_exists(key).await
    }

    async fn resource_exists(&self, scope: &UserScope, key: &str) -> Result<bool> {
        if path::is_directory_path(key) {
            self.directory_exists(scope, key).await
        } else {
            self.gateway.object_exists(key).await
        }
    }

    /// Removes `keys` in order; `offset` earlier steps of `operation` have
    /// already been applied out of `total`.
    async fn remove_all(
        &self,
        operation: &'static str,
        keys: &[String],
        offset: usize,
        total: usize,
    ) -> Result<()> {
        for (removed, key) in keys.iter().enumerate() {
            if let Err(e) = self.gateway.remove_object(key).await {
                return Err(Error::incomplete(operation, offset + removed, total, e));
            }
        }
        Ok(())
    }
}
