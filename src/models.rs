use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::path;

/// Identity handed over by the authentication layer in front of this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    File,
    Directory,
}

/// Client-facing view of a file or directory. Built fresh from store state on
/// every request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Parent directory relative to the user's root, e.g. `docs/`.
    pub path: String,
    /// Leaf name; directories carry a trailing slash.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
}

impl ResourceDescriptor {
    /// Projects an object key inside `root` into a descriptor. Keys ending in
    /// `/` become directories and lose their size.
    pub fn from_key(key: &str, root: &str, size: Option<u64>) -> Self {
        let relative = path::relative_to_root(key, root);
        let parent = path::parent_path(relative);
        let name = path::resource_name(relative);

        if relative.is_empty() || path::is_directory_path(relative) {
            Self {
                path: parent,
                name: format!("{}{}", name, path::SEPARATOR),
                size: None,
                kind: ResourceKind::Directory,
            }
        } else {
            Self {
                path: parent,
                name: name.to_string(),
                size: Some(size.unwrap_or(0)),
                kind: ResourceKind::File,
            }
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }
}

/// One file of a multi-file upload. `relative_path` may contain
/// sub-directories, which are recreated below the upload target.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub relative_path: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(relative_path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content_type: None,
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub data: Bytes,
    pub content_type: &'static str,
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "user-1-files/";

    #[test]
    fn file_descriptor_is_relative_to_root() {
        let descriptor = ResourceDescriptor::from_key("user-1-files/docs/a.txt", ROOT, Some(10));
        assert_eq!(descriptor.path, "docs/");
        assert_eq!(descriptor.name, "a.txt");
        assert_eq!(descriptor.size, Some(10));
        assert_eq!(descriptor.kind, ResourceKind::File);
    }

    #[test]
    fn directory_descriptor_has_no_size() {
        let descriptor = ResourceDescriptor::from_key("user-1-files/docs/work/", ROOT, Some(0));
        assert_eq!(descriptor.path, "docs/");
        assert_eq!(descriptor.name, "work/");
        assert_eq!(descriptor.size, None);
        assert!(descriptor.is_directory());
    }

    #[test]
    fn root_projects_to_empty_directory() {
        let descriptor = ResourceDescriptor::from_key(ROOT, ROOT, None);
        assert_eq!(descriptor.path, "");
        assert_eq!(descriptor.name, "/");
        assert!(descriptor.is_directory());
    }

    #[test]
    fn serializes_like_the_api_expects() {
        let file = ResourceDescriptor::from_key("user-1-files/a.txt", ROOT, Some(3));
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], "FILE");
        assert_eq!(json["size"], 3);

        let dir = ResourceDescriptor::from_key("user-1-files/a/", ROOT, None);
        let json = serde_json::to_value(&dir).unwrap();
        assert_eq!(json["type"], "DIRECTORY");
        assert!(json.get("size").is_none());
    }
}
