use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::Fetcher;
use crate::error::FetchError;

/// Fetcher reading objects from a directory on the local filesystem.
///
/// Identifiers are relative paths below the root. Identifiers that are
/// absolute or contain `..` are reported as not found, so nothing outside the
/// root is ever read.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an identifier to a path below the root.
    fn resolve(&self, identifier: &str) -> Result<PathBuf, FetchError> {
        let mut path = self.root.clone();
        let mut depth = 0;

        for component in Path::new(identifier).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FetchError::NotFound(identifier.to_string()));
                }
            }
        }

        if depth == 0 {
            return Err(FetchError::NotFound(identifier.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, identifier: &str) -> Result<Bytes, FetchError> {
        let path = self.resolve(identifier)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FetchError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(FetchError::Transfer(format!("{}: {}", path.display(), e))),
        }
    }
}
