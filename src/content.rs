//! JSON content collections served under the API prefix.
//!
//! Each collection is one `{name}.json` file in the content directory.

use anyhow::Context;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Collection names, sorted. A missing directory is an empty store.
    pub async fn list(&self) -> Result<Vec<String>, AppError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Content directory {} does not exist", self.dir.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to read {}", self.dir.display()))
                    .into())
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to list content directory")?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                if is_valid_name(name) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    pub async fn load(&self, name: &str) -> Result<Value, AppError> {
        if !is_valid_name(name) {
            return Err(AppError::NotFound(format!("collection '{}'", name)));
        }

        let path = self.dir.join(format!("{}.json", name));
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("collection '{}'", name)))
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to read {}", path.display()))
                    .into())
            }
        };

        debug!("Loaded collection {} ({} bytes)", name, raw.len());
        let document: Value = serde_json::from_slice(&raw)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        Ok(document)
    }

    /// Every collection, for cache warm-up. Unreadable files are skipped.
    pub async fn all_documents(&self) -> Result<Vec<Value>, AppError> {
        let mut documents = Vec::new();
        for name in self.list().await? {
            match self.load(&name).await {
                Ok(document) => documents.push(document),
                Err(e) => warn!("Skipping collection {}: {}", name, e),
            }
        }
        Ok(documents)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
