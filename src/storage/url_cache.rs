//! JSON cache of discovered article URLs

use crate::CrawlError;
use std::path::{Path, PathBuf};

/// A file holding a JSON array of article URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCache {
    path: PathBuf,
}

impl UrlCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached URLs
    ///
    /// # Returns
    ///
    /// * `Ok(Some(urls))` - The cache file exists and holds a URL list
    /// * `Ok(None)` - No cache file yet
    /// * `Err(CrawlError)` - The file could not be read or is not a JSON string array
    pub fn load(&self) -> Result<Option<Vec<String>>, CrawlError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let urls: Vec<String> = serde_json::from_str(&content)?;
        tracing::info!("Loaded {} URLs from {}", urls.len(), self.path.display());
        Ok(Some(urls))
    }

    /// Writes `urls`, creating parent directories as needed
    pub fn save(&self, urls: &[String]) -> Result<(), CrawlError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(urls)?;
        std::fs::write(&self.path, json)?;
        tracing::info!("Saved {} URLs to {}", urls.len(), self.path.display());
        Ok(())
    }

    /// Removes the cache file if present
    pub fn clear(&self) -> Result<(), CrawlError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
