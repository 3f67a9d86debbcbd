//! YAML catalog of stream formats and thumbnail submissions.
//!
//! ```yaml
//! videos:
//!   abc:
//!     formats:
//!       - { url: "https://cdn.example/abc/360.mp4", width: 640, height: 360 }
//!     thumbnail: { timestamp: 12.5, original: false }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use thumbforge_core::{
    Dimensions, FormatResolver, MetadataSource, StreamFormat, ThumbnailTimestamp, VideoId,
};
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub videos: HashMap<VideoId, VideoEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoEntry {
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
    #[serde(default)]
    pub thumbnail: Option<ThumbnailTimestamp>,
}

impl Catalog {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read catalog at {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse catalog at {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Smallest format covering `requested`. Falls back to the largest format
    /// when none covers it, and always picks the largest for any size.
    pub fn pick_format(&self, id: &VideoId, requested: Dimensions) -> Option<StreamFormat> {
        let formats = &self.videos.get(id)?.formats;
        let area = |f: &&StreamFormat| u64::from(f.width) * u64::from(f.height);
        let largest = || formats.iter().max_by_key(area).cloned();
        if requested.is_any() {
            return largest();
        }
        formats
            .iter()
            .filter(|f| f.dimensions().covers(&requested))
            .min_by_key(area)
            .cloned()
            .or_else(largest)
    }
}

/// Resolves formats from a catalog file. `force_fresh` re-reads the file.
#[derive(Clone)]
pub struct CatalogResolver {
    path: PathBuf,
    catalog: Arc<RwLock<Catalog>>,
}

impl CatalogResolver {
    pub fn new(path: impl Into<PathBuf>, catalog: Catalog) -> Self {
        Self {
            path: path.into(),
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FormatResolver for CatalogResolver {
    async fn resolve(
        &self,
        id: &VideoId,
        dimensions: Dimensions,
        force_fresh: bool,
    ) -> Result<Option<StreamFormat>> {
        if force_fresh {
            debug!(path = %self.path.display(), "Reloading catalog");
            let fresh = Catalog::load(&self.path).await?;
            *self
                .catalog
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = fresh;
        }
        Ok(self.catalog().pick_format(id, dimensions))
    }
}

/// Thumbnail submissions from the same catalog.
pub struct CatalogMetadata {
    resolver: CatalogResolver,
}

impl CatalogMetadata {
    pub fn new(resolver: CatalogResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl MetadataSource for CatalogMetadata {
    async fn thumbnail_timestamp(
        &self,
        id: &VideoId,
        _include_unsubmitted: bool,
    ) -> Result<Option<ThumbnailTimestamp>> {
        Ok(self
            .resolver
            .catalog()
            .videos
            .get(id)
            .and_then(|video| video.thumbnail))
    }
}
