use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a video; the primary dimension of every cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for VideoId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Pixel dimensions of a request, a stream, or a decoded frame.
///
/// `(0, 0)` is the "any size" request: it is satisfied by whatever
/// resolution is available first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const ANY: Dimensions = Dimensions { width: 0, height: 0 };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_any(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// True when a source of these dimensions satisfies `requested`.
    pub fn covers(&self, requested: &Dimensions) -> bool {
        requested.is_any() || (self.width >= requested.width && self.height >= requested.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A playable stream descriptor returned by a [`crate::FormatResolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl StreamFormat {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Custom thumbnail timestamp metadata for a video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailTimestamp {
    /// Seconds into the video.
    pub timestamp: f64,
    /// When true the original (uploader) thumbnail should be shown instead.
    #[serde(default)]
    pub original: bool,
}

/// Key of one render entry inside a video's bucket.
///
/// Timestamps compare by exact value; `-0.0` and `0.0` are folded together.
#[derive(Debug, Clone, Copy)]
pub struct RenderKey {
    pub dimensions: Dimensions,
    pub timestamp: f64,
}

impl RenderKey {
    pub fn new(dimensions: Dimensions, timestamp: f64) -> Self {
        Self { dimensions, timestamp }
    }

    fn timestamp_bits(&self) -> u64 {
        if self.timestamp == 0.0 {
            0
        } else {
            self.timestamp.to_bits()
        }
    }
}

impl PartialEq for RenderKey {
    fn eq(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions && self.timestamp_bits() == other.timestamp_bits()
    }
}

impl Eq for RenderKey {}

impl Hash for RenderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dimensions.hash(state);
        self.timestamp_bits().hash(state);
    }
}

impl fmt::Display for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}s", self.dimensions, self.timestamp)
    }
}
