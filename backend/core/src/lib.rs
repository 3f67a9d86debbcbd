pub mod error;
pub mod traits;
pub mod types;

pub use error::RenderError;
pub use traits::{
    DecodeBackend, DecodeEvent, DecodeSession, FormatResolver, MetadataSource, PlaybackState,
};
pub use types::{Dimensions, RenderKey, StreamFormat, ThumbnailTimestamp, VideoId};
