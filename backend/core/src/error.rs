use thiserror::Error;

/// Rejections surfaced by the frame renderer.
///
/// "No playable stream" is not represented here: it is an `Ok(None)` outcome.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A concurrent operation already produced an equivalent rendered frame.
    #[error("superseded: an equivalent frame was already rendered")]
    Superseded,

    #[error("failed to render after {attempts} decode attempts")]
    ExhaustedRetries { attempts: u32 },

    /// The entry this caller was waiting on was removed before it rendered.
    #[error("render entry was abandoned before completion")]
    Abandoned,

    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}
