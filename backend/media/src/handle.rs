use std::fmt;

use thumbforge_core::{Dimensions, DecodeSession};

/// Exclusive ownership of one decode session.
///
/// Not `Clone`: moving the handle is the only way to hand a session to another
/// render entry. Dropping it releases the session.
pub struct DecodeHandle {
    session: Box<dyn DecodeSession>,
    url: String,
}

impl DecodeHandle {
    pub fn new(session: Box<dyn DecodeSession>, url: impl Into<String>) -> Self {
        Self {
            session,
            url: url.into(),
        }
    }

    pub fn session(&self) -> &dyn DecodeSession {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> &mut dyn DecodeSession {
        self.session.as_mut()
    }

    pub fn native_dimensions(&self) -> Dimensions {
        self.session.native_dimensions()
    }

    /// Start a seek on the underlying session.
    pub fn seek(&mut self, time: f64) {
        self.session.seek(time);
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DecodeHandle {
    fn drop(&mut self) {
        self.session.release();
    }
}

impl fmt::Debug for DecodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeHandle")
            .field("url", &self.url)
            .field("native", &self.session.native_dimensions())
            .finish()
    }
}
