//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use thumbforge_core::{
    DecodeBackend, DecodeEvent, DecodeSession, Dimensions, FormatResolver, MetadataSource,
    PlaybackState, StreamFormat, ThumbnailTimestamp, VideoId,
};
use tokio::time::Instant;

const SEEK_DELAY: Duration = Duration::from_millis(10);

fn format(width: u32, height: u32) -> StreamFormat {
    StreamFormat {
        url: format!("https://cdn.test/{width}x{height}.mp4?sig=secret"),
        width,
        height,
    }
}

pub struct FakeResolver {
    by_request: Vec<(Dimensions, StreamFormat)>,
    fallback: Option<StreamFormat>,
    fresh_returns_none: bool,
    calls: AtomicUsize,
    forced: AtomicUsize,
}

impl FakeResolver {
    /// Always resolves to a `width`x`height` stream.
    pub fn fixed(width: u32, height: u32) -> Self {
        Self {
            by_request: Vec::new(),
            fallback: Some(format(width, height)),
            fresh_returns_none: false,
            calls: AtomicUsize::new(0),
            forced: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            fallback: None,
            ..Self::fixed(0, 0)
        }
    }

    /// Resolves each requested size to the paired stream size; anything else has no stream.
    pub fn by_request(pairs: Vec<(Dimensions, (u32, u32))>) -> Self {
        Self {
            by_request: pairs
                .into_iter()
                .map(|(requested, (w, h))| (requested, format(w, h)))
                .collect(),
            ..Self::empty()
        }
    }

    pub fn fresh_returns_none(mut self) -> Self {
        self.fresh_returns_none = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn forced_calls(&self) -> usize {
        self.forced.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FormatResolver for FakeResolver {
    async fn resolve(
        &self,
        _id: &VideoId,
        dimensions: Dimensions,
        force_fresh: bool,
    ) -> Result<Option<StreamFormat>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if force_fresh {
            self.forced.fetch_add(1, Ordering::SeqCst);
            if self.fresh_returns_none {
                return Ok(None);
            }
        }
        let matched = self
            .by_request
            .iter()
            .find(|(requested, _)| *requested == dimensions)
            .map(|(_, format)| format.clone());
        Ok(matched.or_else(|| self.fallback.clone()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Frame { width: u32, height: u32 },
    Fail,
}

/// Behaviour of one scripted decode session.
#[derive(Debug, Clone, Copy)]
pub struct SessionScript {
    outcome: Outcome,
    load_delay: Duration,
    not_ready_polls: u32,
}

impl SessionScript {
    pub fn ok(width: u32, height: u32) -> Self {
        Self {
            outcome: Outcome::Frame { width, height },
            load_delay: Duration::from_millis(10),
            not_ready_polls: 0,
        }
    }

    pub fn fail() -> Self {
        Self {
            outcome: Outcome::Fail,
            load_delay: Duration::from_millis(5),
            not_ready_polls: 0,
        }
    }

    pub fn loading_for(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Report no current frame for the first `polls` readiness checks after loading.
    pub fn not_ready_for(mut self, polls: u32) -> Self {
        self.not_ready_polls = polls;
        self
    }
}

pub struct ScriptedBackend {
    script: Mutex<VecDeque<SessionScript>>,
    default: SessionScript,
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
    seeks: Arc<Mutex<Vec<f64>>>,
}

impl ScriptedBackend {
    /// Every session follows `default`.
    pub fn new(default: SessionScript) -> Self {
        Self::scripted(Vec::new(), default)
    }

    /// Sessions follow `script` in order, then `default`.
    pub fn scripted(script: Vec<SessionScript>, default: SessionScript) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            opened: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            seeks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecodeBackend for ScriptedBackend {
    async fn open(&self, _url: &str, _start_time: f64) -> Result<Box<dyn DecodeSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().pop_front().unwrap_or(self.default);
        let first = match script.outcome {
            Outcome::Frame { .. } => DecodeEvent::Loaded,
            Outcome::Fail => DecodeEvent::Error("scripted decode failure".into()),
        };
        Ok(Box::new(ScriptedSession {
            script,
            next: Some((Instant::now() + script.load_delay, first)),
            loaded: false,
            seeking: false,
            not_ready: AtomicU32::new(script.not_ready_polls),
            is_released: false,
            released: Arc::clone(&self.released),
            seeks: Arc::clone(&self.seeks),
        }))
    }
}

struct ScriptedSession {
    script: SessionScript,
    next: Option<(Instant, DecodeEvent)>,
    loaded: bool,
    seeking: bool,
    not_ready: AtomicU32,
    is_released: bool,
    released: Arc<AtomicUsize>,
    seeks: Arc<Mutex<Vec<f64>>>,
}

#[async_trait]
impl DecodeSession for ScriptedSession {
    async fn next_event(&mut self) -> DecodeEvent {
        let deadline = match &self.next {
            Some((deadline, _)) => *deadline,
            None => return std::future::pending().await,
        };
        tokio::time::sleep_until(deadline).await;
        let Some((_, event)) = self.next.take() else {
            return std::future::pending().await;
        };
        match event {
            DecodeEvent::Loaded => self.loaded = true,
            DecodeEvent::Seeked => {
                self.loaded = true;
                self.seeking = false;
            }
            DecodeEvent::Error(_) => {}
        }
        event
    }

    fn state(&self) -> PlaybackState {
        let mut has_current_frame = self.loaded;
        if has_current_frame && !self.seeking {
            let remaining = self.not_ready.load(Ordering::SeqCst);
            if remaining > 0 {
                self.not_ready.store(remaining - 1, Ordering::SeqCst);
                has_current_frame = false;
            }
        }
        PlaybackState {
            has_current_frame,
            seeking: self.seeking,
        }
    }

    fn seek(&mut self, time: f64) {
        self.seeks.lock().unwrap().push(time);
        self.seeking = true;
        self.next = Some((Instant::now() + SEEK_DELAY, DecodeEvent::Seeked));
    }

    fn native_dimensions(&self) -> Dimensions {
        match (self.loaded, self.script.outcome) {
            (true, Outcome::Frame { width, height }) => Dimensions::new(width, height),
            _ => Dimensions::ANY,
        }
    }

    fn capture(&self) -> Result<RgbaImage> {
        match self.script.outcome {
            Outcome::Frame { width, height } => {
                Ok(RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255])))
            }
            Outcome::Fail => bail!("no frame decoded"),
        }
    }

    fn release(&mut self) {
        if !self.is_released {
            self.is_released = true;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeMetadata {
    result: std::result::Result<Option<ThumbnailTimestamp>, String>,
    calls: AtomicUsize,
}

impl FakeMetadata {
    pub fn custom(timestamp: f64) -> Self {
        Self::with(Ok(Some(ThumbnailTimestamp {
            timestamp,
            original: false,
        })))
    }

    pub fn original() -> Self {
        Self::with(Ok(Some(ThumbnailTimestamp {
            timestamp: 0.0,
            original: true,
        })))
    }

    pub fn missing() -> Self {
        Self::with(Ok(None))
    }

    pub fn failing() -> Self {
        Self::with(Err("metadata service unavailable".into()))
    }

    fn with(result: std::result::Result<Option<ThumbnailTimestamp>, String>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn thumbnail_timestamp(
        &self,
        _id: &VideoId,
        _include_unsubmitted: bool,
    ) -> Result<Option<ThumbnailTimestamp>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(value) => Ok(*value),
            Err(message) => bail!("{message}"),
        }
    }
}
