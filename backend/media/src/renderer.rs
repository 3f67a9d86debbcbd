//! Frame renderer: one decode-and-extract cycle per call, with cache reuse,
//! request coalescing, and bounded retries.
//!
//! A render moves through these stages:
//!
//! 1. Probe the cache. A rendered entry at the exact timestamp is returned
//!    immediately; a pending one is waited on. Otherwise a retained decode
//!    session at a covering resolution is taken over and seeked.
//! 2. Resolve a stream format when nothing could be reused.
//! 3. Claim the pending entry, decode, poll readiness, and capture.
//! 4. On decode errors, re-resolve with `force_fresh` and retry until the
//!    policy is exhausted, then evict the pending entry.
//!
//! All cache mutation happens with the lock held between suspension points,
//! never across one.

use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;
use thumbforge_core::{
    DecodeBackend, DecodeEvent, Dimensions, FormatResolver, RenderError, RenderKey, StreamFormat,
    VideoId,
};
use thumbforge_logging::{RenderEvent, RenderEventLogger};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::cache::{CacheBucket, Claim, RenderCache};
use crate::frame::RenderedFrame;
use crate::handle::DecodeHandle;
use crate::retry::{RetryPolicy, RetryState};

/// Identity of one in-flight render call.
#[derive(Debug, Clone, Copy)]
struct Job<'a> {
    id: &'a VideoId,
    requested: Dimensions,
    timestamp: f64,
    retain: bool,
    owner: Uuid,
    started: Instant,
}

impl Job<'_> {
    fn log(&self, event: RenderEvent) {
        RenderEventLogger::log_event(self.id.as_str(), self.timestamp, event);
    }

    fn quality(&self) -> &'static str {
        if self.requested.is_any() { "smaller" } else { "full" }
    }
}

/// What the cache probe decided.
enum Probe {
    Hit(Arc<RenderedFrame>),
    Wait(oneshot::Receiver<Arc<RenderedFrame>>),
    Reuse { handle: DecodeHandle, key: RenderKey },
    Miss,
}

/// Result of driving one decode session.
enum DecodeStep {
    Captured { image: RgbaImage, handle: DecodeHandle },
    Superseded(Arc<RenderedFrame>),
    Failed(String),
}

/// Ownership of a claimed pending entry.
///
/// Dropping the guard without `disarm` abandons the entry, so a render future
/// dropped mid-decode never leaves a pending entry behind for others to join.
struct PendingGuard {
    cache: Arc<RenderCache>,
    id: VideoId,
    key: RenderKey,
    owner: Uuid,
    armed: bool,
}

impl PendingGuard {
    fn new(cache: &Arc<RenderCache>, job: &Job<'_>, key: RenderKey) -> Self {
        Self {
            cache: Arc::clone(cache),
            id: job.id.clone(),
            key,
            owner: job.owner,
            armed: true,
        }
    }

    /// The entry was completed or superseded; nothing left to clean up.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.cache.lock();
        if let Some(bucket) = state.lookup(&self.id) {
            if bucket.abandon(self.key, self.owner) {
                debug!(video_id = %self.id, "Abandoned pending render entry");
            }
        }
    }
}

/// Where the next decode attempt gets its session from.
enum Source {
    Reused(DecodeHandle),
    Stream(String),
}

pub struct FrameRenderer {
    cache: Arc<RenderCache>,
    resolver: Arc<dyn FormatResolver>,
    backend: Arc<dyn DecodeBackend>,
    policy: RetryPolicy,
}

impl FrameRenderer {
    pub fn new(
        cache: Arc<RenderCache>,
        resolver: Arc<dyn FormatResolver>,
        backend: Arc<dyn DecodeBackend>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            resolver,
            backend,
            policy,
        }
    }

    pub fn cache(&self) -> &Arc<RenderCache> {
        &self.cache
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Render the frame of `id` at `timestamp`, at `requested` resolution or better.
    ///
    /// `Ok(None)` means no playable stream exists. The returned frame carries the
    /// decoder's native resolution, which callers must rescale. With
    /// `retain_decode_handle` the decode session stays cached so later requests
    /// for other timestamps can seek instead of re-opening the stream.
    pub async fn render(
        &self,
        id: &VideoId,
        requested: Dimensions,
        retain_decode_handle: bool,
        timestamp: f64,
    ) -> Result<Option<Arc<RenderedFrame>>, RenderError> {
        let job = Job {
            id,
            requested,
            timestamp,
            retain: retain_decode_handle,
            owner: Uuid::new_v4(),
            started: Instant::now(),
        };

        let (source, pending) = match self.probe(&job) {
            Probe::Hit(frame) => {
                job.log(RenderEvent::CacheHit {
                    width: frame.width(),
                    height: frame.height(),
                });
                return Ok(Some(frame));
            }
            Probe::Wait(rx) => return wait_for(rx).await.map(Some),
            Probe::Reuse { handle, key } => {
                (Source::Reused(handle), PendingGuard::new(&self.cache, &job, key))
            }
            Probe::Miss => {
                let Some(format) = self.resolve(&job, false).await else {
                    return Ok(None);
                };
                let key = RenderKey::new(format.dimensions(), timestamp);
                match self.claim(&job, key) {
                    Claim::Owner => (
                        Source::Stream(format.url),
                        PendingGuard::new(&self.cache, &job, key),
                    ),
                    Claim::Joined(rx) => {
                        self.cache.record_coalesced();
                        job.log(RenderEvent::Coalesced {
                            width: key.dimensions.width,
                            height: key.dimensions.height,
                        });
                        return wait_for(rx).await.map(Some);
                    }
                    Claim::Ready(frame) => {
                        self.cache.record_hit();
                        return Ok(Some(frame));
                    }
                }
            }
        };

        self.decode_with_retry(&job, source, pending).await
    }

    /// Inspect the bucket for a hit, an in-flight decode, or a reusable session.
    fn probe(&self, job: &Job<'_>) -> Probe {
        let mut state = self.cache.lock();
        let Some(bucket) = state.lookup(job.id) else {
            return Probe::Miss;
        };
        if bucket.is_empty() {
            return Probe::Miss;
        }

        let candidates = bucket.candidates(job.requested);
        if let Some(key) = CacheBucket::find_by_exact_timestamp(&candidates, job.timestamp) {
            if let Some(frame) = bucket.get(&key).and_then(|entry| entry.frame()).cloned() {
                self.cache.record_hit();
                return Probe::Hit(frame);
            }
            if let Some(rx) = bucket.register_waiter(&key) {
                self.cache.record_coalesced();
                job.log(RenderEvent::Coalesced {
                    width: key.dimensions.width,
                    height: key.dimensions.height,
                });
                return Probe::Wait(rx);
            }
        }

        let Some(source_key) = candidates.iter().find(|key| bucket.has_retained_handle(key)).copied()
        else {
            return Probe::Miss;
        };
        let key = RenderKey::new(source_key.dimensions, job.timestamp);
        match bucket.claim(key, job.owner) {
            Claim::Owner => match bucket.take_retained_handle(&source_key) {
                Some(handle) => {
                    self.cache.record_reuse();
                    job.log(RenderEvent::Reused {
                        width: key.dimensions.width,
                        height: key.dimensions.height,
                    });
                    Probe::Reuse { handle, key }
                }
                None => {
                    bucket.abandon(key, job.owner);
                    Probe::Miss
                }
            },
            Claim::Joined(rx) => {
                self.cache.record_coalesced();
                Probe::Wait(rx)
            }
            Claim::Ready(frame) => {
                self.cache.record_hit();
                Probe::Hit(frame)
            }
        }
    }

    fn claim(&self, job: &Job<'_>, key: RenderKey) -> Claim {
        let mut state = self.cache.lock();
        state.get_or_create_bucket(job.id).claim(key, job.owner)
    }

    /// Ask the resolver for a stream. Resolver failures count as "no stream".
    async fn resolve(&self, job: &Job<'_>, force_fresh: bool) -> Option<StreamFormat> {
        match self.resolver.resolve(job.id, job.requested, force_fresh).await {
            Ok(format) => {
                if format.is_none() {
                    debug!(video_id = %job.id, requested = %job.requested, force_fresh, "No playable format");
                }
                format
            }
            Err(e) => {
                warn!(video_id = %job.id, force_fresh, error = %e, "Format resolution failed");
                None
            }
        }
    }

    async fn decode_with_retry(
        &self,
        job: &Job<'_>,
        mut source: Source,
        mut pending: PendingGuard,
    ) -> Result<Option<Arc<RenderedFrame>>, RenderError> {
        let mut retry = RetryState::default();

        loop {
            let attempt = retry.attempt + 1;
            let step = match source {
                Source::Reused(mut handle) => {
                    handle.seek(job.timestamp);
                    self.drive(job, handle).await
                }
                Source::Stream(ref url) => {
                    job.log(RenderEvent::DecodeStarted {
                        url: url.clone(),
                        attempt,
                    });
                    match self.backend.open(url, job.timestamp).await {
                        Ok(session) => self.drive(job, DecodeHandle::new(session, url.clone())).await,
                        Err(e) => DecodeStep::Failed(format!("{e:#}")),
                    }
                }
            };

            match step {
                DecodeStep::Captured { image, handle } => {
                    let frame = self.finish(job, pending.key, image, handle);
                    pending.disarm();
                    return Ok(Some(frame));
                }
                DecodeStep::Superseded(winner) => {
                    self.cache
                        .lock()
                        .get_or_create_bucket(job.id)
                        .supersede(pending.key, job.owner, &winner);
                    pending.disarm();
                    job.log(RenderEvent::Superseded);
                    return Err(RenderError::Superseded);
                }
                DecodeStep::Failed(message) => {
                    if !retry.record_failure(&self.policy, &message) {
                        drop(pending);
                        job.log(RenderEvent::Failed {
                            attempts: retry.attempt,
                        });
                        return Err(RenderError::ExhaustedRetries {
                            attempts: retry.attempt,
                        });
                    }
                    job.log(RenderEvent::Retrying {
                        attempt: retry.attempt,
                        error_msg: message,
                    });
                    match self.resolve(job, true).await {
                        Some(format) => source = Source::Stream(format.url),
                        None => {
                            drop(pending);
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    /// Wait for the session to load, poll until a frame is current, and capture it.
    async fn drive(&self, job: &Job<'_>, mut handle: DecodeHandle) -> DecodeStep {
        match handle.session_mut().next_event().await {
            DecodeEvent::Loaded | DecodeEvent::Seeked => {}
            DecodeEvent::Error(message) => return DecodeStep::Failed(message),
        }

        loop {
            if let Some(winner) = self.superseding_frame(job) {
                handle.release();
                return DecodeStep::Superseded(winner);
            }

            let state = handle.session().state();
            trace!(
                video_id = %job.id,
                has_current_frame = state.has_current_frame,
                seeking = state.seeking,
                "Decode readiness"
            );
            if state.is_ready() {
                break;
            }

            match tokio::time::timeout(self.policy.poll_interval, handle.session_mut().next_event()).await {
                Ok(DecodeEvent::Error(message)) => return DecodeStep::Failed(message),
                Ok(_) | Err(_) => continue,
            }
        }

        match handle.session().capture() {
            Ok(image) => DecodeStep::Captured { image, handle },
            Err(e) => DecodeStep::Failed(format!("{e:#}")),
        }
    }

    /// A frame rendered by someone else that already satisfies this job.
    fn superseding_frame(&self, job: &Job<'_>) -> Option<Arc<RenderedFrame>> {
        let state = self.cache.lock();
        state
            .peek(job.id)?
            .find_rendered_covering(job.requested, job.timestamp)
    }

    fn finish(
        &self,
        job: &Job<'_>,
        pending: RenderKey,
        image: RgbaImage,
        handle: DecodeHandle,
    ) -> Arc<RenderedFrame> {
        let frame = Arc::new(RenderedFrame::new(job.id.clone(), job.timestamp, image));
        let (retained, released) = if job.retain {
            (Some(handle), None)
        } else {
            (None, Some(handle))
        };

        let notified = self
            .cache
            .lock()
            .get_or_create_bucket(job.id)
            .complete(pending, job.owner, &frame, retained);
        drop(released);

        debug!(video_id = %job.id, waiters = notified, "Render entry completed");
        job.log(RenderEvent::Rendered {
            width: frame.width(),
            height: frame.height(),
            elapsed_ms: job.started.elapsed().as_millis() as u64,
            quality: job.quality(),
        });
        frame
    }
}

async fn wait_for(
    rx: oneshot::Receiver<Arc<RenderedFrame>>,
) -> Result<Arc<RenderedFrame>, RenderError> {
    rx.await.map_err(|_| RenderError::Abandoned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeResolver, ScriptedBackend, SessionScript};
    use std::time::Duration;

    fn renderer(
        resolver: Arc<FakeResolver>,
        backend: Arc<ScriptedBackend>,
        max_attempts: u32,
    ) -> FrameRenderer {
        FrameRenderer::new(
            Arc::new(RenderCache::default()),
            resolver,
            backend,
            RetryPolicy {
                max_attempts,
                poll_interval: Duration::from_millis(50),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn identical_concurrent_renders_share_one_decode() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::new(SessionScript::ok(640, 360)));
        let renderer = renderer(resolver, backend.clone(), 5);
        let id = VideoId::from("abc");
        let dims = Dimensions::new(640, 360);

        let (a, b, c) = tokio::join!(
            renderer.render(&id, dims, false, 10.0),
            renderer.render(&id, dims, false, 10.0),
            renderer.render(&id, dims, false, 10.0),
        );
        let (a, b, c) = (a.unwrap().unwrap(), b.unwrap().unwrap(), c.unwrap().unwrap());

        assert_eq!(backend.opened(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(renderer.cache().stats().coalesced, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_joins_in_flight_entry_without_new_entry() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::new(SessionScript::ok(640, 360)));
        let renderer = renderer(resolver, backend.clone(), 5);
        let id = VideoId::from("abc");
        let dims = Dimensions::new(640, 360);

        let first = renderer.render(&id, dims, false, 10.0);
        let second = async {
            // Let the first call claim its entry before probing.
            tokio::task::yield_now().await;
            let state = renderer.cache().lock();
            let bucket = state.peek(&id).unwrap();
            assert_eq!(bucket.len(), 1);
            let key = RenderKey::new(dims, 10.0);
            assert!(!bucket.get(&key).unwrap().is_rendered());
            drop(state);
            renderer.render(&id, dims, false, 10.0).await
        };
        let (first, second) = tokio::join!(first, second);
        let (first, second) = (first.unwrap().unwrap(), second.unwrap().unwrap());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dimensions(), dims);
        assert_eq!(backend.opened(), 1);
        assert_eq!(renderer.cache().lock().peek(&id).unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rendered_entry_is_a_cache_hit() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::new(SessionScript::ok(640, 360)));
        let renderer = renderer(resolver.clone(), backend.clone(), 5);
        let id = VideoId::from("abc");

        let first = renderer.render(&id, Dimensions::new(640, 360), false, 4.0).await.unwrap().unwrap();
        let again = renderer.render(&id, Dimensions::new(320, 180), false, 4.0).await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(resolver.calls(), 1);
        assert_eq!(backend.opened(), 1);
        assert_eq!(renderer.cache().stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn frame_reports_native_resolution() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::new(SessionScript::ok(1280, 720)));
        let renderer = renderer(resolver, backend, 5);
        let id = VideoId::from("abc");

        let frame = renderer.render(&id, Dimensions::new(640, 360), false, 1.0).await.unwrap().unwrap();
        assert_eq!(frame.dimensions(), Dimensions::new(1280, 720));

        let state = renderer.cache().lock();
        let bucket = state.peek(&id).unwrap();
        assert!(bucket.get(&RenderKey::new(Dimensions::new(1280, 720), 1.0)).unwrap().is_rendered());
        assert!(bucket.get(&RenderKey::new(Dimensions::new(640, 360), 1.0)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_format_is_not_an_error() {
        let resolver = Arc::new(FakeResolver::empty());
        let backend = Arc::new(ScriptedBackend::new(SessionScript::ok(640, 360)));
        let renderer = renderer(resolver, backend.clone(), 5);

        let result = renderer.render(&VideoId::from("gone"), Dimensions::new(640, 360), false, 0.0).await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(backend.opened(), 0);
        assert!(renderer.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_evict_entry_and_reject() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::new(SessionScript::fail()));
        let renderer = renderer(resolver.clone(), backend.clone(), 5);
        let id = VideoId::from("abc");

        let result = renderer.render(&id, Dimensions::new(640, 360), false, 10.0).await;
        assert!(matches!(result, Err(RenderError::ExhaustedRetries { attempts: 5 })));
        assert_eq!(backend.opened(), 5);
        assert_eq!(resolver.calls(), 5);
        assert_eq!(resolver.forced_calls(), 4);

        let state = renderer.cache().lock();
        let bucket = state.peek(&id).unwrap();
        assert!(bucket.get(&RenderKey::new(Dimensions::new(640, 360), 10.0)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_on_failed_entry_are_abandoned() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::new(SessionScript::fail()));
        let renderer = renderer(resolver, backend, 2);
        let id = VideoId::from("abc");
        let dims = Dimensions::new(640, 360);

        let (owner, waiter) = tokio::join!(
            renderer.render(&id, dims, false, 3.0),
            renderer.render(&id, dims, false, 3.0),
        );
        assert!(matches!(owner, Err(RenderError::ExhaustedRetries { attempts: 2 })));
        assert!(matches!(waiter, Err(RenderError::Abandoned)));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_with_fresh_format() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::scripted(
            vec![SessionScript::fail(), SessionScript::fail()],
            SessionScript::ok(640, 360),
        ));
        let renderer = renderer(resolver.clone(), backend.clone(), 5);

        let frame = renderer.render(&VideoId::from("abc"), Dimensions::new(640, 360), false, 2.0).await;
        assert!(frame.unwrap().is_some());
        assert_eq!(backend.opened(), 3);
        assert_eq!(resolver.forced_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_resolution_without_format_yields_none() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360).fresh_returns_none());
        let backend = Arc::new(ScriptedBackend::new(SessionScript::fail()));
        let renderer = renderer(resolver, backend, 5);
        let id = VideoId::from("abc");

        let result = renderer.render(&id, Dimensions::new(640, 360), false, 2.0).await;
        assert!(matches!(result, Ok(None)));
        assert!(renderer.cache().lock().peek(&id).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_is_polled_until_frame_is_current() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::new(SessionScript::ok(640, 360).not_ready_for(3)));
        let renderer = renderer(resolver, backend.clone(), 5);

        let started = tokio::time::Instant::now();
        let frame = renderer.render(&VideoId::from("abc"), Dimensions::new(640, 360), false, 2.0).await;
        assert!(frame.unwrap().is_some());
        assert_eq!(backend.opened(), 1);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn retained_session_is_reused_for_new_timestamp() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::new(SessionScript::ok(640, 360)));
        let renderer = renderer(resolver.clone(), backend.clone(), 5);
        let id = VideoId::from("abc");
        let dims = Dimensions::new(640, 360);

        renderer.render(&id, dims, true, 1.0).await.unwrap().unwrap();
        let second = renderer.render(&id, dims, false, 8.0).await.unwrap().unwrap();

        assert_eq!(second.timestamp, 8.0);
        assert_eq!(backend.opened(), 1, "second render must seek the retained session");
        assert_eq!(backend.seeks(), vec![8.0]);
        assert_eq!(resolver.calls(), 1);
        assert_eq!(renderer.cache().stats().reuses, 1);

        // The handle moved out of the first entry and was released after the
        // second render, since that one did not ask to retain it.
        let state = renderer.cache().lock();
        let bucket = state.peek(&id).unwrap();
        assert!(!bucket.has_retained_handle(&RenderKey::new(dims, 1.0)));
        assert!(!bucket.has_retained_handle(&RenderKey::new(dims, 8.0)));
        drop(state);
        assert_eq!(backend.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slower_render_is_superseded_and_its_waiters_get_the_winner() {
        // The 640x360 decode is slow; a 1280x720 decode at the same timestamp
        // finishes first and already covers the smaller request.
        let small = Dimensions::new(640, 360);
        let large = Dimensions::new(1280, 720);
        let resolver = Arc::new(FakeResolver::by_request(vec![
            (small, (640, 360)),
            (large, (1280, 720)),
        ]));
        let backend = Arc::new(ScriptedBackend::scripted(
            vec![
                SessionScript::ok(640, 360).loading_for(Duration::from_millis(500)),
                SessionScript::ok(1280, 720).loading_for(Duration::from_millis(10)),
            ],
            SessionScript::ok(640, 360),
        ));
        let renderer = renderer(resolver, backend.clone(), 5);
        let id = VideoId::from("abc");

        let (slow, waiter, fast) = tokio::join!(
            renderer.render(&id, small, false, 6.0),
            async {
                tokio::task::yield_now().await;
                renderer.render(&id, small, false, 6.0).await
            },
            async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                renderer.render(&id, large, false, 6.0).await
            },
        );

        let fast = fast.unwrap().unwrap();
        assert!(matches!(slow, Err(RenderError::Superseded)));
        assert!(Arc::ptr_eq(&waiter.unwrap().unwrap(), &fast));
        assert_eq!(fast.dimensions(), large);
        assert_eq!(backend.opened(), 2);
        assert_eq!(backend.released(), 2);

        let state = renderer.cache().lock();
        let bucket = state.peek(&id).unwrap();
        assert_eq!(bucket.len(), 1, "the losing pending entry is removed");
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_render_frees_its_pending_entry() {
        let resolver = Arc::new(FakeResolver::fixed(640, 360));
        let backend = Arc::new(ScriptedBackend::scripted(
            vec![SessionScript::ok(640, 360).loading_for(Duration::from_millis(500))],
            SessionScript::ok(640, 360),
        ));
        let renderer = renderer(resolver, backend.clone(), 5);
        let id = VideoId::from("abc");
        let dims = Dimensions::new(640, 360);

        let (timed_out, waiter) = tokio::join!(
            tokio::time::timeout(Duration::from_millis(100), renderer.render(&id, dims, false, 10.0)),
            async {
                tokio::task::yield_now().await;
                renderer.render(&id, dims, false, 10.0).await
            },
        );
        assert!(timed_out.is_err());
        assert!(matches!(waiter, Err(RenderError::Abandoned)));
        assert!(renderer.cache().lock().peek(&id).unwrap().is_empty());
        assert_eq!(backend.released(), 1);

        let retry = tokio::time::timeout(Duration::from_secs(60), renderer.render(&id, dims, false, 10.0))
            .await
            .expect("identical render must not hang on a dead entry");
        assert_eq!(retry.unwrap().unwrap().dimensions(), dims);
        assert_eq!(backend.opened(), 2);
    }
}
