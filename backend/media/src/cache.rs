//! Render cache: per-video buckets of pending and rendered frames.
//!
//! Buckets are held in an LRU keyed by video id. Inside a bucket each
//! `(dimensions, timestamp)` key maps to exactly one entry, so two decodes for
//! the same key can never run at once: later callers attach as waiters.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use thumbforge_core::{Dimensions, RenderKey, VideoId};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::frame::RenderedFrame;
use crate::handle::DecodeHandle;

/// Default number of video ids kept before least-recently-used eviction.
pub const DEFAULT_CAPACITY: usize = 256;

/// Callers waiting on a pending entry, in registration order.
///
/// `resolve` consumes the list, so each waiter is delivered at most once.
/// Dropping an unresolved list wakes every receiver with a closed channel.
#[derive(Debug, Default)]
pub struct Waiters {
    senders: Vec<oneshot::Sender<Arc<RenderedFrame>>>,
}

impl Waiters {
    pub fn register(&mut self) -> oneshot::Receiver<Arc<RenderedFrame>> {
        let (tx, rx) = oneshot::channel();
        self.senders.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Deliver `frame` to every waiter in order. Returns how many were still listening.
    pub fn resolve(self, frame: &Arc<RenderedFrame>) -> usize {
        self.senders
            .into_iter()
            .map(|tx| tx.send(Arc::clone(frame)).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }
}

/// State of one `(dimensions, timestamp)` slot in a bucket.
#[derive(Debug)]
pub enum RenderEntry {
    /// A decode owned by the render operation `owner` is in flight.
    Pending { owner: Uuid, waiters: Waiters },
    /// The frame is available. `retained` keeps the decode session alive for reuse.
    Rendered {
        frame: Arc<RenderedFrame>,
        retained: Option<DecodeHandle>,
    },
}

impl RenderEntry {
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderEntry::Rendered { .. })
    }

    pub fn frame(&self) -> Option<&Arc<RenderedFrame>> {
        match self {
            RenderEntry::Rendered { frame, .. } => Some(frame),
            RenderEntry::Pending { .. } => None,
        }
    }
}

/// Result of trying to own a key for a new decode.
#[derive(Debug)]
pub enum Claim {
    /// The key was free; a pending entry now belongs to the caller.
    Owner,
    /// Another operation is decoding this key; wait on it.
    Joined(oneshot::Receiver<Arc<RenderedFrame>>),
    /// The key already holds a rendered frame.
    Ready(Arc<RenderedFrame>),
}

/// All render entries of one video.
#[derive(Debug, Default)]
pub struct CacheBucket {
    entries: HashMap<RenderKey, RenderEntry>,
}

impl CacheBucket {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &RenderKey) -> Option<&RenderEntry> {
        self.entries.get(key)
    }

    /// Keys whose resolution covers `requested` (all keys for an "any" request),
    /// widest first.
    pub fn candidates(&self, requested: Dimensions) -> Vec<RenderKey> {
        let mut keys: Vec<RenderKey> = self
            .entries
            .keys()
            .filter(|key| key.dimensions.covers(&requested))
            .copied()
            .collect();
        keys.sort_by(|a, b| {
            b.dimensions
                .width
                .cmp(&a.dimensions.width)
                .then(b.dimensions.height.cmp(&a.dimensions.height))
        });
        keys
    }

    /// The entry that best satisfies `requested`.
    ///
    /// For a sized request this is the narrowest entry that still covers it; an
    /// "any" request takes the widest entry available.
    pub fn find_best_entry(&self, requested: Dimensions) -> Option<RenderKey> {
        let candidates = self.candidates(requested);
        if requested.is_any() {
            candidates.first().copied()
        } else {
            candidates.last().copied()
        }
    }

    /// First key in `keys` whose timestamp equals `timestamp` exactly.
    pub fn find_by_exact_timestamp(keys: &[RenderKey], timestamp: f64) -> Option<RenderKey> {
        keys.iter().find(|key| key.timestamp == timestamp).copied()
    }

    /// A rendered frame at `timestamp` that already covers `requested`.
    pub fn find_rendered_covering(
        &self,
        requested: Dimensions,
        timestamp: f64,
    ) -> Option<Arc<RenderedFrame>> {
        self.candidates(requested)
            .into_iter()
            .filter(|key| key.timestamp == timestamp)
            .find_map(|key| self.entries.get(&key).and_then(RenderEntry::frame).cloned())
    }

    /// Attach a waiter to the pending entry at `key`.
    pub fn register_waiter(
        &mut self,
        key: &RenderKey,
    ) -> Option<oneshot::Receiver<Arc<RenderedFrame>>> {
        match self.entries.get_mut(key) {
            Some(RenderEntry::Pending { waiters, .. }) => Some(waiters.register()),
            _ => None,
        }
    }

    /// Move the retained decode handle out of the rendered entry at `key`.
    pub fn take_retained_handle(&mut self, key: &RenderKey) -> Option<DecodeHandle> {
        match self.entries.get_mut(key) {
            Some(RenderEntry::Rendered { retained, .. }) => retained.take(),
            _ => None,
        }
    }

    pub fn has_retained_handle(&self, key: &RenderKey) -> bool {
        matches!(
            self.entries.get(key),
            Some(RenderEntry::Rendered {
                retained: Some(_),
                ..
            })
        )
    }

    /// Take ownership of `key` for a new decode, or join whatever is already there.
    pub fn claim(&mut self, key: RenderKey, owner: Uuid) -> Claim {
        match self.entries.get_mut(&key) {
            Some(RenderEntry::Pending { waiters, .. }) => Claim::Joined(waiters.register()),
            Some(RenderEntry::Rendered { frame, .. }) => Claim::Ready(Arc::clone(frame)),
            None => {
                self.entries.insert(
                    key,
                    RenderEntry::Pending {
                        owner,
                        waiters: Waiters::default(),
                    },
                );
                Claim::Owner
            }
        }
    }

    /// Remove and return the waiters of the pending entry at `key` if `owner` still holds it.
    fn take_pending(&mut self, key: &RenderKey, owner: Uuid) -> Option<Waiters> {
        match self.entries.get(key) {
            Some(RenderEntry::Pending { owner: current, .. }) if *current == owner => {}
            _ => return None,
        }
        match self.entries.remove(key) {
            Some(RenderEntry::Pending { waiters, .. }) => Some(waiters),
            _ => None,
        }
    }

    /// Transition `owner`'s pending entry to rendered.
    ///
    /// The rendered entry is stored under the frame's native key, which may
    /// differ from the pending key. Waiters on either key receive `frame`.
    /// Returns how many waiters were notified.
    pub fn complete(
        &mut self,
        pending: RenderKey,
        owner: Uuid,
        frame: &Arc<RenderedFrame>,
        retained: Option<DecodeHandle>,
    ) -> usize {
        let native = frame.key();
        let mut notified = self
            .take_pending(&pending, owner)
            .map(|waiters| waiters.resolve(frame))
            .unwrap_or(0);

        if native != pending {
            if let Some(RenderEntry::Pending { waiters, .. }) = self.entries.remove(&native) {
                notified += waiters.resolve(frame);
            }
        }

        self.entries.insert(
            native,
            RenderEntry::Rendered {
                frame: Arc::clone(frame),
                retained,
            },
        );
        notified
    }

    /// Drop `owner`'s pending entry after a lost race, handing its waiters the winner.
    pub fn supersede(&mut self, pending: RenderKey, owner: Uuid, winner: &Arc<RenderedFrame>) -> usize {
        self.take_pending(&pending, owner)
            .map(|waiters| waiters.resolve(winner))
            .unwrap_or(0)
    }

    /// Remove `owner`'s pending entry. Its waiters observe a closed channel.
    pub fn abandon(&mut self, pending: RenderKey, owner: Uuid) -> bool {
        self.take_pending(&pending, owner).is_some()
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub coalesced: u64,
    pub reuses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    coalesced: AtomicU64,
    reuses: AtomicU64,
}

/// Lock-protected bucket map. Obtained through [`RenderCache::lock`].
#[derive(Debug)]
pub struct CacheState {
    buckets: LruCache<VideoId, CacheBucket>,
    evictions: u64,
}

impl CacheState {
    /// Bucket for `id` if present. Marks it recently used; never creates.
    pub fn lookup(&mut self, id: &VideoId) -> Option<&mut CacheBucket> {
        self.buckets.get_mut(id)
    }

    /// Bucket for `id` without touching recency.
    pub fn peek(&self, id: &VideoId) -> Option<&CacheBucket> {
        self.buckets.peek(id)
    }

    /// Bucket for `id`, created empty on first use. May evict the least recently used bucket.
    pub fn get_or_create_bucket(&mut self, id: &VideoId) -> &mut CacheBucket {
        if !self.buckets.contains(id) && self.buckets.len() == self.buckets.cap().get() {
            if let Some((evicted, bucket)) = self.buckets.pop_lru() {
                self.evictions += 1;
                debug!(video_id = %evicted, entries = bucket.len(), "Evicted render cache bucket");
            }
        }
        self.buckets.get_or_insert_mut(id.clone(), CacheBucket::default)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Process-wide render cache shared by every renderer.
#[derive(Debug)]
pub struct RenderCache {
    state: Mutex<CacheState>,
    counters: Counters,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RenderCache {
    /// Create a cache holding at most `capacity` video ids. Zero falls back to the default.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                buckets: LruCache::new(capacity),
                evictions: 0,
            }),
            counters: Counters::default(),
        }
    }

    /// Lock the bucket map. Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop every bucket. Pending waiters observe abandonment.
    pub fn clear(&self) {
        self.lock().buckets.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn record_hit(&self) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reuse(&self) {
        self.counters.reuses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            reuses: self.counters.reuses.load(Ordering::Relaxed),
            evictions: self.lock().evictions,
        }
    }
}
