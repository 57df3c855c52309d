//! In-flight render deduplication.
//!
//! [`DedupCache`] maps a [`Fingerprint`] either to a committed artifact path or
//! to an outstanding [`Reservation`]. The first caller for a fingerprint gets
//! [`Lookup::Miss`] and becomes the only producer; every later caller queues
//! behind it until the producer commits or aborts.
//!
//! ```text
//! Job A ──┐  lookup_or_reserve(fp)
//!         ├─► Miss(reservation) ──► render ──► commit(path) ──┐
//! Job B ──┤                                                   │
//!         ├─► (waits, FIFO) ◄─────────────────────────────────┤
//! Job C ──┘                                                   ▼
//!                                                    B, C receive Hit(path)
//! ```
//!
//! A transient abort hands the reservation to the longest-waiting caller
//! alone; the others stay queued behind the new producer.
//!
//! Only the map mutation happens under the lock. Rendering runs outside it.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::Fingerprint;

/// Why a reservation was released without a committed artifact.
///
/// A `deterministic` abort (malformed diagram source) is handed to every
/// waiter as an error, since rendering the same text again would fail the
/// same way. A transient abort (timeout, I/O, cancelled producer) promotes
/// the first waiter to producer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AbortReason {
    /// Human-readable description of the producer's failure.
    pub message: String,
    /// Whether retrying the same source is pointless.
    pub deterministic: bool,
}

impl AbortReason {
    /// Abort caused by the diagram source itself.
    #[must_use]
    pub fn deterministic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            deterministic: true,
        }
    }

    /// Abort caused by the environment (timeout, I/O, cancellation).
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            deterministic: false,
        }
    }
}

/// How an outstanding reservation was resolved.
#[derive(Debug, Clone)]
enum Resolution {
    Committed(PathBuf),
    Aborted(AbortReason),
    /// The receiving waiter now holds reservation `id`.
    Promoted(u64),
}

/// State of a single fingerprint.
enum Slot {
    /// Artifact has been committed.
    Ready(PathBuf),
    /// A producer holds the reservation; waiters are kept in arrival order.
    InFlight {
        reservation: u64,
        waiters: VecDeque<oneshot::Sender<Resolution>>,
    },
}

/// Result of [`DedupCache::lookup_or_reserve`].
#[derive(Debug)]
pub enum Lookup<'a> {
    /// Artifact already rendered in this run.
    Hit(PathBuf),
    /// Caller is now the exclusive producer for the fingerprint.
    Miss(Reservation<'a>),
}

/// Counters for monitoring deduplication effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a committed entry (including after waiting).
    pub hits: u64,
    /// Lookups that granted a reservation.
    pub misses: u64,
    /// Lookups that had to wait for another producer.
    pub coalesced: u64,
}

/// Reservation map deduplicating diagram renders by fingerprint.
///
/// One instance is created per run and shared by reference (usually behind an
/// `Arc`) with every conversion job.
pub struct DedupCache {
    slots: Mutex<HashMap<Fingerprint, Slot>>,
    next_reservation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_reservation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a fingerprint, reserving it when nothing is cached.
    ///
    /// - Committed entry: returns [`Lookup::Hit`] immediately.
    /// - Nothing known: returns [`Lookup::Miss`] holding the reservation.
    /// - Reservation held elsewhere: waits until it resolves. A commit yields
    ///   `Hit`; a deterministic abort is returned as `Err`. After a transient
    ///   abort the earliest waiter gets `Miss` and the rest keep waiting.
    ///
    /// # Errors
    ///
    /// Returns the producer's [`AbortReason`] when it failed deterministically.
    pub async fn lookup_or_reserve(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Lookup<'_>, AbortReason> {
        loop {
            let waiter = {
                let mut slots = self.lock();
                match slots.entry(fingerprint.clone()) {
                    Entry::Vacant(entry) => {
                        let id = self.next_reservation.fetch_add(1, Ordering::Relaxed);
                        entry.insert(Slot::InFlight {
                            reservation: id,
                            waiters: VecDeque::new(),
                        });
                        self.misses.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(%fingerprint, "Reserved diagram for rendering");
                        return Ok(Lookup::Miss(Reservation {
                            cache: self,
                            fingerprint: fingerprint.clone(),
                            id,
                            resolved: false,
                        }));
                    }
                    Entry::Occupied(entry) => match entry.into_mut() {
                        Slot::Ready(path) => {
                            self.hits.fetch_add(1, Ordering::Relaxed);
                            return Ok(Lookup::Hit(path.clone()));
                        }
                        Slot::InFlight { waiters, .. } => {
                            let (tx, rx) = oneshot::channel();
                            waiters.push_back(tx);
                            self.coalesced.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                %fingerprint,
                                waiters = waiters.len(),
                                "Waiting for in-flight render"
                            );
                            rx
                        }
                    },
                }
            };

            let mut waiter = Waiter {
                cache: self,
                fingerprint: fingerprint.clone(),
                rx: Some(waiter),
            };
            match waiter.recv().await {
                Some(Resolution::Committed(path)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Lookup::Hit(path));
                }
                Some(Resolution::Promoted(id)) => {
                    tracing::debug!(%fingerprint, "Took over diagram reservation");
                    return Ok(Lookup::Miss(Reservation {
                        cache: self,
                        fingerprint: fingerprint.clone(),
                        id,
                        resolved: false,
                    }));
                }
                Some(Resolution::Aborted(reason)) if reason.deterministic => return Err(reason),
                // Slot vanished without a resolution: try to reserve again
                Some(Resolution::Aborted(_)) | None => {}
            }
        }
    }

    /// Committed artifact for a fingerprint, without reserving.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        match self.lock().get(fingerprint) {
            Some(Slot::Ready(path)) => Some(path.clone()),
            _ => None,
        }
    }

    /// Whether a producer currently holds the reservation for a fingerprint.
    #[must_use]
    pub fn is_in_flight(&self, fingerprint: &Fingerprint) -> bool {
        matches!(self.lock().get(fingerprint), Some(Slot::InFlight { .. }))
    }

    /// Snapshot of the lookup counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Resolve a reservation and wake its waiters in arrival order.
    fn resolve(&self, fingerprint: &Fingerprint, id: u64, resolution: Resolution) {
        let mut slots = self.lock();
        let Some(Slot::InFlight {
            reservation,
            waiters,
        }) = slots.get_mut(fingerprint)
        else {
            return;
        };
        if *reservation != id {
            return;
        }

        if let Resolution::Aborted(reason) = &resolution
            && !reason.deterministic
        {
            // Promote the earliest waiter that is still listening
            while let Some(waiter) = waiters.pop_front() {
                let next = self.next_reservation.fetch_add(1, Ordering::Relaxed);
                if waiter.send(Resolution::Promoted(next)).is_ok() {
                    *reservation = next;
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
            // No poisoned entry: the next lookup is a fresh miss
            slots.remove(fingerprint);
            return;
        }

        let waiters = std::mem::take(waiters);
        match &resolution {
            Resolution::Committed(path) => {
                slots.insert(fingerprint.clone(), Slot::Ready(path.clone()));
            }
            Resolution::Aborted(_) | Resolution::Promoted(_) => {
                slots.remove(fingerprint);
            }
        }
        drop(slots);

        for waiter in waiters {
            // Receiver may be gone if the waiting job was cancelled
            let _ = waiter.send(resolution.clone());
        }
    }
}

/// Exclusive right to render one fingerprint.
///
/// Must be resolved with [`commit`](Self::commit) or [`abort`](Self::abort).
/// Dropping it unresolved (for example when the owning job is cancelled or
/// times out) counts as a transient abort.
#[derive(Debug)]
pub struct Reservation<'a> {
    cache: &'a DedupCache,
    fingerprint: Fingerprint,
    id: u64,
    resolved: bool,
}

impl Reservation<'_> {
    /// Fingerprint this reservation covers.
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Store the artifact and hand it to every waiter.
    pub fn commit(mut self, artifact: PathBuf) {
        self.resolved = true;
        tracing::debug!(fingerprint = %self.fingerprint, path = %artifact.display(), "Committed diagram");
        self.cache
            .resolve(&self.fingerprint, self.id, Resolution::Committed(artifact));
    }

    /// Release the reservation without an artifact.
    pub fn abort(mut self, reason: AbortReason) {
        self.resolved = true;
        tracing::debug!(fingerprint = %self.fingerprint, %reason, "Aborted diagram render");
        self.cache
            .resolve(&self.fingerprint, self.id, Resolution::Aborted(reason));
    }
}

/// A queued lookup. If it is dropped after being promoted but before
/// reading the promotion, the reservation moves on to the next waiter.
struct Waiter<'a> {
    cache: &'a DedupCache,
    fingerprint: Fingerprint,
    rx: Option<oneshot::Receiver<Resolution>>,
}

impl Waiter<'_> {
    async fn recv(&mut self) -> Option<Resolution> {
        let rx = self.rx.as_mut()?;
        let resolution = rx.await.ok();
        self.rx = None;
        resolution
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        // Closing first guarantees no promotion lands after the check
        rx.close();
        if let Ok(Resolution::Promoted(id)) = rx.try_recv() {
            self.cache.resolve(
                &self.fingerprint,
                id,
                Resolution::Aborted(AbortReason::transient("waiter cancelled")),
            );
        }
    }
}

impl std::fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("entries", &self.lock().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.cache.resolve(
                &self.fingerprint,
                self.id,
                Resolution::Aborted(AbortReason::transient("render abandoned")),
            );
        }
    }
}
