use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Requests older than this no longer hold the page busy (long polls,
/// streaming responses, websockets).
pub const STALE_REQUEST: Duration = Duration::from_secs(10);

/// An in-flight request seen on the Network domain
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub url: String,
    pub started_at: Instant,
}

/// Tracks in-flight requests so callers can wait for network quiescence
#[derive(Debug, Default)]
pub struct NetworkTracker {
    pending: HashMap<String, PendingRequest>,
    last_activity: Option<Instant>,
}

impl NetworkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_started(&mut self, request_id: String, url: String) {
        self.request_started_at(request_id, url, Instant::now());
    }

    fn request_started_at(&mut self, request_id: String, url: String, now: Instant) {
        self.pending.insert(
            request_id,
            PendingRequest {
                url,
                started_at: now,
            },
        );
        self.last_activity = Some(now);
    }

    /// Finished and failed requests both leave the in-flight set.
    pub fn request_finished(&mut self, request_id: &str) {
        if self.pending.remove(request_id).is_some() {
            self.last_activity = Some(Instant::now());
        }
    }

    /// Requests still counting against idleness at `now`.
    pub fn in_flight(&self, now: Instant) -> usize {
        self.pending
            .values()
            .filter(|r| now.saturating_duration_since(r.started_at) < STALE_REQUEST)
            .count()
    }

    /// Idle when nothing live is in flight and nothing changed for `quiet`.
    pub fn is_idle(&self, now: Instant, quiet: Duration) -> bool {
        if self.in_flight(now) > 0 {
            return false;
        }
        self.last_activity
            .is_none_or(|at| now.saturating_duration_since(at) >= quiet)
    }

    /// Forget everything, e.g. when a new document starts loading.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.last_activity = None;
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingRequest> {
        self.pending.values()
    }
}
