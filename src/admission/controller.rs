//! Per-endpoint admission controller.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::identity::ClientIdentity;
use super::penalty::{BlockState, ProgressiveBlockPolicy};
use super::policy::EndpointPolicy;
use super::window::WindowCounter;

/// Default cap on identities tracked by a single controller.
pub const DEFAULT_MAX_TRACKED_IDENTITIES: usize = 100_000;

/// Recently touched identities skipped per eviction before the next candidate
/// is evicted regardless.
const MAX_EVICTION_REQUEUES: usize = 32;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The identity is serving a block from an earlier overflow
    Blocked,
    /// This request would have exceeded the window quota
    QuotaExceeded,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Blocked => f.write_str("blocked"),
            DenyReason::QuotaExceeded => f.write_str("quota_exceeded"),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Quota per window, `u32::MAX` when unlimited
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// How long the client should wait before retrying, on deny
    pub retry_after: Option<Duration>,
    /// Deny reason, on deny
    pub reason: Option<DenyReason>,
}

impl Decision {
    fn admitted(limit: u32, remaining: u32) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            retry_after: None,
            reason: None,
        }
    }

    fn denied(limit: u32, retry_after: Duration, reason: DenyReason) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            retry_after: Some(retry_after),
            reason: Some(reason),
        }
    }

    /// An admit from an endpoint without a quota.
    pub fn unlimited() -> Self {
        Self::admitted(u32::MAX, u32::MAX)
    }

    /// `retry_after` rounded up to whole seconds, at least 1, for a
    /// `Retry-After` header.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.map(|d| {
            let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
            secs.max(1)
        })
    }
}

/// Point-in-time view of one identity's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentitySnapshot {
    /// Admitted requests inside the current window
    pub in_window: usize,
    /// Offenses since the identity was last forgiven
    pub offense_count: u32,
    /// Time left on an active block
    pub blocked_for: Option<Duration>,
}

/// Everything tracked for one identity.
#[derive(Debug)]
struct IdentityState {
    window: WindowCounter,
    block: BlockState,
    last_seen: Instant,
    /// Ticket of this identity's live entry in the recency queue
    ticket: u64,
}

impl IdentityState {
    fn new(window: Duration, now: Instant, ticket: u64) -> Self {
        Self {
            window: WindowCounter::new(window),
            block: BlockState::default(),
            last_seen: now,
            ticket,
        }
    }

    fn is_idle(&self) -> bool {
        self.window.is_empty() && self.block.is_clean()
    }
}

/// Position of an identity in the recency queue.
///
/// Entries whose ticket no longer matches the tracked state are stale and
/// skipped.
#[derive(Debug)]
struct RecencyEntry {
    identity: ClientIdentity,
    ticket: u64,
    /// `last_seen` when the entry was queued
    seen: Instant,
}

/// Quota enforced by a controller.
#[derive(Debug, Clone)]
struct Limits {
    policy: EndpointPolicy,
    blocks: ProgressiveBlockPolicy,
}

/// Answers admit/deny for one endpoint across all client identities.
///
/// State is held in a sharded concurrent map, so each decision only locks the
/// shard holding the identity's entry. The count-and-commit step runs under
/// that lock, which makes decisions for a single identity linearizable.
///
/// When the identity cap is reached, the least recently seen identity is found
/// through a second-chance queue in insertion order instead of a map scan, and
/// idle identities are swept inline at most once per window.
pub struct AdmissionController {
    /// Endpoint name, used in logs
    endpoint: String,
    /// `None` for a permissive controller
    limits: Option<Limits>,
    /// Upper bound on tracked identities
    max_tracked: usize,
    /// Per-identity state
    identities: DashMap<ClientIdentity, IdentityState>,
    /// Eviction candidates, oldest first. Locked after any shard guard,
    /// never before one.
    recency: Mutex<VecDeque<RecencyEntry>>,
    /// Source of recency tickets
    next_ticket: AtomicU64,
    /// When the cap last triggered an inline sweep
    last_inline_sweep: Mutex<Option<Instant>>,
}

impl AdmissionController {
    /// Create a controller enforcing `policy` on `endpoint`.
    pub fn new(endpoint: impl Into<String>, policy: EndpointPolicy) -> Self {
        let blocks = policy.block_policy();
        Self {
            endpoint: endpoint.into(),
            limits: Some(Limits { policy, blocks }),
            max_tracked: DEFAULT_MAX_TRACKED_IDENTITIES,
            identities: DashMap::new(),
            recency: Mutex::new(VecDeque::new()),
            next_ticket: AtomicU64::new(0),
            last_inline_sweep: Mutex::new(None),
        }
    }

    /// Create a controller that admits everything and tracks nothing.
    pub fn permissive(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            limits: None,
            max_tracked: 0,
            identities: DashMap::new(),
            recency: Mutex::new(VecDeque::new()),
            next_ticket: AtomicU64::new(0),
            last_inline_sweep: Mutex::new(None),
        }
    }

    /// Cap the number of identities tracked at once.
    pub fn with_max_tracked(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked.max(1);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The enforced policy, `None` when permissive.
    pub fn policy(&self) -> Option<&EndpointPolicy> {
        self.limits.as_ref().map(|l| &l.policy)
    }

    pub fn is_permissive(&self) -> bool {
        self.limits.is_none()
    }

    /// Decide whether a request from `identity` arriving at `now` may proceed.
    pub fn admit(&self, identity: &str, now: Instant) -> Decision {
        let Some(limits) = &self.limits else {
            trace!(endpoint = %self.endpoint, identity = %identity, "Admitting without quota");
            return Decision::unlimited();
        };

        trace!(endpoint = %self.endpoint, identity = %identity, "Checking admission");

        let existing = self.identities.get_mut(identity);
        let mut entry = match existing {
            Some(entry) => entry,
            None => {
                self.make_room(limits, now);
                self.identities
                    .entry(ClientIdentity::from(identity))
                    .or_insert_with(|| {
                        debug!(
                            endpoint = %self.endpoint,
                            identity = %identity,
                            "Tracking new identity"
                        );
                        let ticket = self.enqueue(ClientIdentity::from(identity), now);
                        IdentityState::new(limits.policy.window(), now, ticket)
                    })
            }
        };

        self.decide(limits, identity, entry.value_mut(), now)
    }

    /// Apply the window and block rules to one identity's state.
    ///
    /// Runs with the identity's shard locked; must not touch `self.identities`.
    fn decide(
        &self,
        limits: &Limits,
        identity: &str,
        state: &mut IdentityState,
        now: Instant,
    ) -> Decision {
        let max_requests = limits.policy.max_requests;
        state.last_seen = now;

        // Blocked probes are not recorded
        if let Some(wait) = limits.blocks.remaining_block(&state.block, now) {
            self.report_deny(identity, &state.block, wait, DenyReason::Blocked);
            return Decision::denied(max_requests, wait, DenyReason::Blocked);
        }

        state.block = limits.blocks.on_clean_window(state.block, now);

        let count = state.window.record_and_count(now);
        if count <= max_requests as usize {
            return Decision::admitted(max_requests, max_requests - count as u32);
        }

        state.window.rollback();
        state.block = limits.blocks.on_overflow(state.block, now);
        let wait = limits
            .blocks
            .remaining_block(&state.block, now)
            .unwrap_or_default();

        self.report_deny(identity, &state.block, wait, DenyReason::QuotaExceeded);
        Decision::denied(max_requests, wait, DenyReason::QuotaExceeded)
    }

    fn report_deny(&self, identity: &str, block: &BlockState, wait: Duration, reason: DenyReason) {
        warn!(
            endpoint = %self.endpoint,
            identity = %identity,
            offense_count = block.offense_count,
            reason = %reason,
            retry_after_ms = wait.as_millis() as u64,
            "Admission denied"
        );
    }

    /// Queue `identity` as an eviction candidate last seen at `seen`.
    ///
    /// May be called with the identity's shard locked.
    fn enqueue(&self, identity: ClientIdentity, seen: Instant) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.recency.lock().push_back(RecencyEntry {
            identity,
            ticket,
            seen,
        });
        ticket
    }

    /// Make space for one more identity when the cap is reached.
    ///
    /// Idle identities go first, but the inline sweep runs at most once per
    /// window; otherwise the least recently seen identity is dropped.
    fn make_room(&self, limits: &Limits, now: Instant) {
        if self.identities.len() < self.max_tracked {
            return;
        }

        if self.inline_sweep_due(limits, now) {
            self.sweep(now);
            if self.identities.len() < self.max_tracked {
                return;
            }
        }

        self.evict_least_recent();
    }

    fn inline_sweep_due(&self, limits: &Limits, now: Instant) -> bool {
        // Another caller is already deciding
        let Some(mut last) = self.last_inline_sweep.try_lock() else {
            return false;
        };
        match *last {
            Some(at) if now.saturating_duration_since(at) < limits.policy.window() => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Evict the front of the recency queue, giving identities touched since
    /// they were queued a second chance at the back.
    fn evict_least_recent(&self) {
        let mut requeued = 0;

        loop {
            let candidate = self.recency.lock().pop_front();
            let Some(candidate) = candidate else {
                return;
            };

            let Entry::Occupied(mut entry) = self.identities.entry(candidate.identity) else {
                continue;
            };
            if entry.get().ticket != candidate.ticket {
                continue;
            }

            let last_seen = entry.get().last_seen;
            if last_seen > candidate.seen && requeued < MAX_EVICTION_REQUEUES {
                requeued += 1;
                let ticket = self.enqueue(entry.key().clone(), last_seen);
                entry.get_mut().ticket = ticket;
                continue;
            }

            let (identity, _) = entry.remove_entry();
            warn!(
                endpoint = %self.endpoint,
                identity = %identity,
                max_tracked = self.max_tracked,
                "Identity cap reached, evicted least recently seen identity"
            );
            return;
        }
    }

    /// Drop queue entries for identities that are gone or were requeued.
    fn compact_recency(&self) {
        let queued = std::mem::take(&mut *self.recency.lock());
        let mut live: VecDeque<RecencyEntry> = queued
            .into_iter()
            .filter(|candidate| {
                self.identities
                    .get(&candidate.identity)
                    .is_some_and(|state| state.ticket == candidate.ticket)
            })
            .collect();

        // Keep anything queued while the map was being checked
        let mut recency = self.recency.lock();
        live.extend(recency.drain(..));
        *recency = live;
    }

    /// Drop identities with no events in the window and no block history.
    ///
    /// Offense counts are forgiven first, so identities that have served their
    /// block and stayed quiet for a full window are released too. Returns the
    /// number of identities removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let Some(limits) = &self.limits else {
            return 0;
        };

        let mut removed = 0;
        self.identities.retain(|_, state| {
            state.window.purge(now);
            state.block = limits.blocks.on_clean_window(state.block, now);
            if state.is_idle() {
                removed += 1;
                false
            } else {
                true
            }
        });
        self.compact_recency();

        if removed > 0 {
            debug!(
                endpoint = %self.endpoint,
                removed = removed,
                remaining = self.identities.len(),
                "Swept idle identities"
            );
        }
        removed
    }

    /// Inspect an identity without changing its state.
    pub fn snapshot(&self, identity: &str, now: Instant) -> Option<IdentitySnapshot> {
        let limits = self.limits.as_ref()?;
        let state = self.identities.get(identity)?;
        Some(IdentitySnapshot {
            in_window: state.window.count_at(now),
            offense_count: state.block.offense_count,
            blocked_for: limits.blocks.remaining_block(&state.block, now),
        })
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.identities.len()
    }

    /// Number of identities serving a block at `now`.
    pub fn blocked_identities(&self, now: Instant) -> usize {
        let Some(limits) = &self.limits else {
            return 0;
        };
        self.identities
            .iter()
            .filter(|entry| limits.blocks.is_blocked(&entry.value().block, now))
            .count()
    }

    /// Forget everything about one identity. Returns whether it was tracked.
    pub fn reset(&self, identity: &str) -> bool {
        self.identities.remove(identity).is_some()
    }

    /// Forget every identity.
    pub fn clear(&self) {
        self.identities.clear();
        self.recency.lock().clear();
    }
}

impl fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionController")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy())
            .field("max_tracked", &self.max_tracked)
            .field("tracked", &self.identities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::penalty::EscalationCurve;
    use std::sync::{Arc, Barrier};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn controller(max_requests: u32) -> AdmissionController {
        AdmissionController::new(
            "generate-reply",
            EndpointPolicy::new(max_requests, 60).with_blocks(60, 300),
        )
    }

    #[test]
    fn test_admits_up_to_quota_then_blocks() {
        let controller = controller(2);
        let t0 = Instant::now();

        let first = controller.admit("A", t0);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = controller.admit("A", t0 + secs(10));
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = controller.admit("A", t0 + secs(20));
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.retry_after, Some(secs(60)));
        assert_eq!(third.reason, Some(DenyReason::QuotaExceeded));

        // Window has rolled past both admits, but the block still holds
        let fourth = controller.admit("A", t0 + secs(65));
        assert!(!fourth.allowed);
        assert_eq!(fourth.retry_after, Some(secs(15)));
        assert_eq!(fourth.reason, Some(DenyReason::Blocked));

        let fifth = controller.admit("A", t0 + secs(80));
        assert!(fifth.allowed);
        assert_eq!(fifth.remaining, 1);
    }

    #[test]
    fn test_rejected_requests_do_not_count() {
        let controller = controller(3);
        let t0 = Instant::now();

        for i in 0..3 {
            assert!(controller.admit("A", t0 + secs(i)).allowed);
        }
        assert!(!controller.admit("A", t0 + secs(3)).allowed);

        // Blocked probes must not inflate the window either
        for i in 4..60 {
            assert!(!controller.admit("A", t0 + secs(i)).allowed);
        }

        // Window and block have both passed
        for i in 0..3 {
            let decision = controller.admit("A", t0 + secs(64 + i));
            assert!(decision.allowed, "request {} after recovery was denied", i);
        }
        assert!(!controller.admit("A", t0 + secs(67)).allowed);
    }

    #[test]
    fn test_repeat_offenses_escalate() {
        let controller = controller(1);
        let t0 = Instant::now();

        assert!(controller.admit("A", t0).allowed);
        let denied = controller.admit("A", t0 + secs(1));
        assert_eq!(denied.retry_after, Some(secs(60)));

        // Block ends at 61s, still inside the clean window, overflow again
        assert!(controller.admit("A", t0 + secs(62)).allowed);
        let denied = controller.admit("A", t0 + secs(63));
        assert_eq!(denied.retry_after, Some(secs(120)));

        assert!(controller.admit("A", t0 + secs(184)).allowed);
        let denied = controller.admit("A", t0 + secs(185));
        assert_eq!(denied.retry_after, Some(secs(240)));

        assert!(controller.admit("A", t0 + secs(426)).allowed);
        let denied = controller.admit("A", t0 + secs(427));
        assert_eq!(denied.retry_after, Some(secs(300)));

        let snapshot = controller.snapshot("A", t0 + secs(427)).unwrap();
        assert_eq!(snapshot.offense_count, 4);
    }

    #[test]
    fn test_linear_escalation() {
        let controller = AdmissionController::new(
            "classify",
            EndpointPolicy::new(1, 60)
                .with_blocks(60, 300)
                .with_escalation(EscalationCurve::Linear),
        );
        let t0 = Instant::now();

        controller.admit("A", t0);
        controller.admit("A", t0 + secs(1));
        controller.admit("A", t0 + secs(62));
        let denied = controller.admit("A", t0 + secs(63));
        assert_eq!(denied.retry_after, Some(secs(120)));
    }

    #[test]
    fn test_clean_window_forgives_offenses() {
        let controller = controller(3);
        let t0 = Instant::now();

        for i in 0..3 {
            controller.admit("A", t0 + secs(i));
        }
        assert!(!controller.admit("A", t0 + secs(3)).allowed);

        // Block ends at 63s; a full clean window completes at 123s
        for i in 0..3 {
            assert!(controller.admit("A", t0 + secs(130 + i)).allowed);
        }
        let denied = controller.admit("A", t0 + secs(133));
        assert_eq!(denied.retry_after, Some(secs(60)));

        let snapshot = controller.snapshot("A", t0 + secs(133)).unwrap();
        assert_eq!(snapshot.offense_count, 1);
    }

    #[test]
    fn test_evenly_spaced_traffic_never_offends() {
        let controller = controller(2);
        let t0 = Instant::now();

        for i in 0..8 {
            let now = t0 + secs(31 * i);
            let decision = controller.admit("B", now);
            assert!(decision.allowed, "request at {}s was denied", 31 * i);
            assert_eq!(controller.snapshot("B", now).unwrap().offense_count, 0);
        }
    }

    #[test]
    fn test_trailing_window_never_exceeds_quota() {
        let controller = AdmissionController::new(
            "classify",
            EndpointPolicy::new(5, 60).with_blocks(7, 30),
        );
        let t0 = Instant::now();
        let mut admitted = Vec::new();

        for i in 0..1200u64 {
            let now = t0 + Duration::from_millis(i * 700);
            if controller.admit("C", now).allowed {
                admitted.push(now);
            }
        }

        assert!(!admitted.is_empty());
        for (i, start) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|t| t.saturating_duration_since(*start) <= secs(60))
                .count();
            assert!(in_window <= 5, "{} admits within one window", in_window);
        }
    }

    #[test]
    fn test_identities_are_independent() {
        let controller = controller(1);
        let t0 = Instant::now();

        assert!(controller.admit("A", t0).allowed);
        assert!(!controller.admit("A", t0).allowed);
        assert!(controller.admit("B", t0).allowed);
        assert_eq!(controller.tracked_identities(), 2);
        assert_eq!(controller.blocked_identities(t0), 1);
    }

    #[test]
    fn test_concurrent_admits_respect_quota() {
        const THREADS: usize = 32;
        let controller = Arc::new(controller(5));
        let barrier = Arc::new(Barrier::new(THREADS));
        let now = Instant::now();

        let allowed: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let controller = controller.clone();
                    let barrier = barrier.clone();
                    scope.spawn(move || {
                        barrier.wait();
                        controller.admit("hot", now).allowed as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(allowed, 5);
        let snapshot = controller.snapshot("hot", now).unwrap();
        assert_eq!(snapshot.in_window, 5);
        // Only the first overflow counts; later callers see the block
        assert_eq!(snapshot.offense_count, 1);
    }

    #[test]
    fn test_sweep_removes_only_idle_identities() {
        let controller = controller(1);
        let t0 = Instant::now();

        controller.admit("quiet", t0);
        controller.admit("noisy", t0);
        controller.admit("noisy", t0 + secs(1));
        controller.admit("fresh", t0 + secs(50));

        // quiet has aged out; noisy is blocked until 61s; fresh is in window
        assert_eq!(controller.sweep(t0 + secs(61)), 1);
        assert!(controller.snapshot("quiet", t0 + secs(61)).is_none());
        assert_eq!(controller.tracked_identities(), 2);

        // noisy is forgiven once a clean window follows its block
        assert_eq!(controller.sweep(t0 + secs(121)), 2);
        assert_eq!(controller.tracked_identities(), 0);
    }

    #[test]
    fn test_cap_evicts_least_recently_seen() {
        let controller = controller(5).with_max_tracked(2);
        let t0 = Instant::now();

        controller.admit("old", t0);
        controller.admit("newer", t0 + secs(1));
        controller.admit("newest", t0 + secs(2));

        assert_eq!(controller.tracked_identities(), 2);
        assert!(controller.snapshot("old", t0 + secs(2)).is_none());
        assert!(controller.snapshot("newer", t0 + secs(2)).is_some());
        assert!(controller.snapshot("newest", t0 + secs(2)).is_some());
    }

    #[test]
    fn test_cap_prefers_sweeping_idle_identities() {
        let controller = controller(5).with_max_tracked(2);
        let t0 = Instant::now();

        controller.admit("idle", t0);
        controller.admit("active", t0 + secs(30));
        controller.admit("incoming", t0 + secs(70));

        assert!(controller.snapshot("idle", t0 + secs(70)).is_none());
        assert!(controller.snapshot("active", t0 + secs(70)).is_some());
    }

    #[test]
    fn test_cap_gives_recently_seen_identities_a_second_chance() {
        let controller = controller(5).with_max_tracked(2);
        let t0 = Instant::now();

        controller.admit("first", t0);
        controller.admit("second", t0 + secs(1));
        // "first" was queued before "second" but is now the more recent
        controller.admit("first", t0 + secs(2));
        controller.admit("third", t0 + secs(3));

        assert!(controller.snapshot("first", t0 + secs(3)).is_some());
        assert!(controller.snapshot("second", t0 + secs(3)).is_none());
        assert!(controller.snapshot("third", t0 + secs(3)).is_some());
    }

    #[test]
    fn test_cap_sweeps_inline_at_most_once_per_window() {
        let controller = controller(5).with_max_tracked(3);
        let t0 = Instant::now();

        controller.admit("a", t0);
        controller.admit("b", t0 + secs(1));
        controller.admit("c", t0 + secs(2));
        // Cap reached: sweeps (nothing idle yet) and evicts "a"
        controller.admit("d", t0 + secs(3));
        assert!(controller.snapshot("a", t0 + secs(3)).is_none());

        // "b" and "c" are now idle, but a sweep ran under a window ago, so
        // only the least recent one is evicted
        let now = t0 + Duration::from_millis(62_500);
        controller.admit("e", now);
        assert_eq!(controller.tracked_identities(), 3);
        assert!(controller.snapshot("b", now).is_none());
        assert!(controller.snapshot("c", now).is_some());

        // A window after the last inline sweep, idle identities go in bulk
        let now = t0 + secs(70);
        controller.admit("f", now);
        assert_eq!(controller.tracked_identities(), 2);
        assert!(controller.snapshot("e", now).is_some());
        assert!(controller.snapshot("f", now).is_some());
    }

    #[test]
    fn test_sweep_compacts_recency_queue() {
        let controller = controller(1);
        let t0 = Instant::now();

        for i in 0..100 {
            controller.admit(&format!("client-{}", i), t0);
        }
        controller.admit("late", t0 + secs(30));
        controller.reset("client-0");
        assert_eq!(controller.recency.lock().len(), 101);

        controller.sweep(t0 + secs(61));
        assert_eq!(controller.tracked_identities(), 1);
        assert_eq!(controller.recency.lock().len(), 1);
    }

    #[test]
    fn test_permissive_controller() {
        let controller = AdmissionController::permissive("health");
        let now = Instant::now();

        for _ in 0..1000 {
            assert!(controller.admit("A", now).allowed);
        }
        assert_eq!(controller.tracked_identities(), 0);
        assert!(controller.snapshot("A", now).is_none());
        assert_eq!(controller.sweep(now), 0);
        assert!(controller.is_permissive());
    }

    #[test]
    fn test_reset_and_clear() {
        let controller = controller(1);
        let now = Instant::now();

        controller.admit("A", now);
        controller.admit("B", now);
        assert!(controller.reset("A"));
        assert!(!controller.reset("A"));
        assert_eq!(controller.tracked_identities(), 1);

        controller.clear();
        assert_eq!(controller.tracked_identities(), 0);
    }

    #[test]
    fn test_retry_after_secs_rounds_up() {
        let decision = Decision::denied(1, Duration::from_millis(1500), DenyReason::Blocked);
        assert_eq!(decision.retry_after_secs(), Some(2));

        let decision = Decision::denied(1, Duration::from_millis(10), DenyReason::Blocked);
        assert_eq!(decision.retry_after_secs(), Some(1));

        assert_eq!(Decision::unlimited().retry_after_secs(), None);
    }
}
