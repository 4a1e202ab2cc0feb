//! Scan session registry.
//!
//! Each settled navigation opens one [`ScanSession`]. The registry is the
//! single owner of "which session is current":
//!
//! - session ids are strictly increasing;
//! - creating a session supersedes the previous current one synchronously, so
//!   two non-superseded sessions never coexist;
//! - an address change supersedes the current session as well, before the
//!   new address has settled into a session of its own;
//! - a superseded session still resolves (its relay call is not aborted) but
//!   its outcome is muted instead of rendered;
//! - resolving an already resolved session is a no-op.
//!
//! Failures never leave the indicator blank: a failed relay call resolves to
//! an `Unknown` verdict that is rendered like any other.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::RelayError;
use crate::verdict::Verdict;

/// Default number of lifecycle events retained for diagnostics.
pub const DEFAULT_MAX_LIFECYCLE_EVENTS: usize = 256;

/// Monotonic session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scan-{}", self.0)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    InFlight,
    Completed,
    Failed,
}

impl SessionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One analysis request for one settled navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSession {
    pub id: SessionId,
    pub url: String,
    pub state: SessionState,
    /// Set once a newer session exists. Orthogonal to `state`.
    pub superseded: bool,
    pub created_at: Instant,
}

/// Handle returned by [`SessionRegistry::create_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub id: SessionId,
    pub url: String,
    /// Previously current session that this one superseded, if it was still
    /// unresolved.
    pub superseded: Option<SessionId>,
}

/// Why a resolution was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The session already resolved; duplicate responses are no-ops.
    AlreadyResolved,
    /// The id was never issued by this registry.
    UnknownSession,
}

/// What the coordinator must do with a resolved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// Session is current: hand the verdict to the renderer.
    Render {
        id: SessionId,
        verdict: Verdict,
        /// True when the verdict was synthesized from a relay failure.
        failed: bool,
    },
    /// Session was superseded; its outcome never reaches the renderer.
    Muted {
        id: SessionId,
        state: SessionState,
        superseded_by: Option<SessionId>,
    },
    /// Nothing to do.
    Ignored { id: SessionId, reason: IgnoreReason },
}

impl Resolution {
    /// Verdict to render, if any.
    #[must_use]
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Self::Render { verdict, .. } => Some(verdict),
            Self::Muted { .. } | Self::Ignored { .. } => None,
        }
    }
}

/// Lifecycle stage bucket for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Created,
    InFlight,
    Superseded,
    Completed,
    Failed,
    Rendered,
    Muted,
    Ignored,
}

/// One recorded lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLifecycleEvent {
    /// Registry-local event sequence.
    pub event_seq: u64,
    pub session_id: SessionId,
    pub stage: SessionStage,
    /// Current session at emission time.
    pub current: Option<SessionId>,
}

/// Registry counters for observability and triage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Sessions created.
    pub created: u64,
    /// Sessions moved to in-flight.
    pub dispatched: u64,
    /// Sessions superseded while unresolved.
    pub superseded: u64,
    /// Sessions resolved with a verdict from the service.
    pub completed: u64,
    /// Sessions resolved from a relay failure.
    pub failed: u64,
    /// Resolutions handed to the renderer.
    pub rendered: u64,
    /// Resolutions muted by supersession.
    pub muted: u64,
    /// Duplicate or unknown resolutions dropped.
    pub ignored: u64,
}

/// Diagnostic view of one unresolved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub url: String,
    pub state: SessionState,
    pub superseded: bool,
}

/// Diagnostic view of the whole registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRegistrySnapshot {
    pub current: Option<SessionId>,
    pub next_id: u64,
    pub unresolved: Vec<SessionSnapshot>,
    pub metrics: SessionMetrics,
}

/// Single owner of session state for one page instance.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, ScanSession>,
    next_id: u64,
    current: Option<SessionId>,
    metrics: SessionMetrics,
    lifecycle_events: VecDeque<SessionLifecycleEvent>,
    max_lifecycle_events: usize,
    next_event_seq: u64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_lifecycle_events(DEFAULT_MAX_LIFECYCLE_EVENTS)
    }

    #[must_use]
    pub fn with_max_lifecycle_events(max_lifecycle_events: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_id: 1,
            current: None,
            metrics: SessionMetrics::default(),
            lifecycle_events: VecDeque::new(),
            max_lifecycle_events,
            next_event_seq: 0,
        }
    }

    /// Open a session for `url`, superseding the current one.
    pub fn create_session(&mut self, url: impl Into<String>, now: Instant) -> SessionTicket {
        let id = SessionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let url = url.into();

        let mut superseded = None;
        if let Some(previous) = self.current {
            if let Some(session) = self.sessions.get_mut(&previous) {
                if !session.superseded {
                    session.superseded = true;
                    superseded = Some(previous);
                }
            }
        }
        self.current = Some(id);
        self.sessions.insert(
            id,
            ScanSession {
                id,
                url: url.clone(),
                state: SessionState::Pending,
                superseded: false,
                created_at: now,
            },
        );

        self.metrics.created = self.metrics.created.saturating_add(1);
        if let Some(previous) = superseded {
            self.metrics.superseded = self.metrics.superseded.saturating_add(1);
            self.push_lifecycle_event(previous, SessionStage::Superseded);
            debug!(session = %previous, by = %id, "Session superseded");
        }
        self.push_lifecycle_event(id, SessionStage::Created);
        debug!(session = %id, url = %url, "Session created");

        SessionTicket {
            id,
            url,
            superseded,
        }
    }

    /// The address moved before any newer session exists: supersede the
    /// current session so its outcome is muted instead of drawn on the new
    /// page. Returns the session superseded, if it was still unresolved.
    pub fn supersede_current(&mut self) -> Option<SessionId> {
        let current = self.current?;
        let session = self.sessions.get_mut(&current)?;
        if session.superseded {
            return None;
        }
        session.superseded = true;
        self.metrics.superseded = self.metrics.superseded.saturating_add(1);
        self.push_lifecycle_event(current, SessionStage::Superseded);
        debug!(session = %current, "Session superseded by address change");
        Some(current)
    }

    /// Mark a pending session as in flight.
    ///
    /// Returns false when the session is unknown or already past `Pending`.
    pub fn dispatch(&mut self, id: SessionId) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            return false;
        };
        if session.state != SessionState::Pending {
            return false;
        }
        session.state = SessionState::InFlight;
        self.metrics.dispatched = self.metrics.dispatched.saturating_add(1);
        self.push_lifecycle_event(id, SessionStage::InFlight);
        trace!(session = %id, "Session in flight");
        true
    }

    /// Apply the relay outcome for `id`.
    ///
    /// The session leaves the registry on its first resolution; later
    /// resolutions for the same id are ignored.
    pub fn resolve(&mut self, id: SessionId, outcome: Result<Verdict, RelayError>) -> Resolution {
        let Some(mut session) = self.sessions.remove(&id) else {
            let reason = if id.get() < self.next_id {
                IgnoreReason::AlreadyResolved
            } else {
                IgnoreReason::UnknownSession
            };
            self.metrics.ignored = self.metrics.ignored.saturating_add(1);
            self.push_lifecycle_event(id, SessionStage::Ignored);
            trace!(session = %id, ?reason, "Resolution ignored");
            return Resolution::Ignored { id, reason };
        };

        let (verdict, failed) = match outcome {
            Ok(verdict) => {
                session.state = SessionState::Completed;
                self.metrics.completed = self.metrics.completed.saturating_add(1);
                self.push_lifecycle_event(id, SessionStage::Completed);
                (verdict, false)
            }
            Err(err) => {
                session.state = SessionState::Failed;
                self.metrics.failed = self.metrics.failed.saturating_add(1);
                self.push_lifecycle_event(id, SessionStage::Failed);
                debug!(session = %id, kind = %err.kind(), error = %err, "Session failed");
                (Verdict::unknown(err.to_string()), true)
            }
        };

        if session.superseded || self.current != Some(id) {
            self.metrics.muted = self.metrics.muted.saturating_add(1);
            self.push_lifecycle_event(id, SessionStage::Muted);
            debug!(session = %id, current = ?self.current.map(SessionId::get), "Late result muted");
            return Resolution::Muted {
                id,
                state: session.state,
                superseded_by: self.current.filter(|current| *current != id),
            };
        }

        self.metrics.rendered = self.metrics.rendered.saturating_add(1);
        self.push_lifecycle_event(id, SessionStage::Rendered);
        Resolution::Render {
            id,
            verdict,
            failed,
        }
    }

    #[must_use]
    pub fn current_id(&self) -> Option<SessionId> {
        self.current
    }

    #[must_use]
    pub fn is_current(&self, id: SessionId) -> bool {
        self.current == Some(id)
    }

    /// Unresolved session by id.
    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<&ScanSession> {
        self.sessions.get(&id)
    }

    /// Number of sessions whose relay call has not resolved yet.
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Return recent lifecycle events, oldest first. `limit == 0` returns all.
    #[must_use]
    pub fn lifecycle_events(&self, limit: usize) -> Vec<SessionLifecycleEvent> {
        let keep = if limit == 0 {
            self.lifecycle_events.len()
        } else {
            limit.min(self.lifecycle_events.len())
        };
        let start = self.lifecycle_events.len().saturating_sub(keep);
        self.lifecycle_events.iter().skip(start).cloned().collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionRegistrySnapshot {
        SessionRegistrySnapshot {
            current: self.current,
            next_id: self.next_id,
            unresolved: self
                .sessions
                .values()
                .map(|s| SessionSnapshot {
                    id: s.id,
                    url: s.url.clone(),
                    state: s.state,
                    superseded: s.superseded,
                })
                .collect(),
            metrics: self.metrics.clone(),
        }
    }

    /// Structural invariants of the registry; empty when healthy.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let live: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| !s.superseded)
            .map(|s| s.id)
            .collect();
        if live.len() > 1 {
            violations.push(format!("{} non-superseded sessions coexist", live.len()));
        }
        if let Some(id) = live.first() {
            if self.current != Some(*id) {
                violations.push(format!("live session {id} is not current"));
            }
        }
        if let Some(current) = self.current {
            if current.get() >= self.next_id {
                violations.push(format!("current {current} was never issued"));
            }
        }
        for session in self.sessions.values() {
            if session.state.is_terminal() {
                violations.push(format!("resolved session {} still registered", session.id));
            }
            if Some(session.id) > self.current {
                violations.push(format!("session {} newer than current", session.id));
            }
        }
        violations
    }

    fn push_lifecycle_event(&mut self, session_id: SessionId, stage: SessionStage) {
        if self.max_lifecycle_events == 0 {
            return;
        }
        let event = SessionLifecycleEvent {
            event_seq: self.next_event_seq,
            session_id,
            stage,
            current: self.current,
        };
        self.next_event_seq = self.next_event_seq.saturating_add(1);
        if self.lifecycle_events.len() == self.max_lifecycle_events {
            self.lifecycle_events.pop_front();
        }
        self.lifecycle_events.push_back(event);
    }
}
