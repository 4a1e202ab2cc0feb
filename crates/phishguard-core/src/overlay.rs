//! Scan coordinator.
//!
//! [`Overlay`] is the one place where navigation signals, relay completions
//! and rendering meet. It runs on a single task: relay calls are spawned into
//! a [`JoinSet`] and their outcomes are joined back here, so the session
//! registry and the indicator are never touched concurrently. A relay call
//! that panics resolves its session as a lost reply.
//!
//! ```text
//!  NavigationWatcher ──signals──▶ Overlay::run ──spawn──▶ RelayChannel::send
//!                                   │    ▲                      │
//!                                   │    └────── JoinSet ◀──────┘
//!                                   ▼
//!                             VerdictRenderer
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, RelayError};
use crate::navigation::{ChangeSource, NavigationEvent, NavigationSignal, NavigationWatcher};
use crate::relay::RelayChannel;
use crate::renderer::{IndicatorSurface, VerdictRenderer};
use crate::session::{Resolution, SessionId, SessionMetrics, SessionRegistry};
use crate::verdict::Verdict;

/// Capacity of the watcher-to-overlay signal queue.
pub const SIGNAL_QUEUE_CAPACITY: usize = 64;

/// Counters reported when the overlay stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySummary {
    /// Relay calls issued (one per settled navigation).
    pub relay_calls: u64,
    /// Indicators removed because the address moved.
    pub stale_cleared: u64,
    pub sessions: SessionMetrics,
}

/// Coordinates sessions, relay calls and the indicator for one page.
pub struct Overlay<S> {
    registry: SessionRegistry,
    renderer: VerdictRenderer<S>,
    relay: Arc<dyn RelayChannel>,
    in_flight: JoinSet<Result<Verdict, RelayError>>,
    sessions_by_task: HashMap<task::Id, SessionId>,
    relay_calls: u64,
    stale_cleared: u64,
}

impl<S: IndicatorSurface> Overlay<S> {
    #[must_use]
    pub fn new(relay: Arc<dyn RelayChannel>, renderer: VerdictRenderer<S>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            renderer,
            relay,
            in_flight: JoinSet::new(),
            sessions_by_task: HashMap::new(),
            relay_calls: 0,
            stale_cleared: 0,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn renderer(&self) -> &VerdictRenderer<S> {
        &self.renderer
    }

    pub fn into_renderer(self) -> VerdictRenderer<S> {
        self.renderer
    }

    #[must_use]
    pub fn summary(&self) -> OverlaySummary {
        OverlaySummary {
            relay_calls: self.relay_calls,
            stale_cleared: self.stale_cleared,
            sessions: self.registry.metrics().clone(),
        }
    }

    /// The address moved: drop the indicator before the new page settles and
    /// mute the session scanning the page just left.
    pub fn on_address_changed(&mut self, url: &str) {
        if let Some(id) = self.registry.supersede_current() {
            debug!(session = %id, url, "Muting scan of the previous address");
        }
        if self.renderer.clear() {
            self.stale_cleared = self.stale_cleared.saturating_add(1);
            debug!(url, "Cleared stale indicator");
        }
    }

    /// Open a session for a settled navigation and issue its relay call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_settled(&mut self, event: NavigationEvent) -> SessionId {
        let ticket = self.registry.create_session(event.url, event.observed_at);
        let id = ticket.id;
        let url = ticket.url;
        self.registry.dispatch(id);
        self.relay_calls = self.relay_calls.saturating_add(1);

        let relay = Arc::clone(&self.relay);
        debug!(session = %id, relay = relay.name(), url = %url, "Issuing relay call");
        let handle = self
            .in_flight
            .spawn(async move { relay.send(&url).await });
        self.sessions_by_task.insert(handle.id(), id);
        id
    }

    /// Apply a joined relay task. A task that panicked or was cancelled
    /// resolves its session as a lost reply.
    fn on_joined(&mut self, joined: Result<(task::Id, Result<Verdict, RelayError>), JoinError>) {
        let (task_id, outcome) = match joined {
            Ok((task_id, outcome)) => (task_id, outcome),
            Err(err) => {
                warn!(error = %err, "Relay call task failed");
                (err.id(), Err(RelayError::ReplyLost))
            }
        };
        match self.sessions_by_task.remove(&task_id) {
            Some(id) => {
                self.on_completion(id, outcome);
            }
            None => warn!(task = %task_id, "Relay call finished for an untracked task"),
        }
    }

    /// Apply a relay outcome; renders only if the session is still current.
    pub fn on_completion(
        &mut self,
        id: SessionId,
        outcome: Result<Verdict, RelayError>,
    ) -> Resolution {
        let resolution = self.registry.resolve(id, outcome);
        if let Resolution::Render {
            verdict, failed, ..
        } = &resolution
        {
            if *failed {
                info!(session = %id, "Scan failed, showing unknown indicator");
            }
            self.renderer.render(verdict);
        }
        resolution
    }

    /// Process signals until the watcher stops, then wait for every
    /// outstanding relay call to resolve.
    pub async fn run(&mut self, mut signals: mpsc::Receiver<NavigationSignal>) -> OverlaySummary {
        let mut signals_open = true;
        loop {
            if !signals_open && self.registry.unresolved() == 0 {
                break;
            }
            tokio::select! {
                signal = signals.recv(), if signals_open => match signal {
                    Some(NavigationSignal::AddressChanged { url }) => self.on_address_changed(&url),
                    Some(NavigationSignal::Settled(event)) => {
                        self.on_settled(event);
                    }
                    None => {
                        debug!(unresolved = self.registry.unresolved(), "Signals closed, draining");
                        signals_open = false;
                    }
                },
                Some(joined) = self.in_flight.join_next_with_id() => self.on_joined(joined),
                else => break,
            }
        }
        let summary = self.summary();
        debug!(
            relay_calls = summary.relay_calls,
            rendered = summary.sessions.rendered,
            muted = summary.sessions.muted,
            "Overlay stopped"
        );
        summary
    }
}

/// Watch `source` from `initial_url`, scanning every settled navigation
/// through `relay` and drawing on `surface`. Returns once the source ends and
/// every relay call has resolved.
pub async fn run_overlay<C, S>(
    config: &Config,
    initial_url: impl Into<String>,
    source: C,
    relay: Arc<dyn RelayChannel>,
    surface: S,
) -> crate::Result<(OverlaySummary, Overlay<S>)>
where
    C: ChangeSource + 'static,
    S: IndicatorSurface,
{
    let (tx, rx) = mpsc::channel(SIGNAL_QUEUE_CAPACITY);
    let watcher = NavigationWatcher::new(initial_url, Instant::now(), &config.watcher);
    let watcher_task = tokio::spawn(watcher.run(source, tx));

    let renderer = VerdictRenderer::new(surface, config.renderer.brand.clone());
    let mut overlay = Overlay::new(relay, renderer);
    let summary = overlay.run(rx).await;

    watcher_task.await.map_err(|e| {
        warn!(error = %e, "Navigation watcher task failed");
        Error::Runtime(format!("navigation watcher: {e}"))
    })?;
    Ok((summary, overlay))
}
