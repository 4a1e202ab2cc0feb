//! In-page navigation detection.
//!
//! A [`ChangeSource`] reports structural changes of the host document along
//! with the document address at that moment. The [`NavigationWatcher`] turns
//! that stream into two signals:
//!
//! * [`NavigationSignal::AddressChanged`] immediately when the address moves,
//!   so a stale indicator can be removed before the new page settles;
//! * [`NavigationSignal::Settled`] once the address has been quiet for the
//!   configured period. Bursts collapse to their final destination.
//!
//! One settled event is also emitted after initial load, covering pages that
//! never navigate in place. A source that stops reporting changes does not
//! cancel the pending emission: it still fires once its quiet period ends.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::WatcherConfig;
use crate::debounce::Debouncer;

/// A settled navigation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub url: String,
    pub observed_at: Instant,
}

/// Output of the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationSignal {
    /// The document address moved; any rendered indicator is now stale.
    AddressChanged { url: String },
    /// The address stayed put for the quiet period.
    Settled(NavigationEvent),
}

/// Future yielding the document address after the next structural change,
/// or `None` once no further changes will be reported.
pub type ChangeFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

/// Capability to observe structural changes of the host document.
///
/// Implementations may be backed by mutation observation, polling, or a
/// navigation-event API. `next_change` must be cancel-safe: the watcher drops
/// the future whenever its quiet-period timer fires first.
pub trait ChangeSource: Send {
    fn next_change(&mut self) -> ChangeFuture<'_>;
}

/// Change source fed by an external observer (mutation observer callback,
/// navigation API listener) that pushes the current address on each change.
#[derive(Debug)]
pub struct ChannelChangeSource {
    rx: mpsc::Receiver<String>,
}

impl ChannelChangeSource {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Create a bounded feed and its source.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

impl ChangeSource for ChannelChangeSource {
    fn next_change(&mut self) -> ChangeFuture<'_> {
        Box::pin(self.rx.recv())
    }
}

/// Change source that samples the address on a fixed interval.
pub struct PollingChangeSource<F> {
    sample: F,
    interval: Duration,
}

impl<F> PollingChangeSource<F>
where
    F: FnMut() -> Option<String> + Send,
{
    #[must_use]
    pub fn new(sample: F, interval: Duration) -> Self {
        Self { sample, interval }
    }
}

impl<F> ChangeSource for PollingChangeSource<F>
where
    F: FnMut() -> Option<String> + Send,
{
    fn next_change(&mut self) -> ChangeFuture<'_> {
        let interval = self.interval;
        Box::pin(async move {
            tokio::time::sleep(interval).await;
            (self.sample)()
        })
    }
}

/// Debounced navigation detector.
#[derive(Debug)]
pub struct NavigationWatcher {
    last_url: String,
    navigation_quiet: Duration,
    debouncer: Debouncer<String, Instant>,
}

impl NavigationWatcher {
    /// Start watching a freshly loaded document, scheduling the initial scan.
    #[must_use]
    pub fn new(initial_url: impl Into<String>, now: Instant, config: &WatcherConfig) -> Self {
        let initial_url = initial_url.into();
        let mut debouncer = Debouncer::new();
        debouncer.schedule(initial_url.clone(), now, config.initial_quiet());
        Self {
            last_url: initial_url,
            navigation_quiet: config.navigation_quiet(),
            debouncer,
        }
    }

    /// Last observed document address.
    #[must_use]
    pub fn last_url(&self) -> &str {
        &self.last_url
    }

    /// Due instant of the pending settled event.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Number of scheduled emissions dropped by a newer navigation.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.debouncer.cancelled()
    }

    /// Record the address seen after a structural change.
    ///
    /// Returns true when the address differs from the last one observed; the
    /// settled emission is then (re)scheduled for this address.
    pub fn observe(&mut self, url: &str, now: Instant) -> bool {
        if url == self.last_url {
            return false;
        }
        self.last_url = url.to_string();
        if let Some(replaced) = self
            .debouncer
            .schedule(url.to_string(), now, self.navigation_quiet)
        {
            trace!(replaced = %replaced, url, "Navigation superseded pending emission");
        }
        true
    }

    /// Emit the settled event if its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<NavigationEvent> {
        self.debouncer
            .poll_due(now)
            .map(|url| NavigationEvent {
                url,
                observed_at: now,
            })
    }

    /// Drive the watcher until the source ends or the receiver goes away.
    ///
    /// When the source ends, a pending settled event is still emitted at its
    /// deadline before returning.
    pub async fn run<C>(mut self, mut source: C, signals: mpsc::Sender<NavigationSignal>)
    where
        C: ChangeSource,
    {
        loop {
            let deadline = self.deadline();
            tokio::select! {
                change = source.next_change() => {
                    let Some(url) = change else {
                        debug!(last_url = %self.last_url, "Change source closed, watcher stopping");
                        self.settle_pending(&signals).await;
                        return;
                    };
                    if self.observe(&url, Instant::now()) {
                        debug!(url = %url, "Address changed");
                        if signals.send(NavigationSignal::AddressChanged { url }).await.is_err() {
                            return;
                        }
                    }
                }
                () = sleep_until_deadline(deadline) => {
                    if let Some(event) = self.poll(Instant::now()) {
                        debug!(url = %event.url, "Navigation settled");
                        if signals.send(NavigationSignal::Settled(event)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn settle_pending(&mut self, signals: &mpsc::Sender<NavigationSignal>) {
        let Some(deadline) = self.deadline() else {
            return;
        };
        tokio::time::sleep_until(deadline).await;
        if let Some(event) = self.poll(Instant::now()) {
            debug!(url = %event.url, "Navigation settled after source closed");
            let _ = signals.send(NavigationSignal::Settled(event)).await;
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WatcherConfig {
        WatcherConfig::default()
    }

    #[test]
    fn initial_scan_fires_after_initial_quiet() {
        let t0 = Instant::now();
        let mut watcher = NavigationWatcher::new("https://mail.test/", t0, &config());
        assert_eq!(watcher.poll(t0 + Duration::from_millis(1999)), None);
        let event = watcher.poll(t0 + Duration::from_millis(2000)).unwrap();
        assert_eq!(event.url, "https://mail.test/");
        assert_eq!(watcher.deadline(), None);
    }

    #[test]
    fn same_address_is_not_a_navigation() {
        let t0 = Instant::now();
        let mut watcher = NavigationWatcher::new("https://mail.test/", t0, &config());
        assert!(!watcher.observe("https://mail.test/", t0));
        assert_eq!(watcher.coalesced(), 0);
    }

    #[test]
    fn burst_collapses_to_final_destination() {
        let t0 = Instant::now();
        let mut watcher = NavigationWatcher::new("https://mail.test/", t0, &config());
        let _ = watcher.poll(t0 + Duration::from_secs(2));

        let t1 = t0 + Duration::from_secs(5);
        assert!(watcher.observe("https://mail.test/#a", t1));
        assert!(watcher.observe("https://mail.test/#b", t1 + Duration::from_millis(300)));
        assert!(watcher.observe("https://mail.test/#c", t1 + Duration::from_millis(600)));

        assert_eq!(watcher.poll(t1 + Duration::from_millis(1500)), None);
        let event = watcher.poll(t1 + Duration::from_millis(2100)).unwrap();
        assert_eq!(event.url, "https://mail.test/#c");
        assert_eq!(watcher.coalesced(), 2);
        assert_eq!(watcher.poll(t1 + Duration::from_secs(10)), None);
    }

    #[test]
    fn navigation_during_initial_quiet_replaces_initial_scan() {
        let t0 = Instant::now();
        let mut watcher = NavigationWatcher::new("https://app.test/", t0, &config());
        assert!(watcher.observe("https://app.test/inbox", t0 + Duration::from_millis(500)));
        assert_eq!(watcher.poll(t0 + Duration::from_millis(2000)), None);
        let event = watcher.poll(t0 + Duration::from_millis(2000 + 1000)).unwrap();
        assert_eq!(event.url, "https://app.test/inbox");
    }

    #[tokio::test(start_paused = true)]
    async fn run_emits_change_then_settled() {
        let (feed, source) = ChannelChangeSource::channel(8);
        let (tx, mut rx) = mpsc::channel(8);
        let watcher = NavigationWatcher::new("https://app.test/", Instant::now(), &config());
        let handle = tokio::spawn(watcher.run(source, tx));

        let initial = rx.recv().await.unwrap();
        assert!(matches!(initial, NavigationSignal::Settled(ref e) if e.url == "https://app.test/"));

        feed.send("https://app.test/#settings".to_string()).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            NavigationSignal::AddressChanged {
                url: "https://app.test/#settings".to_string()
            }
        );
        let settled = rx.recv().await.unwrap();
        assert!(
            matches!(settled, NavigationSignal::Settled(ref e) if e.url == "https://app.test/#settings")
        );

        drop(feed);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_source_still_emits_initial_scan() {
        let (feed, source) = ChannelChangeSource::channel(8);
        drop(feed);
        let (tx, mut rx) = mpsc::channel(8);
        let start = Instant::now();
        let watcher = NavigationWatcher::new("https://app.test/", start, &config());
        let handle = tokio::spawn(watcher.run(source, tx));

        let initial = rx.recv().await.unwrap();
        assert!(matches!(initial, NavigationSignal::Settled(ref e) if e.url == "https://app.test/"));
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert_eq!(rx.recv().await, None);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn source_closing_mid_burst_settles_final_destination() {
        let (feed, source) = ChannelChangeSource::channel(8);
        let (tx, mut rx) = mpsc::channel(8);
        let watcher = NavigationWatcher::new("https://app.test/", Instant::now(), &config());
        let handle = tokio::spawn(watcher.run(source, tx));

        feed.send("https://app.test/#a".to_string()).await.unwrap();
        feed.send("https://app.test/#b".to_string()).await.unwrap();
        drop(feed);

        let mut signals = Vec::new();
        while let Some(signal) = rx.recv().await {
            signals.push(signal);
        }
        handle.await.unwrap();

        let settled: Vec<_> = signals
            .iter()
            .filter_map(|s| match s {
                NavigationSignal::Settled(e) => Some(e.url.as_str()),
                NavigationSignal::AddressChanged { .. } => None,
            })
            .collect();
        assert_eq!(settled, vec!["https://app.test/#b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_source_reports_sampled_value() {
        let mut calls = 0u32;
        let mut source = PollingChangeSource::new(
            move || {
                calls += 1;
                Some(format!("https://app.test/{calls}"))
            },
            Duration::from_millis(250),
        );
        assert_eq!(source.next_change().await.as_deref(), Some("https://app.test/1"));
        assert_eq!(source.next_change().await.as_deref(), Some("https://app.test/2"));
    }
}
