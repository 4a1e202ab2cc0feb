//! Message relay across the privilege boundary.
//!
//! The page-side overlay may not reach the analysis service itself. It hands
//! a serialized [`RelayRequest`] to a privileged [`RelayHost`], which performs
//! the call and answers with a serialized [`RelayResponse`]. Every request
//! gets exactly one reply; a caller that stops waiting (timeout, shutdown)
//! simply drops its end.
//!
//! ```text
//!  overlay ──BoundaryRelay::send──▶ mpsc<RelayEnvelope> ──▶ RelayHost::serve
//!     ▲                                                          │
//!     └────────────── oneshot<String> (RelayResponse) ◀──────────┘
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol::{AnalysisEntry, RelayRequest, RelayResponse};
use crate::service::{AnalysisClient, validate_page_url};
use crate::verdict::Verdict;

/// Relay future type.
pub type RelayFuture<'a> = Pin<Box<dyn Future<Output = Result<Verdict, RelayError>> + Send + 'a>>;

/// Asynchronous request/response channel to a privileged relay.
pub trait RelayChannel: Send + Sync {
    /// Channel identifier used in logs.
    fn name(&self) -> &'static str;

    /// Request a verdict for `url`. Resolves exactly once.
    fn send<'a>(&'a self, url: &'a str) -> RelayFuture<'a>;
}

/// Analysis future type.
pub type AnalysisFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AnalysisEntry, RelayError>> + Send + 'a>>;

/// Whatever the privileged side uses to obtain an analysis record.
pub trait AnalysisBackend: Send + Sync {
    fn analyze<'a>(&'a self, url: &'a str) -> AnalysisFuture<'a>;
}

impl AnalysisBackend for AnalysisClient {
    fn analyze<'a>(&'a self, url: &'a str) -> AnalysisFuture<'a> {
        Box::pin(AnalysisClient::analyze(self, url))
    }
}

/// One serialized request plus the slot for its reply.
#[derive(Debug)]
pub struct RelayEnvelope {
    pub message: String,
    pub reply: oneshot::Sender<String>,
}

/// Privileged end of the relay.
#[derive(Clone)]
pub struct RelayHost {
    backend: Arc<dyn AnalysisBackend>,
}

impl RelayHost {
    #[must_use]
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    /// Answer one serialized request.
    pub async fn handle(&self, message: &str) -> RelayResponse {
        let request = match RelayRequest::from_json(message) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "Rejecting unsupported relay message");
                return RelayResponse::failure(&RelayError::Malformed(format!(
                    "unsupported relay message: {err}"
                )));
            }
        };
        match request {
            RelayRequest::AnalyzeUrl { url } => match self.backend.analyze(&url).await {
                Ok(entry) => RelayResponse::ok(entry),
                Err(err) => {
                    debug!(url = %url, kind = %err.kind(), error = %err, "Analysis failed");
                    RelayResponse::failure(&err)
                }
            },
        }
    }

    /// Serve envelopes until every sender is gone. Requests are answered
    /// concurrently; each envelope is replied to at most once.
    pub async fn serve(self, mut rx: mpsc::Receiver<RelayEnvelope>) {
        while let Some(envelope) = rx.recv().await {
            let host = self.clone();
            tokio::spawn(async move {
                let response = host.handle(&envelope.message).await;
                let raw = match response.to_json() {
                    Ok(raw) => raw,
                    Err(err) => {
                        warn!(error = %err, "Failed to encode relay reply");
                        return;
                    }
                };
                if envelope.reply.send(raw).is_err() {
                    debug!("Relay caller went away before the reply");
                }
            });
        }
        debug!("Relay host stopping, no senders left");
    }

    /// Spawn this host behind a bounded queue and return the page-side end.
    #[must_use]
    pub fn spawn(self, config: &RelayConfig) -> (BoundaryRelay, JoinHandle<()>) {
        let (relay, rx) = BoundaryRelay::channel(config.queue_capacity, config.timeout());
        let handle = tokio::spawn(self.serve(rx));
        (relay, handle)
    }
}

/// Page-side end of the relay.
///
/// Each round-trip is bounded by `timeout`; when it elapses the call resolves
/// to [`RelayError::Timeout`] and a late reply is discarded.
#[derive(Debug, Clone)]
pub struct BoundaryRelay {
    tx: mpsc::Sender<RelayEnvelope>,
    timeout: Duration,
}

impl BoundaryRelay {
    #[must_use]
    pub fn new(tx: mpsc::Sender<RelayEnvelope>, timeout: Duration) -> Self {
        Self { tx, timeout }
    }

    /// Create a bounded envelope queue; the receiver goes to the host.
    #[must_use]
    pub fn channel(capacity: usize, timeout: Duration) -> (Self, mpsc::Receiver<RelayEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, timeout), rx)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn round_trip(&self, url: &str) -> Result<Verdict, RelayError> {
        validate_page_url(url)?;
        let message = RelayRequest::analyze(url.trim())
            .to_json()
            .map_err(|e| RelayError::Malformed(e.to_string()))?;
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(RelayEnvelope { message, reply })
            .await
            .map_err(|_| RelayError::Unavailable("relay host stopped".to_string()))?;
        let raw = reply_rx.await.map_err(|_| RelayError::ReplyLost)?;
        RelayResponse::decode(&raw)
    }
}

impl RelayChannel for BoundaryRelay {
    fn name(&self) -> &'static str {
        "boundary"
    }

    fn send<'a>(&'a self, url: &'a str) -> RelayFuture<'a> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.round_trip(url)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        url,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Relay round-trip timed out"
                    );
                    Err(RelayError::Timeout(self.timeout))
                }
            }
        })
    }
}
