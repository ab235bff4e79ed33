use std::future::Future;
use std::time::Duration;

use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::InFlightPolicy;
use crate::error::BackendError;

/// Lifecycle of one resource's fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    InFlight,
    Settled,
}

/// Per-resource in-flight guard.
///
/// At most one fetch per resource runs at a time. What a second caller gets
/// depends on the [`InFlightPolicy`].
pub struct RequestGuard {
    policy: InFlightPolicy,
    gate: Mutex<()>,
    phase: watch::Sender<RequestPhase>,
}

pub enum Admission<'a> {
    Run(RequestPermit<'a>),
    Skipped,
    Coalesced,
}

/// Held for the duration of a fetch; settles the guard when dropped
pub struct RequestPermit<'a> {
    _gate: MutexGuard<'a, ()>,
    phase: &'a watch::Sender<RequestPhase>,
}

impl Drop for RequestPermit<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(RequestPhase::Settled);
    }
}

impl RequestGuard {
    pub fn new(policy: InFlightPolicy) -> Self {
        let (phase, _) = watch::channel(RequestPhase::Idle);
        Self { policy, gate: Mutex::new(()), phase }
    }

    pub fn policy(&self) -> InFlightPolicy {
        self.policy
    }

    pub fn phase(&self) -> RequestPhase {
        *self.phase.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<RequestPhase> {
        self.phase.subscribe()
    }

    pub async fn admit(&self) -> Admission<'_> {
        if let Ok(gate) = self.gate.try_lock() {
            return self.start(gate);
        }

        match self.policy {
            InFlightPolicy::Drop => Admission::Skipped,
            InFlightPolicy::Queue => {
                let gate = self.gate.lock().await;
                self.start(gate)
            }
            InFlightPolicy::Coalesce => {
                drop(self.gate.lock().await);
                Admission::Coalesced
            }
        }
    }

    fn start<'a>(&'a self, gate: MutexGuard<'a, ()>) -> Admission<'a> {
        self.phase.send_replace(RequestPhase::InFlight);
        Admission::Run(RequestPermit { _gate: gate, phase: &self.phase })
    }
}

/// Run a backend call bounded by a timeout and a cancellation token
pub async fn run_with_deadline<T, F>(fut: F, timeout: Duration, cancel: &CancellationToken) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(BackendError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(inner) => inner,
            Err(_) => Err(BackendError::Timeout(timeout)),
        },
    }
}

/// Timeout plus a replaceable cancellation token shared by a store's calls
pub struct Deadline {
    timeout: Duration,
    token: std::sync::RwLock<CancellationToken>,
}

impl Deadline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, token: std::sync::RwLock::new(CancellationToken::new()) }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<T, F>(&self, fut: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        self.run_within(self.timeout, fut).await
    }

    /// Like `run`, with a per-call timeout instead of the shared one
    pub async fn run_within<T, F>(&self, timeout: Duration, fut: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        let token = self.token.read().unwrap_or_else(|e| e.into_inner()).clone();
        run_with_deadline(fut, timeout, &token).await
    }

    /// Cancel every call started so far; later calls get a fresh token
    pub fn cancel_all(&self) {
        let old = {
            let mut token = self.token.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *token, CancellationToken::new())
        };
        old.cancel();
    }
}
