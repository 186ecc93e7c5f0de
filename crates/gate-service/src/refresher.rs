//! Background refresh of the dynamic risk multiplier.
//!
//! The refresher polls the shared store on a fixed interval and installs
//! each good value into `RiskState`. Store failures, timeouts and malformed
//! values are logged and skipped; the cached value stays as it was. The task
//! exits only when its cancellation token fires.
//!
//! Phases: `Idle → Fetching → {Updated | Unchanged | FailedButAlive} →
//! Waiting → Fetching …`, terminal `Stopped`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gate_bus::{ParameterStore, StoreError};
use gate_risk::{parse_multiplier, RiskError, RiskState};
use gate_telemetry::Metrics;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ServiceError, ServiceResult};

/// Cached value counts as stale after this many intervals without a refresh.
const STALE_AFTER_INTERVALS: u32 = 3;

/// Refresher state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherPhase {
    /// Created, not yet running.
    Idle,
    /// Reading the store.
    Fetching,
    /// Last cycle installed a new value.
    Updated,
    /// Last cycle found the key absent; cached value kept.
    Unchanged,
    /// Last cycle failed; cached value kept, loop continues.
    FailedButAlive,
    /// Sleeping until the next cycle.
    Waiting,
    /// Exited after a stop signal.
    Stopped,
}

/// Why a refresh cycle did not produce a value.
#[derive(Debug, Error)]
pub enum RefreshFailure {
    #[error("store read failed: {0}")]
    Store(#[from] StoreError),

    #[error("store read timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("malformed value: {0}")]
    Malformed(#[from] RiskError),
}

/// Result of one refresh cycle. Used for logging only.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Value read and installed.
    Success(f64),
    /// Key not set; nothing installed.
    Absent,
    /// Read or parse failed; nothing installed.
    Failure(RefreshFailure),
}

/// Refresher settings.
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Time between cycles.
    pub interval: Duration,
    /// Upper bound on one store read.
    pub store_timeout: Duration,
    /// Store key holding the multiplier.
    pub key: String,
}

/// Background task keeping `RiskState`'s multiplier current.
pub struct ParameterRefresher {
    config: RefresherConfig,
    store: Arc<dyn ParameterStore>,
    state: Arc<RiskState>,
    phase: Arc<RwLock<RefresherPhase>>,
    stale: AtomicBool,
    shutdown_token: CancellationToken,
}

impl ParameterRefresher {
    /// Create a refresher bound to `state`.
    pub fn new(
        config: RefresherConfig,
        store: Arc<dyn ParameterStore>,
        state: Arc<RiskState>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            state,
            phase: Arc::new(RwLock::new(RefresherPhase::Idle)),
            stale: AtomicBool::new(false),
            shutdown_token,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RefresherPhase {
        *self.phase.read()
    }

    fn set_phase(&self, phase: RefresherPhase) {
        *self.phase.write() = phase;
    }

    /// Spawn the refresh loop onto the current Tokio runtime.
    pub fn spawn(self) -> RefresherHandle {
        let phase = self.phase.clone();
        let token = self.shutdown_token.clone();
        let join = tokio::spawn(self.run());
        RefresherHandle {
            join: Some(join),
            token,
            phase,
        }
    }

    /// Run one fetch-and-install cycle.
    pub async fn refresh_once(&self) -> RefreshOutcome {
        self.set_phase(RefresherPhase::Fetching);

        let read = self.store.get(&self.config.key);
        let outcome = match tokio::time::timeout(self.config.store_timeout, read).await {
            Err(_) => RefreshOutcome::Failure(RefreshFailure::Timeout {
                timeout_ms: self.config.store_timeout.as_millis() as u64,
            }),
            Ok(Err(e)) => RefreshOutcome::Failure(e.into()),
            Ok(Ok(None)) => RefreshOutcome::Absent,
            Ok(Ok(Some(raw))) => match parse_multiplier(&raw) {
                Ok(value) => {
                    self.state.set(value);
                    RefreshOutcome::Success(value)
                }
                Err(e) => RefreshOutcome::Failure(e.into()),
            },
        };

        match &outcome {
            RefreshOutcome::Success(value) => {
                debug!(key = %self.config.key, multiplier = value, "Risk multiplier refreshed");
                Metrics::refresh("updated");
                Metrics::risk_multiplier(*value);
                self.set_phase(RefresherPhase::Updated);
            }
            RefreshOutcome::Absent => {
                debug!(
                    key = %self.config.key,
                    cached = self.state.get(),
                    "Risk multiplier not set, keeping cached value"
                );
                Metrics::refresh("absent");
                self.set_phase(RefresherPhase::Unchanged);
            }
            RefreshOutcome::Failure(cause) => {
                error!(
                    key = %self.config.key,
                    error = %cause,
                    cached = self.state.get(),
                    "Risk multiplier refresh failed, keeping cached value"
                );
                Metrics::refresh("failed");
                self.set_phase(RefresherPhase::FailedButAlive);
            }
        }

        self.report_staleness();
        outcome
    }

    /// Publish the cache age and warn once when it goes stale.
    ///
    /// Returns whether the cached value is stale. A cache that was never
    /// refreshed has no age and is not reported.
    fn report_staleness(&self) -> bool {
        let Some(age) = self
            .state
            .snapshot()
            .age(Utc::now())
            .and_then(|age| age.to_std().ok())
        else {
            return false;
        };
        Metrics::multiplier_age(age.as_secs_f64());

        let stale = age > self.config.interval * STALE_AFTER_INTERVALS;
        let was_stale = self.stale.swap(stale, Ordering::Relaxed);
        if stale && !was_stale {
            warn!(
                key = %self.config.key,
                age_ms = age.as_millis() as u64,
                cached = self.state.get(),
                "Risk multiplier is stale, still using cached value"
            );
        } else if !stale && was_stale {
            info!(key = %self.config.key, "Risk multiplier fresh again");
        }
        stale
    }

    /// Refresh loop. Returns only after the shutdown token is cancelled.
    pub async fn run(self) {
        info!(
            key = %self.config.key,
            interval_ms = self.config.interval.as_millis() as u64,
            "Risk multiplier refresher started"
        );
        Metrics::refresher_running(true);

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            // An in-flight read is abandoned on stop; it only reads.
            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                _ = self.refresh_once() => {}
            }

            self.set_phase(RefresherPhase::Waiting);
            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                () = tokio::time::sleep(self.config.interval) => {}
            }
        }

        self.set_phase(RefresherPhase::Stopped);
        Metrics::refresher_running(false);
        info!(key = %self.config.key, "Risk multiplier refresher stopped");
    }
}

/// Handle to a spawned refresher.
pub struct RefresherHandle {
    join: Option<JoinHandle<()>>,
    token: CancellationToken,
    phase: Arc<RwLock<RefresherPhase>>,
}

impl RefresherHandle {
    /// Current phase of the task.
    pub fn phase(&self) -> RefresherPhase {
        *self.phase.read()
    }

    /// Whether the task has exited (or was already stopped through this handle).
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the task and wait up to `timeout` for it to exit.
    ///
    /// Idempotent. On timeout the task is aborted and
    /// `ServiceError::ShutdownTimeout` is returned.
    pub async fn stop(&mut self, timeout: Duration) -> ServiceResult<()> {
        self.token.cancel();

        let Some(join) = self.join.take() else {
            return Ok(());
        };
        let abort = join.abort_handle();

        match tokio::time::timeout(timeout, join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "Refresher task ended abnormally");
                Ok(())
            }
            Err(_) => {
                abort.abort();
                let timeout_ms = timeout.as_millis() as u64;
                error!(timeout_ms, "Refresher did not stop in time, aborted");
                Err(ServiceError::ShutdownTimeout {
                    task: "refresher",
                    timeout_ms,
                })
            }
        }
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
