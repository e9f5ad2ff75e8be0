use std::{sync::Arc, time::Duration};

use shared::domain::{DashboardSnapshot, DisplayedStats, ProportionChart};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::ClientError,
    events::{EventBus, Subscription},
    inflight::InFlight,
    transport::PortalTransport,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Everything a dashboard view renders for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub snapshot: DashboardSnapshot,
    pub stats: DisplayedStats,
    pub chart: ProportionChart,
}

impl From<DashboardSnapshot> for DashboardView {
    fn from(snapshot: DashboardSnapshot) -> Self {
        Self {
            stats: snapshot.display(),
            chart: snapshot.chart(),
            snapshot,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    Loading,
    Content(DashboardView),
    /// The first load failed. Stays here until [`PollingDashboardClient::reload`].
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    Updated(DashboardView),
    LoadFailed { message: String },
    Reloading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Updated,
    /// Another poll was still outstanding.
    SkippedInFlight,
    /// The first load failed earlier; waiting for a manual reload.
    SkippedErrored,
    /// The server reported it could not compute statistics; nothing changed.
    Unchanged,
    /// The request failed after content was shown; the last snapshot stays.
    Retained,
    /// The first load failed.
    LoadFailed,
}

pub struct PollingDashboardClient {
    transport: Arc<dyn PortalTransport>,
    state: Mutex<DashboardState>,
    polling: InFlight,
    events: EventBus<DashboardEvent>,
}

impl PollingDashboardClient {
    pub fn new(transport: Arc<dyn PortalTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            state: Mutex::new(DashboardState::Loading),
            polling: InFlight::default(),
            events: EventBus::default(),
        })
    }

    pub fn subscribe(&self) -> Subscription<DashboardEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> DashboardState {
        self.state.lock().await.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_busy()
    }

    /// Fetches the analytics endpoint once. Never overlaps another poll.
    pub async fn poll(&self) -> PollOutcome {
        let Some(_guard) = self.polling.try_begin() else {
            debug!("analytics poll skipped; previous poll still outstanding");
            return PollOutcome::SkippedInFlight;
        };

        if matches!(*self.state.lock().await, DashboardState::Error { .. }) {
            return PollOutcome::SkippedErrored;
        }

        let fetched = match self.transport.fetch_analytics().await {
            Ok(response) => response.into_result().map_err(ClientError::from),
            Err(err) => Err(err),
        };

        let mut state = self.state.lock().await;
        match fetched {
            Ok(snapshot) => {
                let view = DashboardView::from(snapshot);
                if matches!(*state, DashboardState::Loading) {
                    info!(total = snapshot.total_count, "analytics loaded");
                }
                *state = DashboardState::Content(view.clone());
                self.events.publish(DashboardEvent::Updated(view));
                PollOutcome::Updated
            }
            Err(ClientError::ServerReported(exception)) => {
                warn!(error = %exception.message, "analytics endpoint reported an error");
                PollOutcome::Unchanged
            }
            Err(err) if matches!(*state, DashboardState::Loading) => {
                error!(error = %err, "failed to load analytics");
                let message = err.to_string();
                *state = DashboardState::Error {
                    message: message.clone(),
                };
                self.events.publish(DashboardEvent::LoadFailed { message });
                PollOutcome::LoadFailed
            }
            Err(err) => {
                warn!(error = %err, "analytics refresh failed; keeping last snapshot");
                PollOutcome::Retained
            }
        }
    }

    /// Leaves the error state and tries the first load again.
    pub async fn reload(&self) -> PollOutcome {
        {
            let mut state = self.state.lock().await;
            if matches!(*state, DashboardState::Error { .. }) {
                *state = DashboardState::Loading;
                self.events.publish(DashboardEvent::Reloading);
            }
        }
        self.poll().await
    }

    /// Polls now and then every `interval` until the handle is dropped.
    pub fn start(self: &Arc<Self>, interval: Duration) -> Result<PollerHandle, ClientError> {
        if interval.is_zero() {
            return Err(ClientError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let client = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let outcome = client.poll().await;
                debug!(?outcome, "analytics poll finished");
            }
        });
        Ok(PollerHandle { task: Some(task) })
    }
}

/// Owns the polling task. Dropping it stops polling.
pub struct PollerHandle {
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops polling and waits for the task to wind down.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
