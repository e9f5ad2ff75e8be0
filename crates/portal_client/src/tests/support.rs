//! In-memory transport double for component tests.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::protocol::{AnalyticsResponse, SaveStepResponse, StepSubmission};
use tokio::sync::{Mutex, Notify};

use crate::{error::ClientError, transport::PortalTransport};

pub(crate) enum Scripted<T> {
    Reply(T),
    Fail(String),
    /// Waits for `ScriptedTransport::release` before replying.
    Held(T),
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    saves: Mutex<VecDeque<Scripted<SaveStepResponse>>>,
    analytics: Mutex<VecDeque<Scripted<AnalyticsResponse>>>,
    submissions: Mutex<Vec<StepSubmission>>,
    analytics_calls: Mutex<u32>,
    release: Notify,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub(crate) async fn push_save(&self, reply: Scripted<SaveStepResponse>) {
        self.saves.lock().await.push_back(reply);
    }

    pub(crate) async fn push_analytics(&self, reply: Scripted<AnalyticsResponse>) {
        self.analytics.lock().await.push_back(reply);
    }

    pub(crate) async fn submissions(&self) -> Vec<StepSubmission> {
        self.submissions.lock().await.clone()
    }

    pub(crate) async fn analytics_calls(&self) -> u32 {
        *self.analytics_calls.lock().await
    }

    pub(crate) fn release(&self) {
        self.release.notify_one();
    }

    async fn settle<T>(&self, reply: Option<Scripted<T>>) -> Result<T, ClientError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Some(Scripted::Reply(value)) => Ok(value),
            Some(Scripted::Fail(message)) => Err(ClientError::RequestFailure(message)),
            Some(Scripted::Held(value)) => {
                self.release.notified().await;
                Ok(value)
            }
            None => Err(ClientError::RequestFailure(
                "no scripted reply left".to_string(),
            )),
        }
    }
}

#[async_trait]
impl PortalTransport for ScriptedTransport {
    async fn save_step(
        &self,
        submission: &StepSubmission,
    ) -> Result<SaveStepResponse, ClientError> {
        self.submissions.lock().await.push(submission.clone());
        let reply = self.saves.lock().await.pop_front();
        self.settle(reply).await
    }

    async fn fetch_analytics(&self) -> Result<AnalyticsResponse, ClientError> {
        *self.analytics_calls.lock().await += 1;
        let reply = self.analytics.lock().await.pop_front();
        self.settle(reply).await
    }
}
