use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{Local, NaiveDate};
use shared::{domain::StepNumber, error::FieldErrors, protocol::StepSubmission};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::ClientError,
    events::{EventBus, Subscription},
    form::WizardForm,
    inflight::InFlight,
    transport::PortalTransport,
};

/// Position in the wizard. `1 <= current_step <= total_steps` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardState {
    current_step: u32,
    total_steps: u32,
}

impl WizardState {
    pub fn new(total_steps: u32) -> Result<Self, ClientError> {
        if total_steps == 0 {
            return Err(ClientError::Config(
                "a wizard needs at least one step".to_string(),
            ));
        }
        Ok(Self {
            current_step: 1,
            total_steps,
        })
    }

    pub fn current_step(&self) -> StepNumber {
        StepNumber(self.current_step)
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn is_final_step(&self) -> bool {
        self.current_step == self.total_steps
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.current_step, self.total_steps)
    }

    fn step_forward(&mut self) -> bool {
        if self.current_step < self.total_steps {
            self.current_step += 1;
            true
        } else {
            false
        }
    }

    fn step_back(&mut self) -> bool {
        if self.current_step > 1 {
            self.current_step -= 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub step: StepNumber,
    pub total_steps: u32,
    /// `round(step / total_steps * 100)`, halves rounded up.
    pub percent: u8,
}

impl Progress {
    fn new(step: u32, total_steps: u32) -> Self {
        let step64 = u64::from(step);
        let total64 = u64::from(total_steps.max(1));
        let percent = (step64 * 200 + total64) / (2 * total64);
        Self {
            step: StepNumber(step),
            total_steps,
            percent: u8::try_from(percent.min(100)).unwrap_or(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    SaveStarted {
        step: StepNumber,
    },
    /// `hidden` is no longer displayed, `shown` is.
    StepChanged {
        hidden: StepNumber,
        shown: StepNumber,
        progress: Progress,
    },
    ValidationFailed {
        step: StepNumber,
        errors: FieldErrors,
    },
    /// The save was not accepted; the user should fix the step and retry.
    SaveFailed {
        step: StepNumber,
        message: String,
        field_errors: FieldErrors,
    },
    Completed {
        redirect: Url,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced(Progress),
    Completed { redirect: Url },
}

struct WizardInner {
    state: WizardState,
    values: HashMap<StepNumber, BTreeMap<String, String>>,
    completed: bool,
}

/// Drives a multi-step form, saving each step on the server before the next
/// one is revealed.
pub struct StepWizardClient {
    transport: Arc<dyn PortalTransport>,
    form: WizardForm,
    completion_redirect: Url,
    inner: Mutex<WizardInner>,
    saving: InFlight,
    events: EventBus<WizardEvent>,
}

impl StepWizardClient {
    pub fn new(
        transport: Arc<dyn PortalTransport>,
        form: WizardForm,
        completion_redirect: Url,
    ) -> Result<Arc<Self>, ClientError> {
        let state = WizardState::new(form.total_steps())?;
        Ok(Arc::new(Self {
            transport,
            form,
            completion_redirect,
            inner: Mutex::new(WizardInner {
                state,
                values: HashMap::new(),
                completed: false,
            }),
            saving: InFlight::default(),
            events: EventBus::default(),
        }))
    }

    pub fn subscribe(&self) -> Subscription<WizardEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> WizardState {
        self.inner.lock().await.state
    }

    pub async fn progress(&self) -> Progress {
        self.inner.lock().await.state.progress()
    }

    pub async fn is_completed(&self) -> bool {
        self.inner.lock().await.completed
    }

    pub fn is_saving(&self) -> bool {
        self.saving.is_busy()
    }

    /// Sets a field on the step currently displayed.
    pub async fn set_field(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().await;
        let step = inner.state.current_step();
        self.store_value(&mut inner, step, name.into(), value.into())
    }

    pub async fn set_step_field(
        &self,
        step: StepNumber,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().await;
        self.store_value(&mut inner, step, name.into(), value.into())
    }

    fn store_value(
        &self,
        inner: &mut WizardInner,
        step: StepNumber,
        name: String,
        value: String,
    ) -> Result<(), ClientError> {
        let known = self
            .form
            .step(step.0)
            .is_some_and(|definition| definition.field(&name).is_some());
        if !known {
            return Err(ClientError::UnknownField { step, field: name });
        }
        inner.values.entry(step).or_default().insert(name, value);
        Ok(())
    }

    /// Saves the current step and moves to the next one. On the final step
    /// this is [`finish`](Self::finish).
    pub async fn advance(&self) -> Result<AdvanceOutcome, ClientError> {
        self.save_current_step(false).await
    }

    /// Saves the final step and hands navigation to the completion redirect.
    pub async fn finish(&self) -> Result<AdvanceOutcome, ClientError> {
        self.save_current_step(true).await
    }

    /// Goes back one step without contacting the server. At step 1 nothing
    /// changes and the current progress is returned.
    pub async fn retreat(&self) -> Result<Progress, ClientError> {
        if self.saving.is_busy() {
            return Err(ClientError::SaveInFlight);
        }
        let mut inner = self.inner.lock().await;
        if inner.completed {
            return Err(ClientError::AlreadyCompleted);
        }

        let hidden = inner.state.current_step();
        if inner.state.step_back() {
            let progress = inner.state.progress();
            debug!(from = hidden.0, to = progress.step.0, "wizard moved back");
            self.events.publish(WizardEvent::StepChanged {
                hidden,
                shown: progress.step,
                progress,
            });
        }
        Ok(inner.state.progress())
    }

    async fn save_current_step(&self, require_final: bool) -> Result<AdvanceOutcome, ClientError> {
        let _guard = self.saving.try_begin().ok_or(ClientError::SaveInFlight)?;

        let submission = {
            let inner = self.inner.lock().await;
            if inner.completed {
                return Err(ClientError::AlreadyCompleted);
            }
            if require_final && !inner.state.is_final_step() {
                return Err(ClientError::NotFinalStep {
                    current: inner.state.current_step(),
                    total: inner.state.total_steps(),
                });
            }
            self.collect_submission(&inner, today())?
        };
        let step = submission.step;

        self.events.publish(WizardEvent::SaveStarted { step });
        info!(step = step.0, fields = submission.fields.len(), "saving wizard step");

        let saved = match self.transport.save_step(&submission).await {
            Ok(response) => response.into_result().map_err(ClientError::from),
            Err(err) => Err(err),
        };
        if let Err(err) = saved {
            warn!(step = step.0, error = %err, "wizard step save failed");
            let (message, field_errors) = match &err {
                ClientError::ServerReported(exception) => {
                    (exception.message.clone(), exception.field_errors.clone())
                }
                other => (other.to_string(), FieldErrors::new()),
            };
            self.events.publish(WizardEvent::SaveFailed {
                step,
                message,
                field_errors,
            });
            return Err(err);
        }

        let mut inner = self.inner.lock().await;
        if inner.state.is_final_step() {
            inner.completed = true;
            let redirect = self.completion_redirect.clone();
            info!(%redirect, "wizard completed");
            self.events.publish(WizardEvent::Completed {
                redirect: redirect.clone(),
            });
            return Ok(AdvanceOutcome::Completed { redirect });
        }

        inner.state.step_forward();
        let progress = inner.state.progress();
        debug!(step = progress.step.0, percent = progress.percent, "wizard advanced");
        self.events.publish(WizardEvent::StepChanged {
            hidden: step,
            shown: progress.step,
            progress,
        });
        Ok(AdvanceOutcome::Advanced(progress))
    }

    fn collect_submission(
        &self,
        inner: &WizardInner,
        today: NaiveDate,
    ) -> Result<StepSubmission, ClientError> {
        let step = inner.state.current_step();
        let definition = self.form.step(step.0).ok_or_else(|| {
            ClientError::Config(format!("no definition for step {step}"))
        })?;
        let values = inner.values.get(&step);
        let value_of = |name: &str| {
            values
                .and_then(|values| values.get(name))
                .map(String::as_str)
        };

        if let Err(errors) = definition.validate(value_of, today) {
            debug!(step = step.0, invalid = errors.len(), "wizard step failed validation");
            self.events.publish(WizardEvent::ValidationFailed {
                step,
                errors: errors.clone(),
            });
            return Err(ClientError::InvalidFields { step, errors });
        }

        let fields = definition
            .fields
            .iter()
            .map(|field| {
                let value = value_of(&field.name).unwrap_or_default().trim().to_string();
                (field.name.clone(), value)
            })
            .collect();
        Ok(StepSubmission { step, fields })
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
