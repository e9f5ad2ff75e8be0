//! Client-side flows of the faculty portal: the profile-completion step wizard
//! and the polling analytics dashboard.

pub mod dashboard;
pub mod error;
pub mod events;
pub mod form;
mod inflight;
pub mod transport;
pub mod wizard;

pub use dashboard::{
    DashboardEvent, DashboardState, DashboardView, PollOutcome, PollerHandle,
    PollingDashboardClient, DEFAULT_POLL_INTERVAL,
};
pub use error::ClientError;
pub use events::{EventBus, Subscription};
pub use form::{FieldRule, FieldSpec, StepDefinition, WizardForm};
pub use transport::{HttpPortalTransport, HttpTransportConfig, PortalTransport};
pub use wizard::{AdvanceOutcome, Progress, StepWizardClient, WizardEvent, WizardState};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
