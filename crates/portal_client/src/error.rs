use shared::{
    domain::StepNumber,
    error::{ApiException, FieldErrors},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Network error, non-2xx status, or a body that could not be decoded.
    #[error("request failed: {0}")]
    RequestFailure(String),
    /// The server answered but flagged the request as failed.
    #[error("server reported an error: {0}")]
    ServerReported(#[from] ApiException),
    #[error("a step save is already in flight")]
    SaveInFlight,
    #[error("the wizard has already completed")]
    AlreadyCompleted,
    #[error("step {current} is not the final step (total steps: {total})")]
    NotFinalStep { current: StepNumber, total: u32 },
    #[error("step {step} has invalid fields: {}", summarize(.errors))]
    InvalidFields {
        step: StepNumber,
        errors: FieldErrors,
    },
    #[error("step {step} has no field named '{field}'")]
    UnknownField { step: StepNumber, field: String },
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Self::RequestFailure(_))
    }

    /// Field messages attached to the error, local or server-side.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::InvalidFields { errors, .. } => Some(errors),
            Self::ServerReported(exception) if !exception.field_errors.is_empty() => {
                Some(&exception.field_errors)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::RequestFailure(value.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(value: url::ParseError) -> Self {
        Self::Config(format!("invalid url: {value}"))
    }
}

fn summarize(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join("; ")))
        .collect::<Vec<_>>()
        .join(", ")
}
