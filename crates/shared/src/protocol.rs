use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    domain::{DashboardSnapshot, StepNumber},
    error::{ApiException, ErrorCode, FieldErrors},
};

pub const SAVE_STEP_SUCCESS: &str = "success";

pub fn save_step_path(step: StepNumber) -> String {
    format!("save-step/{step}/")
}

pub const ANALYTICS_PATH: &str = "analytics_api/";

/// Form values of one wizard step, in form definition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSubmission {
    pub step: StepNumber,
    pub fields: Vec<(String, String)>,
}

impl StepSubmission {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// `status` of a step-save reply. Anything other than `"success"` is a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SaveStatus {
    Success,
    Failure(String),
}

impl From<String> for SaveStatus {
    fn from(value: String) -> Self {
        if value == SAVE_STEP_SUCCESS {
            Self::Success
        } else {
            Self::Failure(value)
        }
    }
}

impl From<SaveStatus> for String {
    fn from(value: SaveStatus) -> Self {
        match value {
            SaveStatus::Success => SAVE_STEP_SUCCESS.to_string(),
            SaveStatus::Failure(status) => status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveStepResponse {
    pub status: SaveStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "FieldErrors::is_empty")]
    pub errors: FieldErrors,
}

impl SaveStepResponse {
    pub fn success() -> Self {
        Self {
            status: SaveStatus::Success,
            message: None,
            errors: FieldErrors::new(),
        }
    }

    pub fn rejected(errors: FieldErrors) -> Self {
        Self {
            status: SaveStatus::Failure("error".to_string()),
            message: None,
            errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SaveStatus::Success
    }

    pub fn into_result(self) -> Result<(), ApiException> {
        match self.status {
            SaveStatus::Success => Ok(()),
            SaveStatus::Failure(status) => {
                let code = if self.errors.is_empty() && self.message.is_some() {
                    ErrorCode::InvalidStep
                } else {
                    ErrorCode::Validation
                };
                let message = self
                    .message
                    .unwrap_or_else(|| format!("step save returned status '{status}'"));
                Err(ApiException::new(code, message).with_field_errors(self.errors))
            }
        }
    }
}

/// Body of `GET /analytics_api/`. Any body with a set `error` field is a
/// server-reported failure, whatever else it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyticsResponse {
    Failed {
        #[serde(deserialize_with = "reported_error")]
        error: String,
    },
    Stats(DashboardSnapshot),
}

/// Accepts any set `error` value. `null`, `false`, `0` and `""` count as
/// unset so the body falls through to the stats variant.
fn reported_error<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Bool(false) => Err(D::Error::custom("error field is unset")),
        Value::Number(number) if number.as_f64() == Some(0.0) => {
            Err(D::Error::custom("error field is unset"))
        }
        Value::String(message) if message.is_empty() => {
            Err(D::Error::custom("error field is unset"))
        }
        Value::String(message) => Ok(message),
        other => Ok(other.to_string()),
    }
}

impl AnalyticsResponse {
    pub fn into_result(self) -> Result<DashboardSnapshot, ApiException> {
        match self {
            Self::Stats(snapshot) => Ok(snapshot),
            Self::Failed { error } => Err(ApiException::new(ErrorCode::StatsUnavailable, error)),
        }
    }
}
