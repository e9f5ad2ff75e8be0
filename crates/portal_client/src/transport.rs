//! The server seam. Components talk to the portal only through
//! [`PortalTransport`]; [`HttpPortalTransport`] is the reqwest-backed
//! implementation used outside of tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::COOKIE, Client};
use shared::protocol::{
    save_step_path, AnalyticsResponse, SaveStepResponse, StepSubmission, ANALYTICS_PATH,
};
use tracing::debug;
use url::Url;

use crate::error::ClientError;

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const SESSION_COOKIE: &str = "sessionid";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait PortalTransport: Send + Sync {
    async fn save_step(&self, submission: &StepSubmission)
        -> Result<SaveStepResponse, ClientError>;
    async fn fetch_analytics(&self) -> Result<AnalyticsResponse, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub base_url: Url,
    pub csrf_token: Option<String>,
    pub session_id: Option<String>,
    pub request_timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            csrf_token: None,
            session_id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolves a portal path (leading slash optional) under the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn cookie_header(&self) -> Option<String> {
        let mut cookies = Vec::new();
        if let Some(token) = &self.csrf_token {
            cookies.push(format!("{CSRF_COOKIE}={token}"));
        }
        if let Some(session_id) = &self.session_id {
            cookies.push(format!("{SESSION_COOKIE}={session_id}"));
        }
        (!cookies.is_empty()).then(|| cookies.join("; "))
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, ClientError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ClientError::Config("base url must not be empty".to_string()));
    }

    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(ClientError::Config(format!("'{raw}' cannot be used as a base url")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub struct HttpPortalTransport {
    http: Client,
    config: HttpTransportConfig,
}

impl HttpPortalTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

#[async_trait]
impl PortalTransport for HttpPortalTransport {
    async fn save_step(
        &self,
        submission: &StepSubmission,
    ) -> Result<SaveStepResponse, ClientError> {
        let url = self.config.resolve(&save_step_path(submission.step))?;
        debug!(step = submission.step.0, %url, "posting step form");

        let mut request = self.http.post(url).form(&submission.fields);
        if let Some(token) = &self.config.csrf_token {
            request = request.header(CSRF_HEADER, token);
        }
        if let Some(cookies) = self.config.cookie_header() {
            request = request.header(COOKIE, cookies);
        }

        let res = request.send().await?.error_for_status()?;
        Ok(res.json().await?)
    }

    async fn fetch_analytics(&self) -> Result<AnalyticsResponse, ClientError> {
        let url = self.config.resolve(ANALYTICS_PATH)?;
        let mut request = self.http.get(url);
        if let Some(cookies) = self.config.cookie_header() {
            request = request.header(COOKIE, cookies);
        }

        let res = request.send().await?;
        let status_error = res.error_for_status_ref().err();
        let body = res.bytes().await?;
        match serde_json::from_slice::<AnalyticsResponse>(&body) {
            Ok(failed @ AnalyticsResponse::Failed { .. }) => Ok(failed),
            decoded => match (status_error, decoded) {
                (Some(err), _) => Err(err.into()),
                (None, Ok(stats)) => Ok(stats),
                (None, Err(err)) => Err(ClientError::RequestFailure(format!(
                    "undecodable analytics body: {err}"
                ))),
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
