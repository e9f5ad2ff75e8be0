use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use portal_client::{ClientError, HttpTransportConfig, DEFAULT_POLL_INTERVAL};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "portal.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub csrf_token: Option<String>,
    pub session_id: Option<String>,
    pub poll_interval_seconds: u64,
    pub request_timeout_seconds: u64,
    pub completion_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            csrf_token: None,
            session_id: None,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL.as_secs(),
            request_timeout_seconds: 15,
            completion_path: "/dashboard/".into(),
        }
    }
}

/// Keys accepted in `portal.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    base_url: Option<String>,
    csrf_token: Option<String>,
    session_id: Option<String>,
    poll_interval_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
    completion_path: Option<String>,
}

impl Settings {
    pub fn transport_config(&self) -> Result<HttpTransportConfig, ClientError> {
        let mut config = HttpTransportConfig::new(&self.base_url)?
            .with_request_timeout(Duration::from_secs(self.request_timeout_seconds.max(1)));
        if let Some(token) = &self.csrf_token {
            config = config.with_csrf_token(token.clone());
        }
        if let Some(session_id) = &self.session_id {
            config = config.with_session_id(session_id.clone());
        }
        Ok(config)
    }

    pub fn completion_redirect(&self) -> Result<Url, ClientError> {
        HttpTransportConfig::new(&self.base_url)?.resolve(&self.completion_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.csrf_token {
        settings.csrf_token = Some(v);
    }
    if let Some(v) = file_cfg.session_id {
        settings.session_id = Some(v);
    }
    if let Some(v) = file_cfg.poll_interval_seconds {
        settings.poll_interval_seconds = v;
    }
    if let Some(v) = file_cfg.request_timeout_seconds {
        settings.request_timeout_seconds = v;
    }
    if let Some(v) = file_cfg.completion_path {
        settings.completion_path = v;
    }
    Ok(())
}

/// `PORTAL_*` variables apply first; `APP__*` variants win when both are set.
fn apply_env<F>(settings: &mut Settings, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let pick = |name: &str| {
        lookup(&format!("APP__{name}")).or_else(|| lookup(&format!("PORTAL_{name}")))
    };

    if let Some(v) = pick("BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = pick("CSRF_TOKEN") {
        settings.csrf_token = Some(v);
    }
    if let Some(v) = pick("SESSION_ID") {
        settings.session_id = Some(v);
    }
    if let Some(v) = pick("POLL_INTERVAL_SECONDS") {
        settings.poll_interval_seconds = v
            .parse()
            .with_context(|| format!("POLL_INTERVAL_SECONDS must be a whole number, got '{v}'"))?;
    }
    if let Some(v) = pick("REQUEST_TIMEOUT_SECONDS") {
        settings.request_timeout_seconds = v.parse().with_context(|| {
            format!("REQUEST_TIMEOUT_SECONDS must be a whole number, got '{v}'")
        })?;
    }
    if let Some(v) = pick("COMPLETION_PATH") {
        settings.completion_path = v;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
