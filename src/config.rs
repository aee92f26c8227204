use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_SECS: u64 = 30;
pub const DEFAULT_ALERT_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub alert_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            alert_limit: DEFAULT_ALERT_LIMIT,
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `TRIAGE_*` keys through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(url) = lookup("TRIAGE_API_URL").filter(|v| !v.trim().is_empty()) {
            settings.api_base_url = url;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TRIAGE_TIMEOUT_SECS")? {
            settings.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TRIAGE_POLL_SECS")? {
            settings.poll_interval = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_var::<u32>(&lookup, "TRIAGE_ALERT_LIMIT")? {
            settings.alert_limit = limit;
        }

        settings.normalize()
    }

    pub fn with_overrides(
        mut self,
        api_url: Option<String>,
        timeout_secs: Option<u64>,
        poll_secs: Option<u64>,
    ) -> anyhow::Result<Self> {
        if let Some(url) = api_url {
            self.api_base_url = url;
        }
        if let Some(secs) = timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = poll_secs {
            self.poll_interval = Duration::from_secs(secs);
        }
        self.normalize()
    }

    fn normalize(mut self) -> anyhow::Result<Self> {
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        anyhow::ensure!(!self.api_base_url.is_empty(), "API base URL must not be empty");
        anyhow::ensure!(
            !self.request_timeout.is_zero(),
            "request timeout must be at least one second"
        );
        anyhow::ensure!(
            !self.poll_interval.is_zero(),
            "poll interval must be at least one second"
        );
        Ok(self)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        _ => Ok(None),
    }
}
