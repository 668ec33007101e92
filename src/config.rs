use std::env;
use std::time::Duration;

use crate::error::{RecontextError, Result};

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_MODEL_ID: &str = "imagen-product-recontext-preview-06-30";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PORT: u16 = 8080;
/// Transient network failures get at most this many extra attempts.
pub const MAX_RETRIES: u32 = 1;

/// Where a predict call goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub project_id: String,
    pub region: String,
    pub model_id: String,
    pub api_base: Option<String>,
}

impl Endpoint {
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_base: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn predict_url(&self) -> String {
        let base = match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.region),
        };
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            base, self.project_id, self.region, self.model_id
        )
    }
}

#[derive(Debug, Clone)]
pub struct RecontextConfig {
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub model_id: String,
    pub api_base: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub port: Option<u16>,
}

impl Default for RecontextConfig {
    fn default() -> Self {
        RecontextConfig {
            project_id: None,
            region: Some(DEFAULT_REGION.to_string()),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_base: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            port: None,
        }
    }
}

impl RecontextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let project_id = env::var("RECONTEXT_PROJECT_ID")
            .or_else(|_| env::var("GOOGLE_CLOUD_PROJECT"))
            .ok()
            .filter(|s| !s.trim().is_empty());
        let region = env::var("RECONTEXT_REGION").ok().or(defaults.region);
        let model_id = env::var("RECONTEXT_MODEL_ID").unwrap_or(defaults.model_id);
        let api_base = env::var("RECONTEXT_API_BASE").ok();
        let timeout = env::var("RECONTEXT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let max_retries = env::var("RECONTEXT_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .map_or(defaults.max_retries, |n| n.min(MAX_RETRIES));
        let port = env::var("RECONTEXT_PORT").ok().and_then(|s| s.parse().ok());

        RecontextConfig {
            project_id,
            region,
            model_id,
            api_base,
            timeout,
            max_retries,
            port,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.min(MAX_RETRIES);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builds the predict endpoint. Empty project or region are passed through
    /// so validation can report them as missing fields.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            project_id: self.project_id.clone().unwrap_or_default(),
            region: self.region.clone().unwrap_or_default(),
            model_id: self.model_id.clone(),
            api_base: self.api_base.clone(),
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(RecontextError::Config("model id is required".into()));
        }
        if self.timeout.is_zero() {
            return Err(RecontextError::Config("timeout must be positive".into()));
        }
        Ok(())
    }
}
