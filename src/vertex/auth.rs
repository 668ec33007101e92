use crate::error::{RecontextError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::process::Command;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Source of bearer tokens for the predict call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    fn name(&self) -> &str;
}

fn non_empty(token: String, source: &str) -> Result<String> {
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(RecontextError::Auth(format!("{} returned an empty token", source)));
    }
    Ok(token)
}

/// A token fetched elsewhere, e.g. by a test or an outer service.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        non_empty(self.token.clone(), "static token")
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[derive(Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self {
            var: ACCESS_TOKEN_ENV.to_string(),
        }
    }
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let token = std::env::var(&self.var)
            .map_err(|_| RecontextError::Auth(format!("{} is not set", self.var)))?;
        non_empty(token, &self.var)
    }

    fn name(&self) -> &str {
        "env"
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Service-account token from the GCE / Cloud Run metadata server.
#[derive(Clone)]
pub struct MetadataServerTokenProvider {
    client: Client,
    url: String,
}

impl MetadataServerTokenProvider {
    pub fn new() -> Result<Self> {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| {
                RecontextError::Config(format!("failed to build metadata HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenProvider for MetadataServerTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .query(&[("scopes", CLOUD_PLATFORM_SCOPE)])
            .send()
            .await
            .map_err(|e| RecontextError::Auth(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RecontextError::Auth(format!(
                "metadata server returned {}: {}",
                status, body
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| RecontextError::Auth(format!("metadata token malformed: {}", e)))?;
        non_empty(token.access_token, "metadata server")
    }

    fn name(&self) -> &str {
        "metadata"
    }
}

/// Asks the locally installed gcloud CLI for the user's token.
#[derive(Clone)]
pub struct GcloudTokenProvider {
    program: String,
}

impl Default for GcloudTokenProvider {
    fn default() -> Self {
        Self {
            program: "gcloud".to_string(),
        }
    }
}

impl GcloudTokenProvider {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for GcloudTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| RecontextError::Auth(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(RecontextError::Auth(format!(
                "{} auth print-access-token failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8(output.stdout)
            .map_err(|e| RecontextError::Auth(format!("token is not utf-8: {}", e)))?;
        non_empty(token, &self.program)
    }

    fn name(&self) -> &str {
        "gcloud"
    }
}

/// Tries each provider in order and returns the first token found.
#[derive(Clone)]
pub struct DefaultCredentialChain {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl Default for DefaultCredentialChain {
    fn default() -> Self {
        let mut providers: Vec<Arc<dyn TokenProvider>> = vec![Arc::new(EnvTokenProvider::default())];
        match MetadataServerTokenProvider::new() {
            Ok(metadata) => providers.push(Arc::new(metadata)),
            Err(e) => log::debug!("Skipping metadata server credentials: {}", e),
        }
        providers.push(Arc::new(GcloudTokenProvider::default()));
        Self::new(providers)
    }
}

impl DefaultCredentialChain {
    pub fn new(providers: Vec<Arc<dyn TokenProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl TokenProvider for DefaultCredentialChain {
    async fn access_token(&self) -> Result<String> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.access_token().await {
                Ok(token) => {
                    log::debug!("Using credentials from {}", provider.name());
                    return Ok(token);
                }
                Err(e) => {
                    log::debug!("Credential source {} unavailable: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(RecontextError::Auth(format!(
            "no credentials available ({})",
            failures.join("; ")
        )))
    }

    fn name(&self) -> &str {
        "default-chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticTokenProvider::new(" tok-123\n");
        assert_eq!(provider.access_token().await.unwrap(), "tok-123");

        let empty = StaticTokenProvider::new("");
        assert!(matches!(
            empty.access_token().await,
            Err(RecontextError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_env_token_missing() {
        let provider = EnvTokenProvider::new("RECONTEXT_TEST_TOKEN_THAT_IS_NEVER_SET");
        let err = provider.access_token().await.unwrap_err();
        assert!(err.to_string().contains("is not set"));
    }

    #[tokio::test]
    async fn test_chain_returns_first_success() {
        let chain = DefaultCredentialChain::new(vec![
            Arc::new(StaticTokenProvider::new("")),
            Arc::new(StaticTokenProvider::new("second")),
            Arc::new(StaticTokenProvider::new("third")),
        ]);
        assert_eq!(chain.access_token().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_chain_reports_all_failures() {
        let chain = DefaultCredentialChain::new(vec![
            Arc::new(StaticTokenProvider::new("")),
            Arc::new(EnvTokenProvider::new("RECONTEXT_TEST_TOKEN_THAT_IS_NEVER_SET")),
        ]);
        let err = chain.access_token().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("static"));
        assert!(message.contains("env"));
    }

    #[tokio::test]
    async fn test_gcloud_missing_binary() {
        let provider = GcloudTokenProvider::with_program("definitely-not-a-real-gcloud-binary");
        assert!(matches!(
            provider.access_token().await,
            Err(RecontextError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_server_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/token")
            .match_header("metadata-flavor", "Google")
            .match_query(mockito::Matcher::UrlEncoded(
                "scopes".into(),
                CLOUD_PLATFORM_SCOPE.into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"meta-token","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let provider =
            MetadataServerTokenProvider::with_url(format!("{}/token", server.url())).unwrap();
        assert_eq!(provider.access_token().await.unwrap(), "meta-token");
    }

    #[tokio::test]
    async fn test_metadata_server_unreachable_is_auth_error() {
        let provider = MetadataServerTokenProvider::with_url("http://127.0.0.1:9/token")
            .expect("client builds with default TLS settings");
        assert!(matches!(
            provider.access_token().await,
            Err(RecontextError::Auth(msg)) if msg.contains("metadata server unreachable")
        ));
    }
}
