use crate::{
    error::{RecontextError, Result},
    models::ProviderPayload,
};
use reqwest::{header, Client};
use std::time::Duration;

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Posts predict payloads. Retries only transport failures, never HTTP statuses.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    max_retries: u32,
}

impl Transport {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecontextError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_retries,
        })
    }

    /// Returns the raw response body of a 2xx answer.
    pub async fn send(&self, url: &str, payload: &ProviderPayload, token: &str) -> Result<String> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| RecontextError::Serialization(e.to_string()))?;

        let mut attempt = 0;
        let response = loop {
            let result = self
                .client
                .post(url)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(response) => break response,
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "⚠️  Transient failure calling predict endpoint ({}), retrying",
                        e
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    log::error!("Predict request failed: {}", e);
                    return Err(RecontextError::Request(e.to_string()));
                }
            }
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RecontextError::Request(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            log::error!("Predict endpoint returned {}", status);
            return Err(RecontextError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body: text,
            });
        }

        Ok(text)
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
