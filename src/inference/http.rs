// HTTP implementation of the inference backend contract.
//
// A thin reqwest wrapper with generic GET/POST helpers. The per-call
// timeout is set on the client at construction — a hung backend surfaces
// as a request error within the configured budget, which the analyzers
// treat the same as any other backend failure.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::traits::{
    InferenceBackend, InferenceResponse, ModelInfoResponse, ModelUpdate, ModelUpdatesResponse,
};

pub struct HttpInferenceBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInferenceBackend {
    /// Create a backend client for the given base URL.
    ///
    /// `timeout` is the wall-clock budget for each individual call.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("basalt/0.1 (threat-intel)")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        debug!(path = path, "Backend GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Backend request failed: GET {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Backend GET {path} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize response from GET {path}"))
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        debug!(path = path, "Backend POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Backend request failed: POST {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Backend POST {path} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize response from POST {path}"))
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceBackend {
    async fn model_info(&self, name: &str) -> Result<ModelInfoResponse> {
        self.get_json(&format!("/models/{name}/info")).await
    }

    async fn model_updates(&self) -> Result<Vec<ModelUpdate>> {
        let response: ModelUpdatesResponse = self.get_json("/models/updates").await?;
        Ok(response.updates)
    }

    async fn retrain(&self, name: &str) -> Result<()> {
        let path = format!("/models/{name}/retrain");
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(&Value::Object(Default::default()))
            .send()
            .await
            .with_context(|| format!("Backend request failed: POST {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Backend POST {path} returned {status}: {body}");
        }

        Ok(())
    }

    async fn infer(&self, endpoint: &str, payload: &Value) -> Result<InferenceResponse> {
        self.post_json(endpoint, payload).await
    }
}
