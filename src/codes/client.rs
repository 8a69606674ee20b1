use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{CodeValidation, CodeValidator, RebateCodeRequest, ReferralCodeRequest};
use crate::config::RemoteSection;
use crate::errors::CodeValidationError;

/// Explicit connection settings for the remote procedures. Built once by
/// the process entry point and handed to [`RemoteCodeClient::new`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub rebate_function: String,
    pub referral_function: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let defaults = RemoteSection::default();
        Self {
            base_url: base_url.into(),
            api_key: None,
            rebate_function: defaults.rebate_function,
            referral_function: defaults.referral_function,
            timeout: Duration::from_secs(defaults.timeout_secs),
            max_retries: defaults.max_retries,
            retry_backoff: Duration::from_millis(defaults.retry_backoff_ms),
        }
    }

    /// `None` when no base URL is configured.
    pub fn from_section(section: &RemoteSection) -> Option<Self> {
        let base_url = section.base_url.clone()?;
        Some(Self {
            base_url,
            api_key: section.api_key.clone(),
            rebate_function: section.rebate_function.clone(),
            referral_function: section.referral_function.clone(),
            timeout: Duration::from_secs(section.timeout_secs),
            max_retries: section.max_retries,
            retry_backoff: Duration::from_millis(section.retry_backoff_ms),
        })
    }

    fn rpc_url(&self, function: &str) -> String {
        format!(
            "{}/rest/v1/rpc/{}",
            self.base_url.trim_end_matches('/'),
            function
        )
    }
}

/// Body returned by the validation procedures.
#[derive(Debug, Deserialize)]
struct RpcVerdict {
    valid: bool,
    #[serde(default)]
    discount_amount: Option<i64>,
    #[serde(default)]
    discount_percent: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

/// Error body of the RPC gateway.
#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the hosted database's code validation procedures.
pub struct RemoteCodeClient {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteCodeClient {
    pub fn new(config: RemoteConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client for code validation")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Call `function` with `params`, retrying transient failures.
    async fn call<P: Serialize + Sync>(
        &self,
        function: &str,
        code: &str,
        params: &P,
    ) -> Result<CodeValidation, CodeValidationError> {
        if code.is_empty() {
            return Err(CodeValidationError::InvalidCode {
                reason: "code is empty".to_string(),
            });
        }

        let attempts = self.config.max_retries + 1;
        let mut attempt = 1;
        loop {
            match self.call_once(function, code, params).await {
                Err(CodeValidationError::Transient(msg)) if attempt < attempts => {
                    warn!(
                        function,
                        attempt,
                        "Code validation failed transiently, retrying: {}",
                        msg
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn call_once<P: Serialize + Sync>(
        &self,
        function: &str,
        code: &str,
        params: &P,
    ) -> Result<CodeValidation, CodeValidationError> {
        let mut request = self.http.post(self.config.rpc_url(function)).json(params);
        if let Some(key) = &self.config.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| CodeValidationError::Transient(format!("request failed: {}", e)))?;

        let status = resp.status();
        debug!(function, status = status.as_u16(), "Code validation response");

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CodeValidationError::Transient(format!(
                "remote returned {}",
                status
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CodeValidationError::Transient(format!("failed to read body: {}", e)))?;

        // Auth failures mean our key is wrong, not the customer's code.
        if matches!(status.as_u16(), 401 | 403) {
            error!(
                function,
                status = status.as_u16(),
                body = %body,
                "Remote refused our credentials; check remote.api_key"
            );
            return Err(CodeValidationError::Transient(format!(
                "remote refused credentials ({})",
                status
            )));
        }

        if status.is_client_error() {
            let reason = serde_json::from_str::<RpcError>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("remote rejected the code ({})", status));
            return Err(CodeValidationError::InvalidCode { reason });
        }

        let verdict = parse_verdict(&body)?;
        if !verdict.valid {
            return Err(CodeValidationError::InvalidCode {
                reason: verdict
                    .message
                    .unwrap_or_else(|| "code is not valid".to_string()),
            });
        }

        Ok(CodeValidation {
            code: code.to_string(),
            discount_amount: verdict.discount_amount,
            discount_percent: verdict.discount_percent,
            message: verdict.message,
        })
    }
}

/// Procedures may return a single object or a one-row set.
fn parse_verdict(body: &str) -> Result<RpcVerdict, CodeValidationError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CodeValidationError::Transient(format!("undecodable response: {}", e)))?;
    let value = match value {
        serde_json::Value::Array(mut rows) => {
            if rows.is_empty() {
                return Err(CodeValidationError::InvalidCode {
                    reason: "unknown code".to_string(),
                });
            }
            rows.swap_remove(0)
        }
        other => other,
    };
    serde_json::from_value(value)
        .map_err(|e| CodeValidationError::Transient(format!("unexpected response shape: {}", e)))
}

#[async_trait]
impl CodeValidator for RemoteCodeClient {
    async fn validate_rebate(
        &self,
        request: RebateCodeRequest,
    ) -> Result<CodeValidation, CodeValidationError> {
        let request = request.normalized();
        self.call(&self.config.rebate_function, &request.code, &request)
            .await
    }

    async fn validate_referral(
        &self,
        request: ReferralCodeRequest,
    ) -> Result<CodeValidation, CodeValidationError> {
        let request = request.normalized();
        self.call(&self.config.referral_function, &request.code, &request)
            .await
    }
}
