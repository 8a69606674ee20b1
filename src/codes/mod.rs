//! Rebate and referral code validation.
//!
//! The validation logic itself lives in the hosted database as stored
//! procedures; this module owns the calling contract: codes are trimmed
//! and upper-cased before they leave the process, remote failures are
//! classified as either an invalid code or a transient error, and the
//! (idempotent) call is retried on transient errors.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CodeValidationError;

pub use client::{RemoteCodeClient, RemoteConfig};

/// Canonical form of a code: surrounding whitespace removed, upper case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Parameters of the rebate procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RebateCodeRequest {
    pub code: String,
    pub phone: String,
    pub email: String,
    pub box_size: String,
    /// Deposit in minor currency units.
    pub deposit_amount: i64,
}

/// Parameters of the referral procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferralCodeRequest {
    pub code: String,
    pub phone: String,
    pub email: String,
    pub box_size: String,
    pub user_id: String,
}

impl RebateCodeRequest {
    pub fn normalized(mut self) -> Self {
        self.code = normalize_code(&self.code);
        self
    }
}

impl ReferralCodeRequest {
    pub fn normalized(mut self) -> Self {
        self.code = normalize_code(&self.code);
        self
    }
}

/// Successful validation: the code is valid and carries these terms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeValidation {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Seam between the storefront and the remote validation procedures.
#[async_trait]
pub trait CodeValidator: Send + Sync {
    async fn validate_rebate(
        &self,
        request: RebateCodeRequest,
    ) -> Result<CodeValidation, CodeValidationError>;

    async fn validate_referral(
        &self,
        request: ReferralCodeRequest,
    ) -> Result<CodeValidation, CodeValidationError>;
}

/// Validator used when no remote endpoint is configured: every call is a
/// transient failure, so callers see "try again later" rather than
/// "invalid code".
pub struct UnconfiguredValidator;

#[async_trait]
impl CodeValidator for UnconfiguredValidator {
    async fn validate_rebate(
        &self,
        _request: RebateCodeRequest,
    ) -> Result<CodeValidation, CodeValidationError> {
        Err(CodeValidationError::Transient(
            "code validation is not configured".to_string(),
        ))
    }

    async fn validate_referral(
        &self,
        _request: ReferralCodeRequest,
    ) -> Result<CodeValidation, CodeValidationError> {
        Err(CodeValidationError::Transient(
            "code validation is not configured".to_string(),
        ))
    }
}
