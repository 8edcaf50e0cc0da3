//! Structured results the deletion API returns to callers.
//!
//! Every attempt ends in a `DeletionResult`; raw backend errors never
//! escape to the caller. Field names follow the JSON contract consumed by
//! the app, hence the camelCase renames.

use serde::{Deserialize, Serialize};

use crate::billing::BillingDisposition;
use crate::cascade::DeletedCounts;
use crate::eligibility::EligibilityDecision;

/// Stage a failed attempt stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionStage {
    Eligibility,
    Cascade,
    Identity,
}

impl std::fmt::Display for DeletionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            DeletionStage::Eligibility => "eligibility",
            DeletionStage::Cascade => "cascade",
            DeletionStage::Identity => "identity",
        };
        f.write_str(stage)
    }
}

/// Response body of `POST /api/v1/account/delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionResult {
    pub success: bool,
    pub deleted: DeletedCounts,
    pub subscription: BillingDisposition,
    pub storage_objects_removed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<DeletionStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Set only when identity revocation failed after the cascade already
    /// removed relational data; the account needs operator follow-up.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial_deletion: bool,
}

impl DeletionResult {
    pub fn succeeded(
        deleted: DeletedCounts,
        subscription: BillingDisposition,
        storage_objects_removed: u64,
    ) -> Self {
        Self {
            success: true,
            deleted,
            subscription,
            storage_objects_removed,
            error_stage: None,
            error_message: None,
            partial_deletion: false,
        }
    }

    /// Eligibility said no; nothing was mutated.
    pub fn blocked(reason: String) -> Self {
        Self {
            success: false,
            deleted: DeletedCounts::default(),
            subscription: BillingDisposition::default(),
            storage_objects_removed: 0,
            error_stage: Some(DeletionStage::Eligibility),
            error_message: Some(reason),
            partial_deletion: false,
        }
    }

    /// A fatal failure before anything irreversible happened.
    pub fn failed(stage: DeletionStage, message: String) -> Self {
        Self {
            success: false,
            deleted: DeletedCounts::default(),
            subscription: BillingDisposition::default(),
            storage_objects_removed: 0,
            error_stage: Some(stage),
            error_message: Some(message),
            partial_deletion: false,
        }
    }

    /// An infrastructure failure with nothing mutated and no stage to
    /// blame; the caller can simply try again later.
    pub fn retryable(message: String) -> Self {
        Self {
            success: false,
            deleted: DeletedCounts::default(),
            subscription: BillingDisposition::default(),
            storage_objects_removed: 0,
            error_stage: None,
            error_message: Some(message),
            partial_deletion: false,
        }
    }

    /// Identity revocation failed after the cascade committed. The counts
    /// still reflect what was deleted, because it really is gone.
    pub fn identity_failed(
        deleted: DeletedCounts,
        subscription: BillingDisposition,
        storage_objects_removed: u64,
        message: String,
    ) -> Self {
        Self {
            success: false,
            deleted,
            subscription,
            storage_objects_removed,
            error_stage: Some(DeletionStage::Identity),
            error_message: Some(message),
            partial_deletion: true,
        }
    }
}

/// Response body of `GET /api/v1/account/deletion-eligibility`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResponse {
    pub can_delete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Present only when deletion is blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_session_count: Option<u64>,
}

impl From<EligibilityDecision> for EligibilityResponse {
    fn from(decision: EligibilityDecision) -> Self {
        Self {
            can_delete: decision.can_delete,
            reason: decision.reason,
            blocking_session_count: (!decision.can_delete).then_some(decision.blocking_sessions),
        }
    }
}
