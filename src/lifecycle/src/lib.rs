//! Gatherly Account Lifecycle Library
//!
//! Orchestrates account deletion end to end:
//! - Eligibility gating on upcoming hosted sessions
//! - Ordered cascade across relational data, with a stepwise fallback
//! - Billing reconciliation (stop renewal, never refund)
//! - Best-effort media reclamation from object storage
//! - Terminal identity revocation, the only irreversible step

pub mod billing;
pub mod cascade;
pub mod eligibility;
pub mod orchestrator;
pub mod reclaim;
pub mod report;
pub mod retry;

// Re-export commonly used types
pub use billing::{BillingDisposition, BillingReconciler};
pub use cascade::{CascadeExecutor, CascadeOutcome, CascadeReport, DeletedCounts};
pub use eligibility::{EligibilityChecker, EligibilityDecision};
pub use orchestrator::DeletionOrchestrator;
pub use reclaim::{ReclaimReport, StorageReclaimer};
pub use report::{DeletionResult, DeletionStage, EligibilityResponse};
pub use retry::RetryPolicy;
