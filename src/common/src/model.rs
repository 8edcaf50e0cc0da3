use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle status of a hosted session.
///
/// `Published` and `Active` sessions are visible to attendees; together they
/// are the statuses that can block account deletion when the session is
/// upcoming and has committed enrollments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Draft,
    Published,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(SessionStatus::Draft),
            "published" => Some(SessionStatus::Published),
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::Published => "published",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a session in this status counts against its host's
    /// deletion eligibility (when upcoming and committed attendees exist).
    pub fn blocks_deletion(&self) -> bool {
        matches!(self, SessionStatus::Published | SessionStatus::Active)
    }
}

/// Status of an attendee's enrollment in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
    Failed,
}

impl EnrollmentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EnrollmentStatus::Pending),
            "confirmed" => Some(EnrollmentStatus::Confirmed),
            "paid" => Some(EnrollmentStatus::Paid),
            "cancelled" => Some(EnrollmentStatus::Cancelled),
            "failed" => Some(EnrollmentStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Confirmed => "confirmed",
            EnrollmentStatus::Paid => "paid",
            EnrollmentStatus::Cancelled => "cancelled",
            EnrollmentStatus::Failed => "failed",
        }
    }

    /// A committed enrollment represents an attendee who has confirmed or
    /// paid; only these make an upcoming session block its host's deletion.
    pub fn is_committed(&self) -> bool {
        matches!(self, EnrollmentStatus::Confirmed | EnrollmentStatus::Paid)
    }
}

/// Application-side account record. Lives in the relational store and is the
/// last row removed by the deletion cascade; the identity provider holds the
/// matching credential record under the same `account_id`.
#[derive(Debug, Clone)]
pub struct Profile {
    pub account_id: Uuid,
    pub email: String,
    pub display_name: String,
    /// Customer reference at the billing provider, if the account ever
    /// subscribed.
    pub billing_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A meetup session hosted by an account.
#[derive(Debug, Clone)]
pub struct HostedSession {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub status: SessionStatus,
}

/// An attendee's enrollment in a hosted session.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub id: Uuid,
    pub session_id: Uuid,
    pub profile_id: Uuid,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

/// Per-account audit trail entry. References the profile with a NOT NULL
/// foreign key, which is why audit rows are the first thing the cascade
/// removes.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub action: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Local mirror of an account's subscription at the billing provider.
/// One row per profile; kept in sync by billing webhooks elsewhere in the
/// platform, read here so the deletion flow knows what to reconcile.
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    pub profile_id: Uuid,
    pub subscription_id: String,
    pub customer_id: String,
    /// Provider-side status string as last mirrored (`active`, `trialing`,
    /// `past_due`, `canceled`, ...).
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Subscription details captured from the mirror row before the cascade
/// deletes it. The billing reconciler runs after the cascade, so this
/// snapshot is its only view of what the account had.
#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    pub subscription_id: String,
    pub customer_id: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionSnapshot {
    /// Whether the mirrored status still obligates the platform to stop a
    /// future renewal.
    pub fn is_active_like(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing" | "past_due")
    }
}
