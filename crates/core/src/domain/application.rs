use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered application lifecycle. `Rejected` is terminal and reachable only
/// from the two pre-approval states; `Approved` is never set directly, it is
/// derived from the second of the two approvals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    InReview,
    Approved,
    PorDispersar,
    Completed,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::PorDispersar => "por_dispersar",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "in_review" => Some(Self::InReview),
            "approved" => Some(Self::Approved),
            "por_dispersar" => Some(Self::PorDispersar),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Terminal states reject any further edit except the two explicit
    /// forward edges handled by the transition table.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub product_type: String,
    pub requested_amount: Decimal,
    pub status: ApplicationStatus,
    pub client_name: String,
    pub client_email: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub assigned_to: Option<String>,
    pub advisor_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-application approval record. One per application, created with the
/// application itself. Both flags are monotonic: once true they are never
/// reset by the workflow, and each date is present iff its flag is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApprovalStatus {
    pub approved_by_advisor: bool,
    pub approved_by_company: bool,
    pub approval_date_advisor: Option<DateTime<Utc>>,
    pub approval_date_company: Option<DateTime<Utc>>,
}

impl ApprovalStatus {
    pub fn fully_approved(&self) -> bool {
        self.approved_by_advisor && self.approved_by_company
    }

    /// Checks the flag/date pairing invariant. Repositories assert this when
    /// decoding rows so a corrupt record surfaces as an error, not as a
    /// half-approved state.
    pub fn is_consistent(&self) -> bool {
        self.approved_by_advisor == self.approval_date_advisor.is_some()
            && self.approved_by_company == self.approval_date_company.is_some()
    }
}
