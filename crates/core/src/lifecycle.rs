//! The approval state machine: the single source of truth for which status
//! transitions are legal and what preconditions they require. All functions
//! here are pure; persistence and actor capability checks live elsewhere.

use serde::{Deserialize, Serialize};

use crate::domain::{Actor, ApplicationStatus, ApprovalStatus, Role};
use crate::errors::WorkflowError;

/// The two independent approving parties. Approval is tracked as two
/// monotonic flags rather than folded into the status enum, because the
/// parties act asynchronously and "one approved, one pending" must remain a
/// distinct, queryable state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalParty {
    Advisor,
    Company,
}

impl std::fmt::Display for ApprovalParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Advisor => f.write_str("advisor"),
            Self::Company => f.write_str("company"),
        }
    }
}

/// Whether this actor may cast an approval for the given party. Approvals
/// are party-specific: even the unrestricted system role cannot stand in
/// for either of the two required parties.
pub fn approval_role_allows(actor: &Actor, party: ApprovalParty) -> bool {
    match party {
        ApprovalParty::Advisor => actor.is_advisor(),
        ApprovalParty::Company => actor.is_company_admin(),
    }
}

/// State guard for recording an approval: the application must still be in
/// one of the two pre-approval states and the party must not have approved
/// already. Duplicate approvals are rejected, not silently ignored.
pub fn check_approval_state(
    status: ApplicationStatus,
    approval: &ApprovalStatus,
    party: ApprovalParty,
) -> Result<(), WorkflowError> {
    let already = match party {
        ApprovalParty::Advisor => approval.approved_by_advisor,
        ApprovalParty::Company => approval.approved_by_company,
    };
    if already {
        return Err(WorkflowError::AlreadyApproved { party });
    }

    match status {
        ApplicationStatus::Pending | ApplicationStatus::InReview => Ok(()),
        other => {
            Err(WorkflowError::InvalidTransition { from: other, to: ApplicationStatus::Approved })
        }
    }
}

/// The explicit transition table for manual status changes. `Approved` has
/// no inbound edge here: it is exclusively the derived result of the second
/// approval (see [`derived_status`]).
pub fn check_status_change(
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<(), WorkflowError> {
    use ApplicationStatus::{Completed, InReview, Pending, PorDispersar, Rejected};

    let legal = matches!(
        (from, to),
        (Pending, InReview)
            | (Pending, Rejected)
            | (InReview, Rejected)
            | (ApplicationStatus::Approved, PorDispersar)
            | (PorDispersar, Completed)
    );

    if legal {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition { from, to })
    }
}

/// Role gate for manual status changes. The disbursement edges are reserved
/// for the two approving roles plus the system role; the pre-approval edges
/// are open to any role that clears the edit capability check.
pub fn status_change_role_allows(actor: &Actor, to: ApplicationStatus) -> bool {
    match to {
        ApplicationStatus::PorDispersar | ApplicationStatus::Completed => {
            matches!(actor.role, Role::Advisor | Role::CompanyAdmin | Role::Superadmin)
        }
        _ => true,
    }
}

/// The auto-advance rule: the moment both approval flags are true the
/// application becomes `Approved`, regardless of which approval arrived
/// second. Repositories evaluate this inside the same logical operation as
/// the approval write so readers never observe both flags true with a stale
/// status.
pub fn derived_status(approval: &ApprovalStatus) -> Option<ApplicationStatus> {
    approval.fully_approved().then_some(ApplicationStatus::Approved)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::{Actor, ApplicationStatus, ApprovalStatus, Role};
    use crate::errors::WorkflowError;

    use super::{
        approval_role_allows, check_approval_state, check_status_change, derived_status,
        status_change_role_allows, ApprovalParty,
    };

    fn actor(role: Role) -> Actor {
        Actor { id: "u-1".to_string(), name: "Guard Tester".to_string(), role, company_id: None }
    }

    fn advisor_approved() -> ApprovalStatus {
        ApprovalStatus {
            approved_by_advisor: true,
            approval_date_advisor: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn approvals_are_party_specific() {
        assert!(approval_role_allows(&actor(Role::Advisor), ApprovalParty::Advisor));
        assert!(!approval_role_allows(&actor(Role::Advisor), ApprovalParty::Company));
        assert!(approval_role_allows(&actor(Role::CompanyAdmin), ApprovalParty::Company));
        assert!(!approval_role_allows(&actor(Role::Superadmin), ApprovalParty::Advisor));
    }

    #[test]
    fn approval_allowed_in_pre_approval_states_only() {
        let fresh = ApprovalStatus::default();
        for status in [ApplicationStatus::Pending, ApplicationStatus::InReview] {
            check_approval_state(status, &fresh, ApprovalParty::Advisor).expect("pre-approval");
        }
        for status in [
            ApplicationStatus::Approved,
            ApplicationStatus::PorDispersar,
            ApplicationStatus::Completed,
            ApplicationStatus::Rejected,
        ] {
            let error = check_approval_state(status, &fresh, ApprovalParty::Company)
                .expect_err("post-approval states reject new approvals");
            assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn duplicate_approval_is_rejected_not_ignored() {
        let error =
            check_approval_state(ApplicationStatus::Pending, &advisor_approved(), ApprovalParty::Advisor)
                .expect_err("second advisor approval must fail");
        assert_eq!(error, WorkflowError::AlreadyApproved { party: ApprovalParty::Advisor });

        // The other party is unaffected.
        check_approval_state(ApplicationStatus::Pending, &advisor_approved(), ApprovalParty::Company)
            .expect("company approval still open");
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use ApplicationStatus::{Approved, Completed, InReview, Pending, PorDispersar, Rejected};

        check_status_change(Pending, InReview).expect("pending -> in_review");
        check_status_change(Pending, Rejected).expect("pending -> rejected");
        check_status_change(InReview, Rejected).expect("in_review -> rejected");
        check_status_change(Approved, PorDispersar).expect("approved -> por_dispersar");
        check_status_change(PorDispersar, Completed).expect("por_dispersar -> completed");

        for (from, to) in [
            (Pending, PorDispersar),
            (Pending, Approved),
            (InReview, Approved),
            (Approved, Completed),
            (Completed, PorDispersar),
            (Rejected, InReview),
            (Completed, Rejected),
        ] {
            let error = check_status_change(from, to).expect_err("illegal edge");
            assert_eq!(error, WorkflowError::InvalidTransition { from, to });
        }
    }

    #[test]
    fn disbursement_edges_are_reserved_for_workflow_roles() {
        for role in [Role::Advisor, Role::CompanyAdmin, Role::Superadmin] {
            assert!(status_change_role_allows(&actor(role), ApplicationStatus::PorDispersar));
            assert!(status_change_role_allows(&actor(role), ApplicationStatus::Completed));
        }
        assert!(!status_change_role_allows(&actor(Role::Analyst), ApplicationStatus::Completed));
        assert!(status_change_role_allows(&actor(Role::Analyst), ApplicationStatus::InReview));
    }

    #[test]
    fn status_derives_to_approved_only_when_both_flags_set() {
        assert_eq!(derived_status(&ApprovalStatus::default()), None);
        assert_eq!(derived_status(&advisor_approved()), None);

        let both = ApprovalStatus {
            approved_by_advisor: true,
            approved_by_company: true,
            approval_date_advisor: Some(Utc::now()),
            approval_date_company: Some(Utc::now()),
        };
        assert_eq!(derived_status(&both), Some(ApplicationStatus::Approved));
    }
}
