//! Entity scope resolution: computes the per-actor visibility filter that
//! repositories AND-combine with every id lookup.

use serde::{Deserialize, Serialize};

use crate::domain::{Actor, Application, Role};

/// Visibility predicate derived from an actor's role. Only the fields
/// relevant to that role are populated. A filter that is present but has
/// no populated field matches nothing: a scoped actor with no resolvable
/// entity must not silently widen into an unrestricted view.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityFilter {
    pub advisor_id: Option<String>,
    pub company_id: Option<String>,
}

impl EntityFilter {
    pub fn for_advisor(advisor_id: impl Into<String>) -> Self {
        Self { advisor_id: Some(advisor_id.into()), company_id: None }
    }

    pub fn for_company(company_id: impl Into<String>) -> Self {
        Self { advisor_id: None, company_id: Some(company_id.into()) }
    }

    pub fn permits(&self, application: &Application) -> bool {
        if self.advisor_id.is_none() && self.company_id.is_none() {
            return false;
        }

        if let Some(advisor_id) = &self.advisor_id {
            if application.assigned_to.as_deref() != Some(advisor_id.as_str()) {
                return false;
            }
        }

        if let Some(company_id) = &self.company_id {
            if application.company_id.as_deref() != Some(company_id.as_str()) {
                return false;
            }
        }

        true
    }
}

/// Whether this actor's reads and writes must be entity-scoped at all.
/// Callers consult this before applying a filter: unrestricted roles get
/// `None` from [`resolve_scope`], never an empty filter.
pub fn may_filter(actor: &Actor) -> bool {
    matches!(actor.role, Role::Advisor | Role::CompanyAdmin)
}

/// Computes the data-visibility filter for an actor. `None` means the actor
/// sees all records. A company admin without an associated company gets a
/// filter with no company id, which matches nothing; the association gap is
/// surfaced separately when they attempt a company approval.
pub fn resolve_scope(actor: &Actor) -> Option<EntityFilter> {
    match actor.role {
        Role::Superadmin | Role::Analyst => None,
        Role::Advisor => Some(EntityFilter::for_advisor(actor.id.clone())),
        Role::CompanyAdmin => {
            Some(EntityFilter { advisor_id: None, company_id: actor.company_id.clone() })
        }
    }
}
