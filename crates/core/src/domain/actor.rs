use serde::{Deserialize, Serialize};

/// Roles carried by authenticated users. `Superadmin` is the unrestricted
/// system role; `Analyst` is internal staff with read-only access to the
/// full dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Advisor,
    CompanyAdmin,
    Analyst,
    Superadmin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewApplications,
    EditApplication,
}

/// The acting user for a single request. Always passed explicitly into
/// resolver and orchestrator calls; there is no ambient "current user".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub company_id: Option<String>,
}

impl Actor {
    pub fn has_capability(&self, capability: Capability) -> bool {
        match self.role {
            Role::Superadmin => true,
            Role::Advisor | Role::CompanyAdmin => true,
            Role::Analyst => matches!(capability, Capability::ViewApplications),
        }
    }

    pub fn is_advisor(&self) -> bool {
        self.role == Role::Advisor
    }

    pub fn is_company_admin(&self) -> bool {
        self.role == Role::CompanyAdmin
    }
}
