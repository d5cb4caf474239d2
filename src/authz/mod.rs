//! Authorization: the role registry and permission predicates.
//!
//! Roles are a closed set attached to a principal as strings. Every action
//! category has a flat allow-list of roles; there is no role hierarchy and no
//! super-user bypass. A principal may do an action iff its role set intersects
//! that action's allow-list.

mod principal;
mod registry;

pub use principal::Principal;
pub use registry::{RoleGrant, RoleRegistry};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Well-known role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Auditor,
    OperationsManager,
    SalesManager,
    SalesExecutive,
    Accountant,
    Supervisor,
    Technician,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Owner,
        Role::Auditor,
        Role::OperationsManager,
        Role::SalesManager,
        Role::SalesExecutive,
        Role::Accountant,
        Role::Supervisor,
        Role::Technician,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Auditor => "AUDITOR",
            Role::OperationsManager => "OPERATIONS_MANAGER",
            Role::SalesManager => "SALES_MANAGER",
            Role::SalesExecutive => "SALES_EXECUTIVE",
            Role::Accountant => "ACCOUNTANT",
            Role::Supervisor => "SUPERVISOR",
            Role::Technician => "TECHNICIAN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// Action categories guarded by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ManageLeads,
    ManageClients,
    ManageQuotations,
    ManageJobs,
    ViewJobs,
    ViewInvoices,
    ManageInvoices,
    ManageMasters,
    ViewAuditLogs,
    ViewDeletedRecords,
    RestoreRecords,
    ManageUsers,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::ManageLeads,
        Action::ManageClients,
        Action::ManageQuotations,
        Action::ManageJobs,
        Action::ViewJobs,
        Action::ViewInvoices,
        Action::ManageInvoices,
        Action::ManageMasters,
        Action::ViewAuditLogs,
        Action::ViewDeletedRecords,
        Action::RestoreRecords,
        Action::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ManageLeads => "manage_leads",
            Action::ManageClients => "manage_clients",
            Action::ManageQuotations => "manage_quotations",
            Action::ManageJobs => "manage_jobs",
            Action::ViewJobs => "view_jobs",
            Action::ViewInvoices => "view_invoices",
            Action::ManageInvoices => "manage_invoices",
            Action::ManageMasters => "manage_masters",
            Action::ViewAuditLogs => "view_audit_logs",
            Action::ViewDeletedRecords => "view_deleted_records",
            Action::RestoreRecords => "restore_records",
            Action::ManageUsers => "manage_users",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&Role::OperationsManager).unwrap();
        assert_eq!(json, "\"OPERATIONS_MANAGER\"");
    }
}
