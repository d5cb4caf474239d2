use std::collections::{HashMap, HashSet};

use serde::Serialize;
use utoipa::ToSchema;

use super::{Action, Principal, Role};
use crate::errors::{AppError, AppResult};

/// Allow-list each action ships with. The match is exhaustive, so adding an
/// action without deciding its roles does not compile.
fn default_allow_list(action: Action) -> &'static [Role] {
    use Role::*;

    match action {
        Action::ManageLeads => &[Owner, OperationsManager, SalesManager, SalesExecutive],
        Action::ManageClients => &[Owner, OperationsManager, SalesManager, SalesExecutive],
        Action::ManageQuotations => &[Owner, OperationsManager, SalesManager],
        Action::ManageJobs => &[Owner, OperationsManager, Supervisor],
        Action::ViewJobs => &[Owner, Auditor, OperationsManager, Supervisor, Technician, Accountant],
        Action::ViewInvoices => &[Owner, Auditor, OperationsManager, Accountant],
        Action::ManageInvoices => &[Owner, Accountant],
        Action::ManageMasters => &[Owner, OperationsManager],
        Action::ViewAuditLogs => &[Owner, Auditor, OperationsManager],
        Action::ViewDeletedRecords => &[Owner, Auditor, OperationsManager],
        Action::RestoreRecords => &[Owner],
        Action::ManageUsers => &[Owner],
    }
}

/// Action → allowed role names. Built once at startup, read-only afterwards.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    allow_lists: HashMap<Action, HashSet<&'static str>>,
}

/// One role together with the actions it confers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleGrant {
    pub role: Role,
    pub actions: Vec<Action>,
}

impl RoleRegistry {
    pub fn standard() -> Self {
        let allow_lists = Action::ALL
            .into_iter()
            .map(|action| {
                let roles = default_allow_list(action).iter().map(Role::as_str).collect();
                (action, roles)
            })
            .collect();

        Self { allow_lists }
    }

    /// True iff the principal exists and one of its roles is on the action's allow-list.
    pub fn permits(&self, principal: Option<&Principal>, action: Action) -> bool {
        let Some(principal) = principal else {
            return false;
        };

        self.allow_lists
            .get(&action)
            .map(|allowed| principal.roles.iter().any(|role| allowed.contains(role.as_str())))
            .unwrap_or(false)
    }

    pub fn require(&self, principal: &Principal, action: Action) -> AppResult<()> {
        if self.permits(Some(principal), action) {
            return Ok(());
        }

        tracing::debug!(
            user_id = %principal.user_id,
            action = %action,
            roles = ?principal.roles,
            "permission denied"
        );
        Err(AppError::forbidden(format!("missing permission: {action}")))
    }

    pub fn grants(&self) -> Vec<RoleGrant> {
        Role::ALL
            .into_iter()
            .map(|role| RoleGrant {
                role,
                actions: Action::ALL
                    .into_iter()
                    .filter(|action| {
                        self.allow_lists
                            .get(action)
                            .is_some_and(|allowed| allowed.contains(role.as_str()))
                    })
                    .collect(),
            })
            .collect()
    }
}
