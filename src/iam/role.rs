//! Predefined roles and their built-in policies
//!
//! | Role           | Allowed actions                         |
//! |----------------|-----------------------------------------|
//! | SERVICE_ADMIN  | `*`                                     |
//! | SECURITY_ADMIN | `security.*`                            |
//! | READER         | `*.view`                                |
//! | CREATOR        | `*.create`, `*.update`, `*.delete`      |
//! | APPROVER       | `*.approve`                             |

use super::{Action, PermissionPolicy, Subject};
use serde::Serialize;
use std::fmt;

/// One built-in ALLOW grant of a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleGrant {
    /// Suffix of the system policy id (`system:role:<ROLE>:<key>`)
    pub key: &'static str,
    pub action: &'static str,
    pub description: &'static str,
}

/// Built-in role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredefinedRole {
    ServiceAdmin,
    SecurityAdmin,
    Reader,
    Creator,
    Approver,
}

const SERVICE_ADMIN: &[RoleGrant] = &[RoleGrant {
    key: "all",
    action: "*",
    description: "Service admin has full access to all services and settings",
}];

const SECURITY_ADMIN: &[RoleGrant] = &[RoleGrant {
    key: "security",
    action: "security.*",
    description: "Security admin can perform all security-related actions",
}];

const READER: &[RoleGrant] = &[RoleGrant {
    key: "view",
    action: "*.view",
    description: "Reader can view all resources",
}];

const CREATOR: &[RoleGrant] = &[
    RoleGrant {
        key: "create",
        action: "*.create",
        description: "Creator can create resources",
    },
    RoleGrant {
        key: "update",
        action: "*.update",
        description: "Creator can update resources",
    },
    RoleGrant {
        key: "delete",
        action: "*.delete",
        description: "Creator can delete resources",
    },
];

const APPROVER: &[RoleGrant] = &[RoleGrant {
    key: "approve",
    action: "*.approve",
    description: "Approver can approve pending items",
}];

impl PredefinedRole {
    pub const ALL: [PredefinedRole; 5] = [
        PredefinedRole::ServiceAdmin,
        PredefinedRole::SecurityAdmin,
        PredefinedRole::Reader,
        PredefinedRole::Creator,
        PredefinedRole::Approver,
    ];

    /// Canonical role name as carried in user role sets
    pub fn name(&self) -> &'static str {
        match self {
            PredefinedRole::ServiceAdmin => "SERVICE_ADMIN",
            PredefinedRole::SecurityAdmin => "SECURITY_ADMIN",
            PredefinedRole::Reader => "READER",
            PredefinedRole::Creator => "CREATOR",
            PredefinedRole::Approver => "APPROVER",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PredefinedRole::ServiceAdmin => "Full access to all services and settings",
            PredefinedRole::SecurityAdmin => "All security-related actions",
            PredefinedRole::Reader => "View all resources",
            PredefinedRole::Creator => "Create, update, and delete resources",
            PredefinedRole::Approver => "Approve pending items",
        }
    }

    pub fn grants(&self) -> &'static [RoleGrant] {
        match self {
            PredefinedRole::ServiceAdmin => SERVICE_ADMIN,
            PredefinedRole::SecurityAdmin => SECURITY_ADMIN,
            PredefinedRole::Reader => READER,
            PredefinedRole::Creator => CREATOR,
            PredefinedRole::Approver => APPROVER,
        }
    }

    /// Look up a role by exact (case-sensitive) name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.name() == name)
    }

    pub fn is_predefined(name: &str) -> bool {
        Self::from_name(name).is_some()
    }

    /// System policies granted by this role
    pub fn policies(&self) -> Vec<PermissionPolicy> {
        self.grants()
            .iter()
            .filter_map(|grant| {
                // Table entries are fixed patterns that always parse
                let action = Action::parse(grant.action).ok()?;
                Some(PermissionPolicy::system(
                    format!("system:role:{}:{}", self.name(), grant.key),
                    Subject::role(self.name()),
                    action,
                    grant.description,
                ))
            })
            .collect()
    }

    /// System policies for a role name; unknown names grant nothing
    pub fn policies_for_name(name: &str) -> Vec<PermissionPolicy> {
        match Self::from_name(name) {
            Some(role) => role.policies(),
            None => {
                tracing::trace!("Role '{}' is not predefined, no system policies", name);
                Vec::new()
            }
        }
    }

    /// Resolve a `system:role:<ROLE>:<key>` id back to its policy
    pub fn find_system_policy(id: &str) -> Option<PermissionPolicy> {
        let rest = id.strip_prefix("system:role:")?;
        let (name, _) = rest.split_once(':')?;
        Self::from_name(name)?
            .policies()
            .into_iter()
            .find(|policy| policy.id() == id)
    }
}

impl fmt::Display for PredefinedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::Effect;

    fn actions(role: PredefinedRole) -> Vec<String> {
        role.policies()
            .iter()
            .map(|p| p.action().as_str().to_string())
            .collect()
    }

    #[test]
    fn test_role_table() {
        assert_eq!(actions(PredefinedRole::ServiceAdmin), vec!["*"]);
        assert_eq!(actions(PredefinedRole::SecurityAdmin), vec!["security.*"]);
        assert_eq!(actions(PredefinedRole::Reader), vec!["*.view"]);
        assert_eq!(
            actions(PredefinedRole::Creator),
            vec!["*.create", "*.update", "*.delete"]
        );
        assert_eq!(actions(PredefinedRole::Approver), vec!["*.approve"]);
    }

    #[test]
    fn test_every_grant_parses() {
        for role in PredefinedRole::ALL {
            assert_eq!(role.policies().len(), role.grants().len(), "{}", role);
        }
    }

    #[test]
    fn test_system_policy_shape() {
        for role in PredefinedRole::ALL {
            for policy in role.policies() {
                assert!(policy.is_system());
                assert_eq!(policy.effect(), Effect::Allow);
                assert!(policy.resource().is_all());
                assert!(policy.profile_id().is_none());
                assert_eq!(policy.subject(), &Subject::role(role.name()));
                assert!(policy.id().starts_with(&format!("system:role:{}:", role.name())));
            }
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(PredefinedRole::from_name("READER"), Some(PredefinedRole::Reader));
        assert_eq!(PredefinedRole::from_name("reader"), None);
        assert!(PredefinedRole::is_predefined("SERVICE_ADMIN"));
        assert!(!PredefinedRole::is_predefined("SUPER_USER"));
    }

    #[test]
    fn test_unknown_role_grants_nothing() {
        assert!(PredefinedRole::policies_for_name("SUPER_USER").is_empty());
        assert!(PredefinedRole::policies_for_name("").is_empty());
    }

    #[test]
    fn test_find_system_policy() {
        let policy = PredefinedRole::find_system_policy("system:role:CREATOR:update").unwrap();
        assert_eq!(policy.action().as_str(), "*.update");

        assert!(PredefinedRole::find_system_policy("system:role:CREATOR:approve").is_none());
        assert!(PredefinedRole::find_system_policy("system:role:NOPE:all").is_none());
        assert!(PredefinedRole::find_system_policy("3f1c0a4e").is_none());
    }

    #[test]
    fn test_service_admin_vs_creator_wildcards() {
        let admin = &PredefinedRole::ServiceAdmin.policies()[0];
        let creator = &PredefinedRole::Creator.policies()[0];
        let nested = Action::parse("service.sub.create").unwrap();

        assert!(admin.matches_action(&nested));
        assert!(!creator.matches_action(&nested));
    }
}
