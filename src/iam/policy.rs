//! Permission policy aggregate
//!
//! A policy binds a subject to an action pattern and a resource pattern with
//! an effect. System policies come from the predefined role table and are
//! immutable; custom policies belong to exactly one profile.

use super::{Action, ProfileId, Resource, Subject};
use crate::error::{PolicyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Creator recorded on system policies
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Effect of a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    /// Grant the action
    #[default]
    Allow,
    /// Deny the action (takes precedence over Allow)
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "ALLOW",
            Effect::Deny => "DENY",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ALLOW" => Ok(Effect::Allow),
            "DENY" => Ok(Effect::Deny),
            _ => Err(PolicyError::InvalidEffect(s.to_string())),
        }
    }
}

/// Fields of a custom policy before it has an identity
#[derive(Debug, Clone)]
pub struct NewPolicy {
    pub profile_id: ProfileId,
    pub subject: Subject,
    pub action: Action,
    pub resource: Resource,
    pub effect: Effect,
    pub description: String,
    pub created_by: String,
}

/// Permission policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionPolicy {
    id: String,
    /// `None` for system policies
    profile_id: Option<ProfileId>,
    subject: Subject,
    action: Action,
    resource: Resource,
    effect: Effect,
    description: String,
    is_system: bool,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
}

impl PermissionPolicy {
    /// Create a custom policy with a fresh id
    pub fn create(new: NewPolicy) -> Self {
        Self::reconstitute(Uuid::new_v4().to_string(), new, Utc::now(), None)
    }

    /// Rebuild a custom policy from stored fields
    pub fn reconstitute(
        id: String,
        new: NewPolicy,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        PermissionPolicy {
            id,
            profile_id: Some(new.profile_id),
            subject: new.subject,
            action: new.action,
            resource: new.resource,
            effect: new.effect,
            description: new.description,
            is_system: false,
            created_at,
            created_by: new.created_by,
            updated_at,
        }
    }

    /// Build a built-in role policy: profile-agnostic, ALLOW, resource `*`
    pub(crate) fn system(id: String, subject: Subject, action: Action, description: &str) -> Self {
        PermissionPolicy {
            id,
            profile_id: None,
            subject,
            action,
            resource: Resource::all(),
            effect: Effect::Allow,
            description: description.to_string(),
            is_system: true,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            created_by: SYSTEM_ACTOR.to_string(),
            updated_at: None,
        }
    }

    /// Revise the description of a custom policy
    ///
    /// Subject, action, resource and effect are fixed at creation.
    pub fn revise_description(&mut self, description: impl Into<String>) -> Result<()> {
        self.ensure_mutable()?;
        self.description = description.into();
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Fail with `ImmutablePolicy` for system policies
    pub fn ensure_mutable(&self) -> Result<()> {
        if self.is_system {
            return Err(PolicyError::ImmutablePolicy(self.id.clone()));
        }
        Ok(())
    }

    /// Check if this policy covers the action and, when given, the resource
    ///
    /// `None` and the universal resource `*` both skip the resource check,
    /// so a resource-scoped policy still applies to a request for every
    /// resource.
    pub fn matches(&self, action: &Action, resource_id: Option<&str>) -> bool {
        let resource_id = resource_id.filter(|r| r.trim() != "*");
        self.matches_action(action)
            && resource_id.map_or(true, |resource| self.resource.matches(resource))
    }

    pub fn matches_action(&self, action: &Action) -> bool {
        self.action.matches(action)
    }

    pub fn applies_to(&self, subject: &Subject) -> bool {
        &self.subject == subject
    }

    pub fn applies_to_any<'a>(&self, subjects: impl IntoIterator<Item = &'a Subject>) -> bool {
        subjects.into_iter().any(|s| self.applies_to(s))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn profile_id(&self) -> Option<&ProfileId> {
        self.profile_id.as_ref()
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
