//! Policy management commands and queries
//!
//! Commands only ever touch custom policies. Any attempt to update or delete
//! a system policy fails with [`PolicyError::ImmutablePolicy`] before the
//! store is written.

use crate::error::{PolicyError, Result};
use crate::events::PolicyEvent;
use crate::iam::{
    Action, AuthorizationEngine, Effect, NewPolicy, PermissionPolicy, PolicyStore,
    PredefinedRole, ProfileId, Resource, Subject, UserId,
};
use chrono::{DateTime, Utc};
use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// Create a custom policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyCmd {
    pub profile_id: ProfileId,

    /// `user:<id>`, `group:<id>` or `role:<NAME>`
    #[validate(length(min = 1, max = 256))]
    pub subject_urn: String,

    /// e.g. `payments.ach-payments.*`
    #[validate(length(min = 1, max = 256))]
    pub action_pattern: String,

    /// Defaults to `*`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 1024))]
    pub resource_pattern: Option<String>,

    /// `ALLOW` or `DENY`, case-insensitive; defaults to `ALLOW`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,

    #[serde(default)]
    #[validate(length(max = 1024))]
    pub description: String,

    #[validate(length(min = 1, max = 256))]
    pub created_by: String,
}

/// Revise the description of a custom policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePolicyCmd {
    #[validate(length(min = 1))]
    pub policy_id: String,

    #[validate(length(max = 1024))]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePolicyCmd {
    pub policy_id: String,
}

/// External view of a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDto {
    pub id: String,
    pub profile_id: Option<ProfileId>,
    pub subject_urn: String,
    pub action_pattern: String,
    pub resource_pattern: String,
    pub effect: Effect,
    pub description: String,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&PermissionPolicy> for PolicyDto {
    fn from(policy: &PermissionPolicy) -> Self {
        PolicyDto {
            id: policy.id().to_string(),
            profile_id: policy.profile_id().cloned(),
            subject_urn: policy.subject().to_urn(),
            action_pattern: policy.action().to_string(),
            resource_pattern: policy.resource().to_string(),
            effect: policy.effect(),
            description: policy.description().to_string(),
            is_system: policy.is_system(),
            created_at: policy.created_at(),
            created_by: policy.created_by().to_string(),
            updated_at: policy.updated_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub profile_id: ProfileId,
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Vec<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResult {
    pub allowed: bool,
    pub reason: String,
    /// `null` when no policy matched
    pub effective_effect: Option<Effect>,
}

/// Application service over the policy store and the engine
pub struct PolicyService {
    store: Arc<dyn PolicyStore>,
    engine: Arc<AuthorizationEngine>,
    events: Option<Sender<PolicyEvent>>,
}

impl PolicyService {
    /// `engine` must read from the same `store`
    pub fn new(store: Arc<dyn PolicyStore>, engine: Arc<AuthorizationEngine>) -> Self {
        PolicyService {
            store,
            engine,
            events: None,
        }
    }

    /// Publish lifecycle events to `sender`
    pub fn with_events(mut self, sender: Sender<PolicyEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    // ===== Commands =====

    pub fn create_policy(&self, cmd: CreatePolicyCmd) -> Result<PolicyDto> {
        cmd.validate()?;

        let subject = Subject::from_urn(&cmd.subject_urn)?;
        let action = Action::parse(cmd.action_pattern)?;
        let resource = match cmd.resource_pattern {
            Some(pattern) => Resource::parse(pattern)?,
            None => Resource::all(),
        };
        let effect = match cmd.effect.as_deref() {
            Some(effect) => effect.parse::<Effect>()?,
            None => Effect::Allow,
        };

        let policy = PermissionPolicy::create(NewPolicy {
            profile_id: cmd.profile_id,
            subject,
            action,
            resource,
            effect,
            description: cmd.description,
            created_by: cmd.created_by,
        });
        let profile_id = owning_profile(&policy)?;

        self.store.save(policy.clone())?;
        self.engine.invalidate_profile(&profile_id);

        info!(
            "Created {} policy {} for {} on '{}' in profile {}",
            policy.effect(),
            policy.id(),
            policy.subject(),
            policy.action(),
            profile_id
        );

        self.publish(PolicyEvent::Created {
            policy_id: policy.id().to_string(),
            profile_id,
            subject_urn: policy.subject().to_urn(),
            created_by: policy.created_by().to_string(),
            at: policy.created_at(),
        });

        Ok(PolicyDto::from(&policy))
    }

    pub fn update_policy(&self, cmd: UpdatePolicyCmd) -> Result<PolicyDto> {
        cmd.validate()?;

        let mut policy = self.find_policy(&cmd.policy_id)?;
        if let Err(e) = policy.revise_description(cmd.description) {
            warn!("Rejected update of system policy {}", cmd.policy_id);
            return Err(e);
        }
        let profile_id = owning_profile(&policy)?;

        if let Err(e) = self.store.update(policy.clone()) {
            warn!("Update of policy {} failed: {}", policy.id(), e);
            return Err(e);
        }
        self.engine.invalidate_profile(&profile_id);

        info!("Updated policy {} in profile {}", policy.id(), profile_id);

        self.publish(PolicyEvent::Updated {
            policy_id: policy.id().to_string(),
            profile_id,
            at: policy.updated_at().unwrap_or_else(Utc::now),
        });

        Ok(PolicyDto::from(&policy))
    }

    pub fn delete_policy(&self, cmd: DeletePolicyCmd) -> Result<()> {
        let policy = self.find_policy(&cmd.policy_id)?;
        if let Err(e) = policy.ensure_mutable() {
            warn!("Rejected delete of system policy {}", cmd.policy_id);
            return Err(e);
        }
        let profile_id = owning_profile(&policy)?;

        self.store.delete_by_id(policy.id())?;
        self.engine.invalidate_profile(&profile_id);

        info!("Deleted policy {} in profile {}", policy.id(), profile_id);

        self.publish(PolicyEvent::Deleted {
            policy_id: policy.id().to_string(),
            profile_id,
            at: Utc::now(),
        });

        Ok(())
    }

    // ===== Queries =====

    /// Custom policies by id, falling back to the role table for system ids
    pub fn get_policy(&self, policy_id: &str) -> Result<Option<PolicyDto>> {
        Ok(self.lookup(policy_id)?.as_ref().map(PolicyDto::from))
    }

    pub fn list_policies_by_profile(&self, profile_id: &ProfileId) -> Result<Vec<PolicyDto>> {
        Ok(self
            .store
            .find_by_profile(profile_id)?
            .iter()
            .map(PolicyDto::from)
            .collect())
    }

    pub fn list_policies_by_subject(
        &self,
        profile_id: &ProfileId,
        subject_urn: &str,
    ) -> Result<Vec<PolicyDto>> {
        let subject = Subject::from_urn(subject_urn)?;
        Ok(self
            .store
            .find_by_subject(profile_id, &subject)?
            .iter()
            .map(PolicyDto::from)
            .collect())
    }

    pub fn effective_permissions<R: AsRef<str>>(
        &self,
        profile_id: &ProfileId,
        user_id: &UserId,
        roles: &[R],
    ) -> Result<Vec<PolicyDto>> {
        Ok(self
            .engine
            .effective_permissions(profile_id, user_id, roles)?
            .iter()
            .map(PolicyDto::from)
            .collect())
    }

    pub fn check_authorization(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResult> {
        let action = Action::parse(request.action.as_str())?;

        let decision = self.engine.check_permission(
            &request.profile_id,
            &request.user_id,
            request.roles.as_slice(),
            &action,
            request.resource_id.as_deref(),
        )?;

        Ok(AuthorizationResult {
            allowed: decision.allowed,
            reason: decision.reason,
            effective_effect: decision.effective_effect,
        })
    }

    fn lookup(&self, policy_id: &str) -> Result<Option<PermissionPolicy>> {
        if let Some(policy) = self.store.find_by_id(policy_id)? {
            return Ok(Some(policy));
        }
        Ok(PredefinedRole::find_system_policy(policy_id))
    }

    fn find_policy(&self, policy_id: &str) -> Result<PermissionPolicy> {
        self.lookup(policy_id)?.ok_or_else(|| {
            warn!("Policy {} not found", policy_id);
            PolicyError::NotFound(policy_id.to_string())
        })
    }

    fn publish(&self, event: PolicyEvent) {
        let Some(sender) = &self.events else {
            return;
        };
        debug!("Publishing {:?}", event);
        if sender.send(event).is_err() {
            warn!("Policy event receiver disconnected, event dropped");
        }
    }
}

/// Profile of a custom policy; system policies have none
fn owning_profile(policy: &PermissionPolicy) -> Result<ProfileId> {
    policy
        .profile_id()
        .cloned()
        .ok_or_else(|| PolicyError::ImmutablePolicy(policy.id().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::iam::{InMemoryGroupLookup, InMemoryPolicyStore};
    use std::collections::BTreeSet;

    fn service() -> (Arc<InMemoryPolicyStore>, PolicyService) {
        let store = Arc::new(InMemoryPolicyStore::new());
        let engine = Arc::new(AuthorizationEngine::new(
            store.clone(),
            Arc::new(InMemoryGroupLookup::new()),
        ));
        (store.clone(), PolicyService::new(store, engine))
    }

    fn create_cmd(subject: &str, action: &str) -> CreatePolicyCmd {
        CreatePolicyCmd {
            profile_id: ProfileId::new("profile-1"),
            subject_urn: subject.to_string(),
            action_pattern: action.to_string(),
            resource_pattern: None,
            effect: None,
            description: "test".to_string(),
            created_by: "admin".to_string(),
        }
    }

    #[test]
    fn test_create_defaults() {
        let (store, service) = service();
        let dto = service.create_policy(create_cmd("user:u1", "service.create")).unwrap();

        assert_eq!(dto.effect, Effect::Allow);
        assert_eq!(dto.resource_pattern, "*");
        assert_eq!(dto.subject_urn, "user:u1");
        assert!(!dto.is_system);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_parses_effect_and_resource() {
        let (_, service) = service();
        let mut cmd = create_cmd("group:g1", "payments.*");
        cmd.effect = Some("deny".to_string());
        cmd.resource_pattern = Some("account.1,account.2".to_string());

        let dto = service.create_policy(cmd).unwrap();
        assert_eq!(dto.effect, Effect::Deny);
        assert_eq!(dto.resource_pattern, "account.1,account.2");
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let (store, service) = service();

        assert!(matches!(
            service.create_policy(create_cmd("nobody", "service.create")),
            Err(PolicyError::InvalidSubject(_))
        ));
        assert!(matches!(
            service.create_policy(create_cmd("user:u1", "Service.Create")),
            Err(PolicyError::InvalidAction(_))
        ));
        assert!(matches!(
            service.create_policy(create_cmd("", "service.create")),
            Err(PolicyError::Validation(_))
        ));

        let mut cmd = create_cmd("user:u1", "service.create");
        cmd.effect = Some("PERMIT".to_string());
        assert!(matches!(service.create_policy(cmd), Err(PolicyError::InvalidEffect(_))));

        let mut cmd = create_cmd("user:u1", "service.create");
        cmd.created_by = String::new();
        assert!(matches!(service.create_policy(cmd), Err(PolicyError::Validation(_))));

        assert!(store.is_empty());
    }

    #[test]
    fn test_update_revises_description_only() {
        let (_, service) = service();
        let created = service.create_policy(create_cmd("user:u1", "service.create")).unwrap();

        let updated = service
            .update_policy(UpdatePolicyCmd {
                policy_id: created.id.clone(),
                description: "revised".to_string(),
            })
            .unwrap();

        assert_eq!(updated.description, "revised");
        assert_eq!(updated.action_pattern, created.action_pattern);
        assert_eq!(updated.effect, created.effect);
        assert!(updated.updated_at.is_some());
    }

    #[test]
    fn test_update_and_delete_missing() {
        let (_, service) = service();
        assert!(matches!(
            service.update_policy(UpdatePolicyCmd {
                policy_id: "missing".to_string(),
                description: String::new(),
            }),
            Err(PolicyError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_policy(DeletePolicyCmd {
                policy_id: "missing".to_string(),
            }),
            Err(PolicyError::NotFound(_))
        ));
    }

    /// Deletes every policy it hands out, as if a concurrent delete landed
    /// between the read and the write of an update
    struct DeleteAfterRead(InMemoryPolicyStore);

    impl PolicyStore for DeleteAfterRead {
        fn find_by_profile_and_subjects(
            &self,
            profile_id: &ProfileId,
            subjects: &BTreeSet<Subject>,
        ) -> Result<Vec<PermissionPolicy>> {
            self.0.find_by_profile_and_subjects(profile_id, subjects)
        }

        fn find_by_profile(&self, profile_id: &ProfileId) -> Result<Vec<PermissionPolicy>> {
            self.0.find_by_profile(profile_id)
        }

        fn find_by_subject(
            &self,
            profile_id: &ProfileId,
            subject: &Subject,
        ) -> Result<Vec<PermissionPolicy>> {
            self.0.find_by_subject(profile_id, subject)
        }

        fn find_by_id(&self, policy_id: &str) -> Result<Option<PermissionPolicy>> {
            let found = self.0.find_by_id(policy_id)?;
            if found.is_some() {
                self.0.delete_by_id(policy_id)?;
            }
            Ok(found)
        }

        fn save(&self, policy: PermissionPolicy) -> Result<()> {
            self.0.save(policy)
        }

        fn update(&self, policy: PermissionPolicy) -> Result<()> {
            self.0.update(policy)
        }

        fn delete_by_id(&self, policy_id: &str) -> Result<()> {
            self.0.delete_by_id(policy_id)
        }
    }

    #[test]
    fn test_update_does_not_resurrect_deleted_policy() {
        let store = Arc::new(DeleteAfterRead(InMemoryPolicyStore::new()));
        let engine = Arc::new(AuthorizationEngine::new(
            store.clone(),
            Arc::new(InMemoryGroupLookup::new()),
        ));
        let service = PolicyService::new(store.clone(), engine);
        let created = service.create_policy(create_cmd("user:u1", "service.create")).unwrap();

        let result = service.update_policy(UpdatePolicyCmd {
            policy_id: created.id.clone(),
            description: "revised".to_string(),
        });

        assert!(matches!(result, Err(PolicyError::NotFound(ref id)) if *id == created.id));
        assert!(store.0.is_empty());
    }

    #[test]
    fn test_system_policies_are_immutable() {
        let (store, service) = service();
        service.create_policy(create_cmd("user:u1", "service.create")).unwrap();

        let update = service.update_policy(UpdatePolicyCmd {
            policy_id: "system:role:SERVICE_ADMIN:all".to_string(),
            description: "now mine".to_string(),
        });
        assert!(matches!(update, Err(PolicyError::ImmutablePolicy(_))));

        let delete = service.delete_policy(DeletePolicyCmd {
            policy_id: "system:role:READER:view".to_string(),
        });
        assert!(matches!(delete, Err(PolicyError::ImmutablePolicy(_))));

        assert_eq!(store.len(), 1);
        let reader = service.get_policy("system:role:READER:view").unwrap().unwrap();
        assert_eq!(reader.description, "Reader can view all resources");
    }

    #[test]
    fn test_delete_removes() {
        let (store, service) = service();
        let created = service.create_policy(create_cmd("user:u1", "service.create")).unwrap();

        service
            .delete_policy(DeletePolicyCmd {
                policy_id: created.id.clone(),
            })
            .unwrap();

        assert!(store.is_empty());
        assert!(service.get_policy(&created.id).unwrap().is_none());
    }

    #[test]
    fn test_queries() {
        let (_, service) = service();
        service.create_policy(create_cmd("user:u1", "service.create")).unwrap();
        service.create_policy(create_cmd("user:u2", "service.create")).unwrap();
        service.create_policy(create_cmd("role:READER", "reports.export")).unwrap();

        let profile = ProfileId::new("profile-1");
        assert_eq!(service.list_policies_by_profile(&profile).unwrap().len(), 3);
        assert_eq!(service.list_policies_by_subject(&profile, "user:u2").unwrap().len(), 1);
        assert!(service.list_policies_by_subject(&profile, "bogus").is_err());

        let effective = service
            .effective_permissions(&profile, &UserId::new("u1"), &["READER"])
            .unwrap();
        // READER system policy, role:READER custom, user:u1 custom
        assert_eq!(effective.len(), 3);
        assert_eq!(effective.iter().filter(|p| p.is_system).count(), 1);
    }

    #[test]
    fn test_check_authorization() {
        let (_, service) = service();
        let request = AuthorizationRequest {
            profile_id: ProfileId::new("profile-1"),
            user_id: UserId::new("u1"),
            roles: vec!["APPROVER".to_string()],
            action: "invoice.approve".to_string(),
            resource_id: None,
        };

        let result = service.check_authorization(&request).unwrap();
        assert!(result.allowed);
        assert_eq!(result.effective_effect, Some(Effect::Allow));

        let json = serde_json::to_value(AuthorizationResult {
            allowed: false,
            reason: "no matching policy found".to_string(),
            effective_effect: None,
        })
        .unwrap();
        assert!(json["effectiveEffect"].is_null());

        let bad = AuthorizationRequest {
            action: "NOT AN ACTION".to_string(),
            ..request
        };
        assert!(matches!(service.check_authorization(&bad), Err(PolicyError::InvalidAction(_))));
    }

    #[test]
    fn test_events_emitted() {
        let (tx, rx) = events::channel();
        let (_, service) = service();
        let service = service.with_events(tx);

        let created = service.create_policy(create_cmd("user:u1", "service.create")).unwrap();
        service
            .update_policy(UpdatePolicyCmd {
                policy_id: created.id.clone(),
                description: "x".to_string(),
            })
            .unwrap();
        service
            .delete_policy(DeletePolicyCmd {
                policy_id: created.id.clone(),
            })
            .unwrap();

        let received: Vec<PolicyEvent> = rx.try_iter().collect();
        assert_eq!(received.len(), 3);
        assert!(matches!(received[0], PolicyEvent::Created { .. }));
        assert!(matches!(received[1], PolicyEvent::Updated { .. }));
        assert!(matches!(received[2], PolicyEvent::Deleted { .. }));
        assert!(received.iter().all(|e| e.policy_id() == created.id));
    }

    #[test]
    fn test_rejected_commands_emit_nothing() {
        let (tx, rx) = events::channel();
        let (_, service) = service();
        let service = service.with_events(tx);

        let _ = service.delete_policy(DeletePolicyCmd {
            policy_id: "system:role:CREATOR:create".to_string(),
        });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dto_json_shape() {
        let (_, service) = service();
        let dto = service.create_policy(create_cmd("role:READER", "reports.export")).unwrap();
        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["subjectUrn"], "role:READER");
        assert_eq!(json["actionPattern"], "reports.export");
        assert_eq!(json["resourcePattern"], "*");
        assert_eq!(json["effect"], "ALLOW");
        assert_eq!(json["isSystem"], false);
        assert_eq!(json["profileId"], "profile-1");
    }
}
