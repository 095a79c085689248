//! Authorization engine with deny precedence
//!
//! Answers "may this user perform this action on this resource in this
//! profile?". Key features:
//! - Subject set built from the user, their roles and their groups
//! - System policies from the predefined role table plus custom policies
//!   from the [`PolicyStore`]
//! - Explicit deny takes precedence over allow
//! - No matching policy means deny

use super::{
    Action, Effect, GroupLookup, PermissionPolicy, PolicyCache, PolicyStore, PredefinedRole,
    ProfileId, Subject, UserId,
};
use crate::config::EngineConfig;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const REASON_GRANTED: &str = "permission granted";
pub const REASON_DENIED: &str = "action denied by explicit policy";
pub const REASON_NO_MATCH: &str = "no matching policy found";

/// Outcome of a permission check
///
/// A denial is a normal value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
    /// Every matched policy, both effects, in evaluation order
    pub matching_policies: Vec<PermissionPolicy>,
    /// `None` when nothing matched
    pub effective_effect: Option<Effect>,
}

impl Decision {
    fn allowed(policies: Vec<PermissionPolicy>) -> Self {
        Decision {
            allowed: true,
            reason: REASON_GRANTED.to_string(),
            matching_policies: policies,
            effective_effect: Some(Effect::Allow),
        }
    }

    fn denied(policies: Vec<PermissionPolicy>) -> Self {
        Decision {
            allowed: false,
            reason: REASON_DENIED.to_string(),
            matching_policies: policies,
            effective_effect: Some(Effect::Deny),
        }
    }

    fn no_match() -> Self {
        Decision {
            allowed: false,
            reason: REASON_NO_MATCH.to_string(),
            matching_policies: Vec::new(),
            effective_effect: None,
        }
    }

    /// Matched policies that carry a DENY
    pub fn deny_policies(&self) -> impl Iterator<Item = &PermissionPolicy> {
        self.matching_policies
            .iter()
            .filter(|p| p.effect() == Effect::Deny)
    }
}

/// Policy decision point over injected stores
pub struct AuthorizationEngine {
    store: Arc<dyn PolicyStore>,
    groups: Arc<dyn GroupLookup>,
    cache: Option<PolicyCache>,
    log_decisions: bool,
}

impl AuthorizationEngine {
    /// Create an engine with default configuration (no cache)
    pub fn new(store: Arc<dyn PolicyStore>, groups: Arc<dyn GroupLookup>) -> Self {
        Self::with_config(store, groups, &EngineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn PolicyStore>,
        groups: Arc<dyn GroupLookup>,
        config: &EngineConfig,
    ) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| PolicyCache::new(config.cache.capacity));

        AuthorizationEngine {
            store,
            groups,
            cache,
            log_decisions: config.evaluation.log_decisions,
        }
    }

    /// Check if a user may perform an action on a resource
    ///
    /// `resource_id = None` or `Some("*")` skips the resource check, which is
    /// the same as asking about every resource.
    ///
    /// # Errors
    ///
    /// Only failures of the policy store or group lookup. A denial is
    /// returned as `Ok(decision)` with `allowed == false`.
    ///
    /// # Examples
    ///
    /// ```
    /// use permission_engine::iam::{
    ///     Action, AuthorizationEngine, InMemoryGroupLookup, InMemoryPolicyStore, ProfileId,
    ///     UserId,
    /// };
    /// use std::sync::Arc;
    ///
    /// let engine = AuthorizationEngine::new(
    ///     Arc::new(InMemoryPolicyStore::new()),
    ///     Arc::new(InMemoryGroupLookup::new()),
    /// );
    ///
    /// let decision = engine
    ///     .check_permission(
    ///         &ProfileId::new("profile-1"),
    ///         &UserId::new("alice"),
    ///         &["CREATOR"],
    ///         &Action::parse("service.create").unwrap(),
    ///         Some("account:123"),
    ///     )
    ///     .unwrap();
    /// assert!(decision.allowed);
    /// ```
    pub fn check_permission<R: AsRef<str>>(
        &self,
        profile_id: &ProfileId,
        user_id: &UserId,
        roles: &[R],
        action: &Action,
        resource_id: Option<&str>,
    ) -> Result<Decision> {
        let subjects = self.subject_set(user_id, roles)?;
        let candidates = self.candidate_policies(profile_id, roles, &subjects)?;
        let candidate_count = candidates.len();

        let matching: Vec<PermissionPolicy> = candidates
            .into_iter()
            .filter(|p| p.matches(action, resource_id))
            .collect();

        let decision = Self::decide(matching);

        if self.log_decisions {
            debug!(
                "Authorization {} for {} on '{}' (resource {:?}) in profile {}: {} subjects, {} candidates, {} matched -> {}",
                if decision.allowed { "granted" } else { "refused" },
                user_id,
                action,
                resource_id,
                profile_id,
                subjects.len(),
                candidate_count,
                decision.matching_policies.len(),
                decision.reason
            );
        }

        Ok(decision)
    }

    /// Check an action without a resource
    pub fn check_action<R: AsRef<str>>(
        &self,
        profile_id: &ProfileId,
        user_id: &UserId,
        roles: &[R],
        action: &Action,
    ) -> Result<Decision> {
        self.check_permission(profile_id, user_id, roles, action, None)
    }

    /// Every policy (system and custom) that could apply to the user
    pub fn effective_permissions<R: AsRef<str>>(
        &self,
        profile_id: &ProfileId,
        user_id: &UserId,
        roles: &[R],
    ) -> Result<Vec<PermissionPolicy>> {
        let subjects = self.subject_set(user_id, roles)?;
        self.candidate_policies(profile_id, roles, &subjects)
    }

    /// Distinct action patterns of the user's ALLOW policies
    ///
    /// This is a listing, not a decision: DENY policies are not subtracted.
    pub fn allowed_actions<R: AsRef<str>>(
        &self,
        profile_id: &ProfileId,
        user_id: &UserId,
        roles: &[R],
    ) -> Result<BTreeSet<String>> {
        Ok(self
            .effective_permissions(profile_id, user_id, roles)?
            .iter()
            .filter(|p| p.effect() == Effect::Allow)
            .map(|p| p.action().as_str().to_string())
            .collect())
    }

    /// Drop cached custom-policy lookups for a profile
    pub fn invalidate_profile(&self, profile_id: &ProfileId) {
        if let Some(cache) = &self.cache {
            cache.invalidate_profile(profile_id);
        }
    }

    pub fn cache(&self) -> Option<&PolicyCache> {
        self.cache.as_ref()
    }

    /// The user, each role and each group the user belongs to
    fn subject_set<R: AsRef<str>>(
        &self,
        user_id: &UserId,
        roles: &[R],
    ) -> Result<BTreeSet<Subject>> {
        let mut subjects = BTreeSet::new();
        subjects.insert(Subject::User(user_id.clone()));
        subjects.extend(roles.iter().map(|r| Subject::role(r.as_ref())));
        subjects.extend(
            self.groups
                .groups_for_user(user_id)?
                .into_iter()
                .map(Subject::Group),
        );
        Ok(subjects)
    }

    /// System policies for each distinct role, then custom policies
    fn candidate_policies<R: AsRef<str>>(
        &self,
        profile_id: &ProfileId,
        roles: &[R],
        subjects: &BTreeSet<Subject>,
    ) -> Result<Vec<PermissionPolicy>> {
        let role_names: BTreeSet<&str> = roles.iter().map(|r| r.as_ref()).collect();

        let mut policies: Vec<PermissionPolicy> = role_names
            .into_iter()
            .flat_map(PredefinedRole::policies_for_name)
            .collect();

        let custom = self.custom_policies(profile_id, subjects)?;
        policies.extend(
            custom
                .iter()
                .filter(|p| {
                    !p.is_system()
                        && p.profile_id() == Some(profile_id)
                        && p.applies_to_any(subjects)
                })
                .cloned(),
        );

        Ok(policies)
    }

    fn custom_policies(
        &self,
        profile_id: &ProfileId,
        subjects: &BTreeSet<Subject>,
    ) -> Result<Arc<Vec<PermissionPolicy>>> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(
                self.store.find_by_profile_and_subjects(profile_id, subjects)?,
            ));
        };

        if let Some(cached) = cache.get(profile_id, subjects) {
            return Ok(cached);
        }

        let generation = cache.generation();
        let found = Arc::new(self.store.find_by_profile_and_subjects(profile_id, subjects)?);
        cache.put(profile_id, subjects, Arc::clone(&found), generation);
        Ok(found)
    }

    /// Deny overrides allow; nothing matched means deny
    fn decide(matching: Vec<PermissionPolicy>) -> Decision {
        if matching.is_empty() {
            return Decision::no_match();
        }

        if matching.iter().any(|p| p.effect() == Effect::Deny) {
            return Decision::denied(matching);
        }

        Decision::allowed(matching)
    }
}

impl fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("cache_enabled", &self.cache.is_some())
            .field("log_decisions", &self.log_decisions)
            .finish()
    }
}
