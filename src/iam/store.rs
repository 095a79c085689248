//! Collaborator ports for the authorization engine
//!
//! [`PolicyStore`] persists custom policies and [`GroupLookup`] resolves group
//! memberships. Both are implemented outside the engine; in-memory versions
//! are provided for embedding and tests.

use super::{GroupId, PermissionPolicy, ProfileId, Subject, UserId};
use crate::error::{PolicyError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Storage for custom (non-system) policies
pub trait PolicyStore: Send + Sync {
    /// All custom policies in a profile whose subject is one of `subjects`
    fn find_by_profile_and_subjects(
        &self,
        profile_id: &ProfileId,
        subjects: &BTreeSet<Subject>,
    ) -> Result<Vec<PermissionPolicy>>;

    fn find_by_profile(&self, profile_id: &ProfileId) -> Result<Vec<PermissionPolicy>>;

    fn find_by_subject(
        &self,
        profile_id: &ProfileId,
        subject: &Subject,
    ) -> Result<Vec<PermissionPolicy>>;

    fn find_by_id(&self, policy_id: &str) -> Result<Option<PermissionPolicy>>;

    fn exists_by_id(&self, policy_id: &str) -> Result<bool> {
        Ok(self.find_by_id(policy_id)?.is_some())
    }

    /// Insert or replace a policy by id
    fn save(&self, policy: PermissionPolicy) -> Result<()>;

    /// Replace an existing policy; `NotFound` if its id is not stored
    ///
    /// Must check and write atomically so a concurrent delete is never undone.
    fn update(&self, policy: PermissionPolicy) -> Result<()>;

    fn delete_by_id(&self, policy_id: &str) -> Result<()>;
}

/// Resolves a user's current group memberships
pub trait GroupLookup: Send + Sync {
    fn groups_for_user(&self, user_id: &UserId) -> Result<BTreeSet<GroupId>>;
}

/// Thread-safe in-memory policy store
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    policies: RwLock<BTreeMap<String, PermissionPolicy>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }

    fn select(&self, predicate: impl Fn(&PermissionPolicy) -> bool) -> Vec<PermissionPolicy> {
        self.policies
            .read()
            .values()
            .filter(|p| predicate(p))
            .cloned()
            .collect()
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn find_by_profile_and_subjects(
        &self,
        profile_id: &ProfileId,
        subjects: &BTreeSet<Subject>,
    ) -> Result<Vec<PermissionPolicy>> {
        Ok(self.select(|p| {
            p.profile_id() == Some(profile_id) && subjects.contains(p.subject())
        }))
    }

    fn find_by_profile(&self, profile_id: &ProfileId) -> Result<Vec<PermissionPolicy>> {
        Ok(self.select(|p| p.profile_id() == Some(profile_id)))
    }

    fn find_by_subject(
        &self,
        profile_id: &ProfileId,
        subject: &Subject,
    ) -> Result<Vec<PermissionPolicy>> {
        Ok(self.select(|p| p.profile_id() == Some(profile_id) && p.applies_to(subject)))
    }

    fn find_by_id(&self, policy_id: &str) -> Result<Option<PermissionPolicy>> {
        Ok(self.policies.read().get(policy_id).cloned())
    }

    fn save(&self, policy: PermissionPolicy) -> Result<()> {
        // System policies live in the role table, never in storage
        policy.ensure_mutable()?;
        self.policies.write().insert(policy.id().to_string(), policy);
        Ok(())
    }

    fn update(&self, policy: PermissionPolicy) -> Result<()> {
        policy.ensure_mutable()?;
        let mut policies = self.policies.write();
        match policies.get_mut(policy.id()) {
            Some(stored) => {
                *stored = policy;
                Ok(())
            }
            None => Err(PolicyError::NotFound(policy.id().to_string())),
        }
    }

    fn delete_by_id(&self, policy_id: &str) -> Result<()> {
        match self.policies.write().remove(policy_id) {
            Some(_) => Ok(()),
            None => Err(PolicyError::NotFound(policy_id.to_string())),
        }
    }
}

/// In-memory user → groups map
#[derive(Debug, Default)]
pub struct InMemoryGroupLookup {
    memberships: RwLock<HashMap<UserId, BTreeSet<GroupId>>>,
}

impl InMemoryGroupLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(memberships: HashMap<UserId, BTreeSet<GroupId>>) -> Self {
        InMemoryGroupLookup {
            memberships: RwLock::new(memberships),
        }
    }

    pub fn add_member(&self, user_id: impl Into<UserId>, group_id: impl Into<GroupId>) {
        self.memberships
            .write()
            .entry(user_id.into())
            .or_default()
            .insert(group_id.into());
    }

    pub fn remove_member(&self, user_id: &UserId, group_id: &GroupId) {
        if let Some(groups) = self.memberships.write().get_mut(user_id) {
            groups.remove(group_id);
        }
    }
}

impl GroupLookup for InMemoryGroupLookup {
    fn groups_for_user(&self, user_id: &UserId) -> Result<BTreeSet<GroupId>> {
        Ok(self
            .memberships
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::{Action, Effect, NewPolicy, PredefinedRole, Resource};

    fn policy(profile: &str, subject: Subject) -> PermissionPolicy {
        PermissionPolicy::create(NewPolicy {
            profile_id: ProfileId::new(profile),
            subject,
            action: Action::parse("service.create").unwrap(),
            resource: Resource::all(),
            effect: Effect::Allow,
            description: String::new(),
            created_by: "admin".to_string(),
        })
    }

    #[test]
    fn test_find_by_profile_and_subjects() {
        let store = InMemoryPolicyStore::new();
        store.save(policy("p1", Subject::user("u1"))).unwrap();
        store.save(policy("p1", Subject::group("g1"))).unwrap();
        store.save(policy("p1", Subject::user("u2"))).unwrap();
        store.save(policy("p2", Subject::user("u1"))).unwrap();

        let subjects: BTreeSet<_> = [Subject::user("u1"), Subject::group("g1")].into();
        let found = store
            .find_by_profile_and_subjects(&ProfileId::new("p1"), &subjects)
            .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.profile_id() == Some(&ProfileId::new("p1"))));
    }

    #[test]
    fn test_profile_and_subject_queries() {
        let store = InMemoryPolicyStore::new();
        store.save(policy("p1", Subject::user("u1"))).unwrap();
        store.save(policy("p1", Subject::user("u2"))).unwrap();

        let p1 = ProfileId::new("p1");
        assert_eq!(store.find_by_profile(&p1).unwrap().len(), 2);
        assert_eq!(store.find_by_subject(&p1, &Subject::user("u2")).unwrap().len(), 1);
        assert!(store.find_by_profile(&ProfileId::new("p9")).unwrap().is_empty());
    }

    #[test]
    fn test_save_replaces_and_delete() {
        let store = InMemoryPolicyStore::new();
        let mut p = policy("p1", Subject::user("u1"));
        store.save(p.clone()).unwrap();

        p.revise_description("changed").unwrap();
        store.save(p.clone()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_id(p.id()).unwrap().unwrap().description(), "changed");

        assert!(store.exists_by_id(p.id()).unwrap());
        store.delete_by_id(p.id()).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.delete_by_id(p.id()), Err(PolicyError::NotFound(_))));
    }

    #[test]
    fn test_update_replaces_only_existing() {
        let store = InMemoryPolicyStore::new();
        let mut p = policy("p1", Subject::user("u1"));
        assert!(matches!(store.update(p.clone()), Err(PolicyError::NotFound(_))));
        assert!(store.is_empty());

        store.save(p.clone()).unwrap();
        p.revise_description("changed").unwrap();
        store.update(p.clone()).unwrap();
        assert_eq!(store.find_by_id(p.id()).unwrap().unwrap().description(), "changed");

        store.delete_by_id(p.id()).unwrap();
        assert!(matches!(store.update(p), Err(PolicyError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_refuses_system_policies() {
        let store = InMemoryPolicyStore::new();
        let system = PredefinedRole::Reader.policies().remove(0);
        assert!(matches!(store.save(system), Err(PolicyError::ImmutablePolicy(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_group_lookup() {
        let groups = InMemoryGroupLookup::new();
        groups.add_member("u1", "g1");
        groups.add_member("u1", "g2");

        let u1 = UserId::new("u1");
        assert_eq!(groups.groups_for_user(&u1).unwrap().len(), 2);
        assert!(groups.groups_for_user(&UserId::new("u2")).unwrap().is_empty());

        groups.remove_member(&u1, &GroupId::new("g1"));
        assert_eq!(
            groups.groups_for_user(&u1).unwrap(),
            BTreeSet::from([GroupId::new("g2")])
        );
    }
}
