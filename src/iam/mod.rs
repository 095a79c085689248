//! Permission authorization for profiles
//!
//! Provides a policy decision point with:
//! - Users, roles and groups as policy subjects
//! - Built-in role policies plus tenant-scoped custom policies
//! - Dot-segmented wildcard patterns for actions and resources
//! - Allow/Deny effects with explicit deny precedence and default deny
//! - Optional LRU caching of custom-policy lookups

mod cache;
mod engine;
mod pattern;
mod policy;
mod role;
mod store;
mod subject;
mod types;

pub use cache::PolicyCache;
pub use engine::{AuthorizationEngine, Decision, REASON_DENIED, REASON_GRANTED, REASON_NO_MATCH};
pub use pattern::PatternMatcher;
pub use policy::{Effect, NewPolicy, PermissionPolicy, SYSTEM_ACTOR};
pub use role::{PredefinedRole, RoleGrant};
pub use store::{GroupLookup, InMemoryGroupLookup, InMemoryPolicyStore, PolicyStore};
pub use subject::{Subject, SubjectKind};
pub use types::{Action, GroupId, ProfileId, Resource, UserId};
