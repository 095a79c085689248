//! # Permission Engine - Policy Decision Point for Profile-Scoped Access
//!
//! `permission-engine` answers "may subject S perform action A on resource R
//! within profile P?" by combining:
//!
//! - **Built-in role policies** (`SERVICE_ADMIN`, `SECURITY_ADMIN`, `READER`,
//!   `CREATOR`, `APPROVER`) from a static table
//! - **Custom policies** scoped to a profile and stored behind [`iam::PolicyStore`]
//! - **Group memberships** resolved through [`iam::GroupLookup`]
//!
//! Deny overrides allow, and no matching policy means deny.
//!
//! ## Quick Start
//!
//! ```rust
//! use permission_engine::iam::{
//!     Action, AuthorizationEngine, Effect, InMemoryGroupLookup, InMemoryPolicyStore,
//!     ProfileId, UserId,
//! };
//! use permission_engine::service::{CreatePolicyCmd, PolicyService};
//! use std::sync::Arc;
//!
//! # fn main() -> permission_engine::Result<()> {
//! let store = Arc::new(InMemoryPolicyStore::new());
//! let engine = Arc::new(AuthorizationEngine::new(
//!     store.clone(),
//!     Arc::new(InMemoryGroupLookup::new()),
//! ));
//! let service = PolicyService::new(store, engine.clone());
//!
//! // Service admins may do anything, except what a custom DENY forbids
//! service.create_policy(CreatePolicyCmd {
//!     profile_id: ProfileId::new("acme"),
//!     subject_urn: "user:alice".to_string(),
//!     action_pattern: "payments.wire.release".to_string(),
//!     resource_pattern: None,
//!     effect: Some("DENY".to_string()),
//!     description: "Alice may not release wires".to_string(),
//!     created_by: "security-officer".to_string(),
//! })?;
//!
//! let decision = engine.check_action(
//!     &ProfileId::new("acme"),
//!     &UserId::new("alice"),
//!     &["SERVICE_ADMIN"],
//!     &Action::parse("payments.wire.release")?,
//! )?;
//!
//! assert!(!decision.allowed);
//! assert_eq!(decision.effective_effect, Some(Effect::Deny));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod iam;
pub mod service;

pub use crate::config::EngineConfig;
pub use crate::error::{PolicyError, Result};
pub use crate::iam::{AuthorizationEngine, Decision, Effect, PermissionPolicy};
