//! Policy lifecycle events
//!
//! Emitted by [`crate::service::PolicyService`] after a successful write.

use crate::iam::ProfileId;
use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, Sender};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PolicyEvent {
    #[serde(rename_all = "camelCase")]
    Created {
        policy_id: String,
        profile_id: ProfileId,
        subject_urn: String,
        created_by: String,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Updated {
        policy_id: String,
        profile_id: ProfileId,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Deleted {
        policy_id: String,
        profile_id: ProfileId,
        at: DateTime<Utc>,
    },
}

impl PolicyEvent {
    pub fn policy_id(&self) -> &str {
        match self {
            PolicyEvent::Created { policy_id, .. }
            | PolicyEvent::Updated { policy_id, .. }
            | PolicyEvent::Deleted { policy_id, .. } => policy_id,
        }
    }

    pub fn profile_id(&self) -> &ProfileId {
        match self {
            PolicyEvent::Created { profile_id, .. }
            | PolicyEvent::Updated { profile_id, .. }
            | PolicyEvent::Deleted { profile_id, .. } => profile_id,
        }
    }
}

/// Unbounded channel for policy events
pub fn channel() -> (Sender<PolicyEvent>, Receiver<PolicyEvent>) {
    crossbeam::channel::unbounded()
}
