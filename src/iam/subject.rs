//! Policy subjects: users, roles and groups

use super::{GroupId, UserId};
use crate::error::{PolicyError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ROLE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid role name regex"));

/// Kind of principal a subject refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    User,
    Role,
    Group,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::User => "user",
            SubjectKind::Role => "role",
            SubjectKind::Group => "group",
        }
    }
}

/// Principal a policy applies to
///
/// Textual form is `<kind>:<identifier>`, e.g. `user:abc123`, `role:READER`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Subject {
    User(UserId),
    Role(String),
    Group(GroupId),
}

impl Subject {
    pub fn user(id: impl Into<UserId>) -> Self {
        Subject::User(id.into())
    }

    pub fn role(name: impl Into<String>) -> Self {
        Subject::Role(name.into())
    }

    pub fn group(id: impl Into<GroupId>) -> Self {
        Subject::Group(id.into())
    }

    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::User(_) => SubjectKind::User,
            Subject::Role(_) => SubjectKind::Role,
            Subject::Group(_) => SubjectKind::Group,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Subject::User(id) => id.as_str(),
            Subject::Role(name) => name,
            Subject::Group(id) => id.as_str(),
        }
    }

    /// Parse `user:<id>`, `group:<id>` or `role:<NAME>`
    ///
    /// The kind prefix is case-insensitive. Role names must be upper snake
    /// case.
    ///
    /// # Examples
    ///
    /// ```
    /// use permission_engine::iam::Subject;
    ///
    /// let subject = Subject::from_urn("role:READER").unwrap();
    /// assert_eq!(subject, Subject::role("READER"));
    /// assert_eq!(subject.to_urn(), "role:READER");
    ///
    /// assert!(Subject::from_urn("team:42").is_err());
    /// assert!(Subject::from_urn("role:reader").is_err());
    /// ```
    pub fn from_urn(urn: &str) -> Result<Self> {
        let (kind, identifier) = urn
            .split_once(':')
            .ok_or_else(|| PolicyError::InvalidSubject(format!("missing kind prefix: {}", urn)))?;

        if identifier.trim().is_empty() {
            return Err(PolicyError::InvalidSubject(format!(
                "subject identifier cannot be blank: {}",
                urn
            )));
        }

        match kind.to_lowercase().as_str() {
            "user" => Ok(Subject::user(identifier)),
            "group" => Ok(Subject::group(identifier)),
            "role" => {
                if !ROLE_NAME_REGEX.is_match(identifier) {
                    return Err(PolicyError::InvalidSubject(format!(
                        "invalid role name: {}",
                        identifier
                    )));
                }
                Ok(Subject::role(identifier))
            }
            other => Err(PolicyError::InvalidSubject(format!(
                "unknown subject type: {}",
                other
            ))),
        }
    }

    pub fn to_urn(&self) -> String {
        format!("{}:{}", self.kind().as_str(), self.identifier())
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.identifier())
    }
}

impl FromStr for Subject {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        Subject::from_urn(s)
    }
}

impl TryFrom<String> for Subject {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self> {
        Subject::from_urn(&value)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.to_urn()
    }
}
