//! Identifier and pattern value types
//!
//! `Action` and `Resource` carry dot-segmented patterns (for policies) or
//! concrete values (for requests). Matching lives in [`PatternMatcher`].

use super::PatternMatcher;
use crate::error::{PolicyError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Lowercase segments or `*`, joined by dots
static ACTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|[a-z][a-z0-9-]*)(\.([a-z][a-z0-9-]*|\*))*$").expect("valid action regex")
});

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                $name(id)
            }
        }
    };
}

string_id!(
    /// Tenant boundary for custom policies and evaluation requests
    ProfileId
);
string_id!(
    /// Opaque user identifier
    UserId
);
string_id!(
    /// Opaque group identifier
    GroupId
);

/// Hierarchical action, e.g. `payments.ach.create`, `*.view` or `*`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action(String);

impl Action {
    /// Parse and validate an action pattern or value
    ///
    /// # Examples
    ///
    /// ```
    /// use permission_engine::iam::Action;
    ///
    /// assert!(Action::parse("service.create").is_ok());
    /// assert!(Action::parse("*.view").is_ok());
    /// assert!(Action::parse("Service.Create").is_err());
    /// assert!(Action::parse("").is_err());
    /// ```
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(PolicyError::InvalidAction("action cannot be blank".to_string()));
        }

        if !ACTION_REGEX.is_match(&value) {
            return Err(PolicyError::InvalidAction(value));
        }

        Ok(Action(value))
    }

    /// The universal pattern `*`
    pub fn all() -> Self {
        Action("*".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this pattern matches a concrete action
    pub fn matches(&self, action: &Action) -> bool {
        PatternMatcher::matches(&self.0, &action.0)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Action {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        Action::parse(s)
    }
}

impl TryFrom<String> for Action {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self> {
        Action::parse(value)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.0
    }
}

/// Resource pattern a policy applies to
///
/// Holds one pattern or a comma-separated list of alternatives. Each
/// alternative uses the same segment grammar as [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resource(String);

impl Resource {
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::InvalidResource(
                "resource cannot be blank".to_string(),
            ));
        }
        if trimmed.split(',').any(|p| p.trim().is_empty()) {
            return Err(PolicyError::InvalidResource(format!(
                "empty alternative in '{}'",
                trimmed
            )));
        }
        Ok(Resource(trimmed.to_string()))
    }

    /// The universal pattern `*`
    pub fn all() -> Self {
        Resource("*".to_string())
    }

    /// Join several patterns into one alternative list
    pub fn of_list<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let joined = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .collect::<Vec<_>>()
            .join(",");
        Resource::parse(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_all(&self) -> bool {
        self.0 == "*"
    }

    /// Individual alternatives, trimmed
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').map(str::trim)
    }

    /// Check if any alternative matches a concrete resource id
    pub fn matches(&self, resource_id: &str) -> bool {
        self.is_all()
            || self
                .patterns()
                .any(|pattern| PatternMatcher::matches(pattern, resource_id))
    }
}

impl Default for Resource {
    fn default() -> Self {
        Resource::all()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Resource {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        Resource::parse(s)
    }
}

impl TryFrom<String> for Resource {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self> {
        Resource::parse(value)
    }
}

impl From<Resource> for String {
    fn from(resource: Resource) -> Self {
        resource.0
    }
}
