//! Pattern matching for actions and resources
//!
//! Patterns are dot-segmented. A `*` segment is a wildcard:
//! - `*` alone matches any value
//! - trailing `*` (e.g. `security.*`) matches one or more remaining segments
//! - any other `*` (e.g. `*.create`) matches exactly one segment, and the
//!   pattern and value must have the same number of segments

/// Pattern matcher for dot-segmented actions and resources
pub struct PatternMatcher;

impl PatternMatcher {
    /// Segment separator
    pub const SEPARATOR: char = '.';

    /// Wildcard segment
    pub const WILDCARD: &'static str = "*";

    /// Check if a concrete value matches a pattern
    ///
    /// # Examples
    /// ```
    /// use permission_engine::iam::PatternMatcher;
    ///
    /// assert!(PatternMatcher::matches("security.*", "security.admin.manage"));
    /// assert!(PatternMatcher::matches("*.create", "service.create"));
    /// assert!(!PatternMatcher::matches("*.create", "service.sub.create"));
    /// ```
    pub fn matches(pattern: &str, value: &str) -> bool {
        if pattern == Self::WILDCARD {
            return true;
        }

        let pattern_parts: Vec<&str> = pattern.split(Self::SEPARATOR).collect();
        let value_parts: Vec<&str> = value.split(Self::SEPARATOR).collect();

        Self::match_parts(&pattern_parts, &value_parts)
    }

    /// Match split pattern parts against split value parts
    fn match_parts(pattern: &[&str], value: &[&str]) -> bool {
        let Some((&last, head)) = pattern.split_last() else {
            return false;
        };

        // A non-terminal wildcard pins the segment count
        let inner_wildcard = head.iter().any(|&p| p == Self::WILDCARD);
        let trailing_wildcard = last == Self::WILDCARD && !inner_wildcard;

        if trailing_wildcard {
            // Prefix must match, then at least one non-empty segment left for the `*`
            if value.len() < pattern.len() {
                return false;
            }
            let (prefix, rest) = value.split_at(head.len());
            return Self::match_segments(head, prefix) && rest.iter().any(|s| !s.is_empty());
        }

        if value.len() != pattern.len() {
            return false;
        }

        Self::match_segments(pattern, value)
    }

    /// Pairwise segment comparison over equal-length slices
    ///
    /// A wildcard never stands for an empty segment.
    fn match_segments(pattern: &[&str], value: &[&str]) -> bool {
        pattern
            .iter()
            .zip(value.iter())
            .all(|(&p, &v)| (p == Self::WILDCARD && !v.is_empty()) || p == v)
    }

    /// True when the pattern contains no wildcard segment
    pub fn is_literal(pattern: &str) -> bool {
        !pattern
            .split(Self::SEPARATOR)
            .any(|segment| segment == Self::WILDCARD)
    }
}
