/// Prefix/wildcard globs used by middleware matchers
///
/// A glob is a static path that may end in `*`:
/// - `/health` matches exactly `/health` (a trailing slash is ignored)
/// - `/api/*` matches `/api` and everything below it
/// - `/api/v*` matches any first segment under `/api` starting with `v`, and everything below it
///
/// Globs reuse the same segment splitting as route matching, so `/api/*`
/// never matches `/apiary`.

use std::fmt;

use super::{segment_eq, split_path};
use crate::error::{PatternIssue, RouteError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum GlobSegment {
    Literal(String),
    /// `foo*`: one segment starting with the prefix, then anything
    Prefix(String),
    /// `*`: zero or more remaining segments
    Rest,
}

/// A compiled middleware path glob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGlob {
    raw: String,
    segments: Vec<GlobSegment>,
}

impl PathGlob {
    /// Parses a glob, rejecting dynamic segments and interior wildcards
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::PathGlob;
    ///
    /// let glob = PathGlob::parse("/api/*").unwrap();
    /// assert!(glob.matches("/api", false));
    /// assert!(glob.matches("/api/users/7", false));
    /// assert!(!glob.matches("/pages/home", false));
    /// ```
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let fail = |issue| RouteError::InvalidGlob {
            glob: raw.to_string(),
            issue,
        };

        if !raw.starts_with('/') {
            return Err(fail(PatternIssue::MissingLeadingSlash));
        }

        let parts = split_path(raw);
        let last = parts.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(parts.len());

        for (index, part) in parts.iter().enumerate() {
            if part.is_empty() {
                return Err(fail(PatternIssue::EmptySegment));
            }
            if part.contains('[') || part.contains(']') {
                return Err(fail(PatternIssue::DynamicInGlob(part.to_string())));
            }

            let segment = match part.strip_suffix('*') {
                Some(prefix) if index == last => {
                    if prefix.contains('*') {
                        return Err(fail(PatternIssue::MisplacedWildcard));
                    }
                    if prefix.is_empty() {
                        GlobSegment::Rest
                    } else {
                        GlobSegment::Prefix(prefix.to_string())
                    }
                }
                _ if part.contains('*') => return Err(fail(PatternIssue::MisplacedWildcard)),
                _ => GlobSegment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The glob as declared
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Tests a request path against this glob
    pub fn matches(&self, path: &str, case_insensitive: bool) -> bool {
        let parts = split_path(path);
        let mut parts_iter = parts.iter();

        for segment in &self.segments {
            match segment {
                GlobSegment::Rest => return true,
                GlobSegment::Prefix(prefix) => {
                    return parts_iter.next().is_some_and(|part| {
                        part.len() >= prefix.len()
                            && part.is_char_boundary(prefix.len())
                            && segment_eq(prefix, &part[..prefix.len()], case_insensitive)
                    });
                }
                GlobSegment::Literal(expected) => match parts_iter.next() {
                    Some(part) if segment_eq(expected, part, case_insensitive) => {}
                    _ => return false,
                },
            }
        }

        parts_iter.next().is_none()
    }
}

impl fmt::Display for PathGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/api/*", "/api", true)]
    #[case("/api/*", "/api/", true)]
    #[case("/api/*", "/api/users/7", true)]
    #[case("/api/*", "/apiary", false)]
    #[case("/api/*", "/pages/home", false)]
    #[case("/health", "/health/", true)]
    #[case("/health", "/health/deep", false)]
    #[case("/api/v*", "/api/v2/users", true)]
    #[case("/api/v*", "/api/users", false)]
    #[case("/*", "/", true)]
    #[case("/*", "/anything/at/all", true)]
    #[case("/", "/", true)]
    #[case("/", "/about", false)]
    fn test_glob_matching(#[case] glob: &str, #[case] path: &str, #[case] expected: bool) {
        let glob = PathGlob::parse(glob).unwrap();
        assert_eq!(glob.matches(path, false), expected, "{glob} vs {path}");
    }

    #[test]
    fn test_case_insensitive_glob() {
        let glob = PathGlob::parse("/Admin/*").unwrap();
        assert!(glob.matches("/admin/users", true));
        assert!(!glob.matches("/admin/users", false));
    }

    #[rstest]
    #[case("api/*", PatternIssue::MissingLeadingSlash)]
    #[case("/a/*/b", PatternIssue::MisplacedWildcard)]
    #[case("/a/**", PatternIssue::MisplacedWildcard)]
    #[case("/users/[id]", PatternIssue::DynamicInGlob("[id]".to_string()))]
    fn test_invalid_globs(#[case] glob: &str, #[case] issue: PatternIssue) {
        let err = PathGlob::parse(glob).unwrap_err();
        assert_eq!(
            err,
            RouteError::InvalidGlob {
                glob: glob.to_string(),
                issue,
            }
        );
    }
}
