/// Request-path utilities shared by route matching and middleware globs
///
/// All functions are pure: same input, same output, no allocation beyond the
/// returned segment list.

pub mod glob;
pub mod hierarchy;

pub use glob::PathGlob;
pub use hierarchy::Ancestry;

/// Splits a request path into segments
///
/// The leading `/` and a single trailing `/` are ignored. Interior empty
/// segments are kept so that `/a//b` never silently matches `/a/b`.
///
/// # Examples
///
/// ```
/// use rhtmx_router::path::split_path;
///
/// assert_eq!(split_path("/"), Vec::<&str>::new());
/// assert_eq!(split_path("/users/42/"), vec!["users", "42"]);
/// assert_eq!(split_path("/a//b"), vec!["a", "", "b"]);
/// ```
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Compares two static segments, optionally ignoring ASCII case
pub(crate) fn segment_eq(expected: &str, actual: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        expected.eq_ignore_ascii_case(actual)
    } else {
        expected == actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_root_variants() {
        assert!(split_path("").is_empty());
        assert!(split_path("/").is_empty());
    }

    #[test]
    fn test_split_ignores_only_one_trailing_slash() {
        assert_eq!(split_path("/blog/"), vec!["blog"]);
        assert_eq!(split_path("/blog//"), vec!["blog", ""]);
    }

    #[test]
    fn test_segment_eq_case() {
        assert!(segment_eq("About", "about", true));
        assert!(!segment_eq("About", "about", false));
    }
}
