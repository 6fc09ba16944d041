/// Pattern compilation for file-based route paths
///
/// Declared paths follow the file-system convention:
/// - `about` → static segment
/// - `[id]` → dynamic segment, binds exactly one non-empty path segment
/// - `[...slug]` → catch-all, must be last, binds one or more segments
///
/// Compilation is pure and happens once, when the route table is built.

use std::collections::HashSet;
use std::fmt;

use super::params::{ParamValue, Params};
use crate::error::{PatternIssue, RouteError};
use crate::path::{segment_eq, split_path};

/// Maximum number of segments in a compiled pattern
///
/// The precedence rank packs two bits per segment into a `u64`.
pub const MAX_SEGMENTS: usize = 32;

/// One typed segment of a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Static(String),
    Dynamic(String),
    CatchAll(String),
}

impl Segment {
    /// Parameter bound by this segment, if any
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Static(_) => None,
            Segment::Dynamic(name) | Segment::CatchAll(name) => Some(name),
        }
    }

    /// Per-position precedence weight: static < dynamic < catch-all
    fn weight(&self) -> u64 {
        match self {
            Segment::Static(_) => 0,
            Segment::Dynamic(_) => 1,
            Segment::CatchAll(_) => 2,
        }
    }
}

/// Classifies one declared segment
///
/// # Examples
///
/// ```
/// use rhtmx_router::{classify_segment, Segment};
///
/// assert_eq!(classify_segment("about"), Ok(Segment::Static("about".into())));
/// assert_eq!(classify_segment("[id]"), Ok(Segment::Dynamic("id".into())));
/// assert_eq!(classify_segment("[...slug]"), Ok(Segment::CatchAll("slug".into())));
/// assert!(classify_segment("[[...slug]]").is_err());
/// ```
pub fn classify_segment(segment: &str) -> Result<Segment, PatternIssue> {
    if segment.is_empty() {
        return Err(PatternIssue::EmptySegment);
    }

    if segment.starts_with("[[") {
        return Err(PatternIssue::OptionalCatchAll(segment.to_string()));
    }

    match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => {
            let (name, catch_all) = match inner.strip_prefix("...") {
                Some(name) => (name, true),
                None => (inner, false),
            };

            if !is_param_name(name) {
                return Err(PatternIssue::MalformedSegment(segment.to_string()));
            }

            Ok(if catch_all {
                Segment::CatchAll(name.to_string())
            } else {
                Segment::Dynamic(name.to_string())
            })
        }
        None if segment.contains(['[', ']']) => {
            Err(PatternIssue::MalformedSegment(segment.to_string()))
        }
        None => Ok(Segment::Static(segment.to_string())),
    }
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Structural identity of a pattern: static names plus segment kinds
///
/// Two patterns with equal shapes would match exactly the same paths, so a
/// table containing both is ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ShapeSegment {
    Static(String),
    Dynamic,
    CatchAll,
}

pub(crate) fn shape_of(segments: &[Segment], case_insensitive: bool) -> Vec<ShapeSegment> {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Static(name) if case_insensitive => {
                ShapeSegment::Static(name.to_ascii_lowercase())
            }
            Segment::Static(name) => ShapeSegment::Static(name.clone()),
            Segment::Dynamic(_) => ShapeSegment::Dynamic,
            Segment::CatchAll(_) => ShapeSegment::CatchAll,
        })
        .collect()
}

/// A compiled route path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw_path: String,
    segments: Vec<Segment>,
    precedence_rank: u64,
}

impl RoutePattern {
    /// Compiles a declared path such as `/users/[id]` or `/docs/[...slug]`
    ///
    /// Fails if a catch-all is not the final segment, if there is more than
    /// one catch-all, or if a parameter name repeats.
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::{RoutePattern, Segment};
    ///
    /// let pattern = RoutePattern::compile("/users/[id]").unwrap();
    /// assert_eq!(pattern.segments()[1], Segment::Dynamic("id".into()));
    ///
    /// assert!(RoutePattern::compile("/[...rest]/edit").is_err());
    /// assert!(RoutePattern::compile("/[id]/[id]").is_err());
    /// ```
    pub fn compile(raw_path: &str) -> Result<Self, RouteError> {
        if !raw_path.starts_with('/') {
            return Err(RouteError::invalid(raw_path, PatternIssue::MissingLeadingSlash));
        }

        let parts = split_path(raw_path);
        if parts.len() > MAX_SEGMENTS {
            return Err(RouteError::invalid(raw_path, PatternIssue::TooDeep));
        }

        let segments = parts
            .iter()
            .map(|part| classify_segment(part))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|issue| RouteError::invalid(raw_path, issue))?;

        validate_segments(&segments).map_err(|issue| RouteError::invalid(raw_path, issue))?;

        Ok(Self {
            raw_path: raw_path.to_string(),
            precedence_rank: rank_of(&segments),
            segments,
        })
    }

    /// The path exactly as declared
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Lower ranks are tried first
    ///
    /// Segments are weighted position by position (static 0, dynamic 1,
    /// catch-all 2) with the first segment most significant, so at the first
    /// position where two competing patterns differ the more static one wins.
    pub fn precedence_rank(&self) -> u64 {
        self.precedence_rank
    }

    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Static(_)))
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::param_name)
    }

    /// Matches already-split request segments against this pattern
    ///
    /// When `decode` is set, bound values are percent-decoded; a value that
    /// does not decode to UTF-8 is kept as received.
    pub fn match_segments(
        &self,
        parts: &[&str],
        case_insensitive: bool,
        decode: bool,
    ) -> Option<Params> {
        let bind = |raw: &str| {
            if decode {
                urlencoding::decode(raw)
                    .map(|value| value.into_owned())
                    .unwrap_or_else(|_| raw.to_string())
            } else {
                raw.to_string()
            }
        };

        let mut params = Params::new();
        let mut index = 0;

        for segment in &self.segments {
            match segment {
                Segment::CatchAll(name) => {
                    let rest = &parts[index.min(parts.len())..];
                    if rest.is_empty() || rest.iter().any(|part| part.is_empty()) {
                        return None;
                    }
                    let values = rest.iter().map(|part| bind(*part)).collect();
                    params.insert(name.clone(), ParamValue::Many(values));
                    return Some(params);
                }
                Segment::Dynamic(name) => {
                    let part = parts.get(index).filter(|part| !part.is_empty())?;
                    params.insert(name.clone(), ParamValue::One(bind(*part)));
                }
                Segment::Static(expected) => {
                    let part = parts.get(index)?;
                    if !segment_eq(expected, part, case_insensitive) {
                        return None;
                    }
                }
            }
            index += 1;
        }

        (index == parts.len()).then_some(params)
    }

    /// Convenience wrapper around [`match_segments`](Self::match_segments) for a raw path
    pub fn matches(&self, path: &str) -> Option<Params> {
        self.match_segments(&split_path(path), false, true)
    }

    /// Builds a concrete URL from parameters (reverse routing)
    ///
    /// Returns `None` when a parameter is missing or has the wrong shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::{ParamValue, Params, RoutePattern};
    ///
    /// let pattern = RoutePattern::compile("/blog/[slug]").unwrap();
    /// let params: Params = [("slug", ParamValue::One("hello world".into()))].into_iter().collect();
    /// assert_eq!(pattern.url_for(&params), Some("/blog/hello%20world".to_string()));
    /// ```
    pub fn url_for(&self, params: &Params) -> Option<String> {
        let mut url = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Static(name) => {
                    url.push('/');
                    url.push_str(name);
                }
                Segment::Dynamic(name) => {
                    url.push('/');
                    url.push_str(&urlencoding::encode(params.get_str(name)?));
                }
                Segment::CatchAll(name) => {
                    let values = params.get_segments(name)?;
                    if values.is_empty() {
                        return None;
                    }
                    for value in values {
                        url.push('/');
                        url.push_str(&urlencoding::encode(value));
                    }
                }
            }
        }

        if url.is_empty() {
            url.push('/');
        }
        Some(url)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_path)
    }
}

fn validate_segments(segments: &[Segment]) -> Result<(), PatternIssue> {
    let catch_alls = segments
        .iter()
        .filter(|segment| matches!(segment, Segment::CatchAll(_)))
        .count();
    if catch_alls > 1 {
        return Err(PatternIssue::MultipleCatchAll);
    }

    if let Some(position) = segments
        .iter()
        .position(|segment| matches!(segment, Segment::CatchAll(_)))
    {
        if position + 1 != segments.len() {
            let name = segments[position].param_name().unwrap_or_default();
            return Err(PatternIssue::CatchAllNotLast(name.to_string()));
        }
    }

    let mut seen = HashSet::new();
    for name in segments.iter().filter_map(Segment::param_name) {
        if !seen.insert(name) {
            return Err(PatternIssue::DuplicateParam(name.to_string()));
        }
    }

    Ok(())
}

fn rank_of(segments: &[Segment]) -> u64 {
    segments
        .iter()
        .enumerate()
        .fold(0, |rank, (position, segment)| {
            let shift = 2 * (MAX_SEGMENTS - 1 - position);
            rank | (segment.weight() << shift)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_compile_root() {
        let pattern = RoutePattern::compile("/").unwrap();
        assert!(pattern.segments().is_empty());
        assert_eq!(pattern.precedence_rank(), 0);
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/about").is_none());
    }

    #[test]
    fn test_compile_mixed() {
        let pattern = RoutePattern::compile("/shop/[category]/[...rest]").unwrap();
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Static("shop".into()),
                Segment::Dynamic("category".into()),
                Segment::CatchAll("rest".into()),
            ]
        );
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), vec!["category", "rest"]);
        assert!(pattern.has_catch_all());
    }

    #[rstest]
    #[case("users", PatternIssue::MissingLeadingSlash)]
    #[case("/a//b", PatternIssue::EmptySegment)]
    #[case("/[...a]/b", PatternIssue::CatchAllNotLast("a".into()))]
    #[case("/[...a]/[...b]", PatternIssue::MultipleCatchAll)]
    #[case("/[id]/x/[id]", PatternIssue::DuplicateParam("id".into()))]
    #[case("/[id]/[...id]", PatternIssue::DuplicateParam("id".into()))]
    #[case("/docs/[[...slug]]", PatternIssue::OptionalCatchAll("[[...slug]]".into()))]
    #[case("/users/[]", PatternIssue::MalformedSegment("[]".into()))]
    #[case("/users/x[id]", PatternIssue::MalformedSegment("x[id]".into()))]
    fn test_compile_rejects(#[case] path: &str, #[case] issue: PatternIssue) {
        assert_eq!(
            RoutePattern::compile(path),
            Err(RouteError::InvalidPattern {
                path: path.to_string(),
                issue,
            })
        );
    }

    #[test]
    fn test_too_deep() {
        let path = "/a".repeat(MAX_SEGMENTS + 1);
        assert_eq!(
            RoutePattern::compile(&path).unwrap_err(),
            RouteError::invalid(&path, PatternIssue::TooDeep)
        );
        assert!(RoutePattern::compile(&"/a".repeat(MAX_SEGMENTS)).is_ok());
    }

    #[test]
    fn test_rank_static_before_dynamic_before_catch_all() {
        let fixed = RoutePattern::compile("/users/settings").unwrap();
        let dynamic = RoutePattern::compile("/users/[id]").unwrap();
        let catch_all = RoutePattern::compile("/users/[...rest]").unwrap();

        assert!(fixed.precedence_rank() < dynamic.precedence_rank());
        assert!(dynamic.precedence_rank() < catch_all.precedence_rank());
    }

    #[test]
    fn test_rank_prefers_leading_statics() {
        let leading = RoutePattern::compile("/users/settings/[tab]").unwrap();
        let trailing = RoutePattern::compile("/users/[id]/settings").unwrap();
        assert!(leading.precedence_rank() < trailing.precedence_rank());
    }

    #[test]
    fn test_catch_all_requires_one_segment() {
        let pattern = RoutePattern::compile("/docs/[...slug]").unwrap();
        assert!(pattern.matches("/docs").is_none());

        let params = pattern.matches("/docs/guide/intro").unwrap();
        assert_eq!(
            params.get_segments("slug"),
            Some(&["guide".to_string(), "intro".to_string()][..])
        );
    }

    #[test]
    fn test_dynamic_rejects_empty_segment() {
        let pattern = RoutePattern::compile("/users/[id]/posts").unwrap();
        assert!(pattern.matches("/users//posts").is_none());
    }

    #[test]
    fn test_decoding_is_optional() {
        let pattern = RoutePattern::compile("/tags/[tag]").unwrap();
        let parts = ["tags", "rust%20lang"];

        let decoded = pattern.match_segments(&parts, false, true).unwrap();
        assert_eq!(decoded.get_str("tag"), Some("rust lang"));

        let raw = pattern.match_segments(&parts, false, false).unwrap();
        assert_eq!(raw.get_str("tag"), Some("rust%20lang"));
    }

    #[test]
    fn test_url_for_catch_all() {
        let pattern = RoutePattern::compile("/docs/[...slug]").unwrap();
        let params: Params = [(
            "slug",
            ParamValue::Many(vec!["guide".into(), "intro".into()]),
        )]
        .into_iter()
        .collect();
        assert_eq!(pattern.url_for(&params), Some("/docs/guide/intro".to_string()));
        assert_eq!(pattern.url_for(&Params::new()), None);
    }
}
