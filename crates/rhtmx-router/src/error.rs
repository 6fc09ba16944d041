/// Build-time errors raised while compiling patterns and assembling a route table
///
/// None of these can occur while serving a request: a table that builds is
/// guaranteed to match deterministically.

use thiserror::Error;

use crate::route::pattern::MAX_SEGMENTS;

/// Why a single declared path (or glob) was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternIssue {
    #[error("path must start with '/'")]
    MissingLeadingSlash,

    #[error("path contains an empty segment")]
    EmptySegment,

    #[error("malformed segment `{0}`")]
    MalformedSegment(String),

    #[error("optional catch-all `{0}` is not supported")]
    OptionalCatchAll(String),

    #[error("catch-all `{0}` must be the last segment")]
    CatchAllNotLast(String),

    #[error("more than one catch-all segment")]
    MultipleCatchAll,

    #[error("parameter `{0}` is declared more than once")]
    DuplicateParam(String),

    #[error("more than {} segments", MAX_SEGMENTS)]
    TooDeep,

    #[error("wildcard `*` is only allowed at the end of a glob")]
    MisplacedWildcard,

    #[error("globs cannot contain dynamic segment `{0}`")]
    DynamicInGlob(String),
}

/// Errors raised while building a [`RouteTable`](crate::RouteTable) or a glob
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid route pattern `{path}`: {issue}")]
    InvalidPattern { path: String, issue: PatternIssue },

    #[error("ambiguous routes compile to the same pattern: {}", .paths.join(", "))]
    AmbiguousRoute { paths: Vec<String> },

    #[error("more than one layout declared for `{dir}`")]
    DuplicateLayout { dir: String },

    #[error("invalid path glob `{glob}`: {issue}")]
    InvalidGlob { glob: String, issue: PatternIssue },
}

impl RouteError {
    pub(crate) fn invalid(path: &str, issue: PatternIssue) -> Self {
        RouteError::InvalidPattern {
            path: path.to_string(),
            issue,
        }
    }
}
