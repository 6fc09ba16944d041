// File: src/middleware.rs
// Purpose: Onion-model middleware chain with path matchers

use crate::error::DispatchError;
use crate::request_context::RequestContext;
use crate::response::Response;
use futures::future::{BoxFuture, FutureExt};
use rhtmx_router::{PathGlob, RouteError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a middleware produces
///
/// `Ok(Some(_))` is a response, either its own (short-circuit) or the one
/// `next` produced. `Ok(None)` means the middleware neither answered nor
/// called `next`, which the chain reports as an error.
pub type MiddlewareResult = anyhow::Result<Option<Response>>;

type Terminal =
    Box<dyn FnOnce(RequestContext) -> BoxFuture<'static, Result<Response, DispatchError>> + Send>;

/// A request interceptor
///
/// Closures of the shape `Fn(RequestContext, Next) -> impl Future<Output = MiddlewareResult>`
/// implement this trait.
pub trait Middleware: Send + Sync {
    fn handle<'a>(&'a self, req: RequestContext, next: Next) -> BoxFuture<'a, MiddlewareResult>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    fn handle<'a>(&'a self, req: RequestContext, next: Next) -> BoxFuture<'a, MiddlewareResult> {
        self(req, next).boxed()
    }
}

/// Boxes an async closure as a middleware
///
/// Pins the closure's argument and return types, so no annotations are needed.
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    Arc::new(f)
}

/// Which paths a middleware applies to, as declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatcherSpec {
    All,
    One(String),
    Many(Vec<String>),
}

impl From<&str> for MatcherSpec {
    fn from(glob: &str) -> Self {
        MatcherSpec::One(glob.to_string())
    }
}

impl From<String> for MatcherSpec {
    fn from(glob: String) -> Self {
        MatcherSpec::One(glob)
    }
}

impl From<Vec<&str>> for MatcherSpec {
    fn from(globs: Vec<&str>) -> Self {
        MatcherSpec::Many(globs.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for MatcherSpec {
    fn from(globs: Vec<String>) -> Self {
        MatcherSpec::Many(globs)
    }
}

impl<const N: usize> From<[&str; N]> for MatcherSpec {
    fn from(globs: [&str; N]) -> Self {
        MatcherSpec::Many(globs.iter().map(|glob| glob.to_string()).collect())
    }
}

/// Compiled form of a [`MatcherSpec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    All,
    AnyOf(Vec<PathGlob>),
}

impl Matcher {
    pub fn compile(spec: &MatcherSpec) -> Result<Self, RouteError> {
        match spec {
            MatcherSpec::All => Ok(Matcher::All),
            MatcherSpec::One(glob) => Ok(Matcher::AnyOf(vec![PathGlob::parse(glob)?])),
            MatcherSpec::Many(globs) => globs
                .iter()
                .map(|glob| PathGlob::parse(glob))
                .collect::<Result<Vec<_>, _>>()
                .map(Matcher::AnyOf),
        }
    }

    pub fn matches(&self, path: &str, case_insensitive: bool) -> bool {
        match self {
            Matcher::All => true,
            Matcher::AnyOf(globs) => globs.iter().any(|glob| glob.matches(path, case_insensitive)),
        }
    }
}

/// A registered middleware
pub struct MiddlewareEntry {
    pub name: String,
    pub matcher: Matcher,
    handler: Arc<dyn Middleware>,
}

impl fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("name", &self.name)
            .field("matcher", &self.matcher)
            .finish()
    }
}

impl MiddlewareEntry {
    pub fn new(name: impl Into<String>, matcher: Matcher, handler: Arc<dyn Middleware>) -> Self {
        Self {
            name: name.into(),
            matcher,
            handler,
        }
    }
}

/// Continuation handed to each middleware
///
/// Consumed by [`run`](Next::run), so the rest of the chain runs at most once.
pub struct Next {
    stack: Arc<[Arc<MiddlewareEntry>]>,
    index: usize,
    terminal: Terminal,
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.stack.len().saturating_sub(self.index))
            .finish()
    }
}

impl Next {
    /// Runs the remaining middleware, then the route handler
    ///
    /// Errors coming back out carry a [`DispatchError`]; propagating them
    /// with `?` keeps their status code.
    pub async fn run(self, req: RequestContext) -> anyhow::Result<Response> {
        let Next {
            stack,
            index,
            terminal,
        } = self;

        let Some(entry) = stack.get(index).cloned() else {
            return terminal(req).await.map_err(anyhow::Error::from);
        };

        let next = Next {
            stack,
            index: index + 1,
            terminal,
        };

        match entry.handler.handle(req, next).await {
            Ok(Some(res)) => Ok(res),
            Ok(None) => Err(DispatchError::MiddlewareProtocol {
                name: entry.name.clone(),
            }
            .into()),
            Err(error) => Err(match error.downcast::<DispatchError>() {
                Ok(dispatch) => dispatch.into(),
                Err(error) => DispatchError::Middleware {
                    name: entry.name.clone(),
                    error,
                }
                .into(),
            }),
        }
    }
}

/// Registered middleware in declaration order
#[derive(Debug, Default)]
pub struct MiddlewareChain {
    entries: Vec<Arc<MiddlewareEntry>>,
    case_insensitive: bool,
}

impl MiddlewareChain {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive,
        }
    }

    pub fn push(&mut self, entry: MiddlewareEntry) {
        self.entries.push(Arc::new(entry));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Runs the middleware matching the request path around `terminal`
    pub async fn run<T>(&self, req: RequestContext, terminal: T) -> Result<Response, DispatchError>
    where
        T: FnOnce(RequestContext) -> BoxFuture<'static, Result<Response, DispatchError>>
            + Send
            + 'static,
    {
        let stack: Arc<[Arc<MiddlewareEntry>]> = self
            .entries
            .iter()
            .filter(|entry| {
                let hit = entry.matcher.matches(&req.path, self.case_insensitive);
                if !hit {
                    tracing::debug!(middleware = %entry.name, path = %req.path, "middleware skipped");
                }
                hit
            })
            .cloned()
            .collect();

        let next = Next {
            stack,
            index: 0,
            terminal: Box::new(terminal),
        };

        next.run(req).await.map_err(DispatchError::from_anyhow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn chain_of(entries: Vec<(&str, MatcherSpec, Arc<dyn Middleware>)>) -> MiddlewareChain {
        let mut chain = MiddlewareChain::new(false);
        for (name, spec, handler) in entries {
            let matcher = Matcher::compile(&spec).unwrap();
            chain.push(MiddlewareEntry::new(name, matcher, handler));
        }
        chain
    }

    fn ok_terminal(req: RequestContext) -> BoxFuture<'static, Result<Response, DispatchError>> {
        async move { Ok(Response::text(format!("handled {}", req.path))) }.boxed()
    }

    #[rstest]
    #[case(MatcherSpec::All, "/anything", true)]
    #[case(MatcherSpec::from("/api/*"), "/api/users", true)]
    #[case(MatcherSpec::from("/api/*"), "/pages/home", false)]
    #[case(MatcherSpec::from(["/admin/*", "/api/*"]), "/admin", true)]
    #[case(MatcherSpec::from(vec!["/a", "/b"]), "/c", false)]
    fn test_matcher(#[case] spec: MatcherSpec, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(Matcher::compile(&spec).unwrap().matches(path, false), expected);
    }

    #[test]
    fn test_invalid_glob_rejected() {
        assert!(Matcher::compile(&MatcherSpec::from("/users/[id]")).is_err());
    }

    #[tokio::test]
    async fn test_fall_through_is_protocol_error() {
        let silent = from_fn(|_req, _next| async { Ok(None) });
        let chain = chain_of(vec![("silent", MatcherSpec::All, silent)]);

        let err = chain.run(RequestContext::get("/x"), ok_terminal).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "middleware `silent` returned without a response or calling next"
        );
    }

    #[tokio::test]
    async fn test_plain_error_attributed_to_middleware() {
        let failing = from_fn(|_req, _next| async { Err(anyhow::anyhow!("token store offline")) });
        let chain = chain_of(vec![("auth", MatcherSpec::All, failing)]);

        let err = chain.run(RequestContext::get("/x"), ok_terminal).await.unwrap_err();
        assert!(matches!(err, DispatchError::Middleware { ref name, .. } if name == "auth"));
    }

    #[tokio::test]
    async fn test_inner_error_keeps_variant_through_outer_question_mark() {
        let outer = from_fn(|req, next: Next| async move {
            let res = next.run(req).await?;
            Ok(Some(res))
        });
        let chain = chain_of(vec![("outer", MatcherSpec::All, outer)]);

        let err = chain
            .run(RequestContext::get("/x"), |_req| {
                async { Err::<Response, _>(DispatchError::MethodNotAllowed { allow: "GET".into() }) }.boxed()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MethodNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_skipped_middleware_does_not_run() {
        let blocker = from_fn(|_req, _next| async { Ok(Some(Response::text("blocked"))) });
        let chain = chain_of(vec![("blocker", MatcherSpec::from("/api/*"), blocker)]);

        let res = chain.run(RequestContext::get("/pages/home"), ok_terminal).await.unwrap();
        assert_eq!(res.text_body(), "handled /pages/home");
    }
}
