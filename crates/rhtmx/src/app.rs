// File: src/app.rs
// Purpose: Declares routes, layouts and middleware, then compiles them into a Dispatcher

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::handler::{handler, ApiModule, ComponentRef, HandlerFn, PageModule, RouteHandler};
use crate::middleware::{
    from_fn, Matcher, MatcherSpec, Middleware, MiddlewareChain, MiddlewareEntry, MiddlewareResult, Next,
};
use crate::renderer::{JsonRenderer, PageRenderer};
use crate::request_context::RequestContext;
use crate::response::Response;
use anyhow::{Context, Result};
use rhtmx_loader::LoaderCache;
use rhtmx_router::RouteTableBuilder;
use std::future::Future;
use std::sync::Arc;

/// Application manifest: every page, API route, layout and middleware
///
/// ```
/// use rhtmx::{AppBuilder, ApiModule, MatcherSpec, PageModule, Response};
///
/// let app = AppBuilder::new()
///     .layout("/", "RootLayout")
///     .page("/", PageModule::new("Home"))
///     .api("/api/health", ApiModule::new().get(|_req| async { Ok(Response::text("ok")) }))
///     .middleware("logger", MatcherSpec::All, |req, next| async move {
///         let res = next.run(req).await?;
///         Ok(Some(res))
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(app.routes().len(), 2);
/// ```
pub struct AppBuilder {
    config: Config,
    routes: Vec<(String, RouteHandler)>,
    layouts: Vec<(String, ComponentRef)>,
    middleware: Vec<(String, MatcherSpec, Arc<dyn Middleware>)>,
    renderer: Arc<dyn PageRenderer>,
    not_found: Option<HandlerFn>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            routes: Vec::new(),
            layouts: Vec::new(),
            middleware: Vec::new(),
            renderer: Arc::new(JsonRenderer),
            not_found: None,
        }
    }

    /// Declares a page route, e.g. `/blog/[slug]`
    pub fn page(mut self, path: impl Into<String>, page: PageModule) -> Self {
        self.routes
            .push((path.into(), RouteHandler::Page(Arc::new(page))));
        self
    }

    /// Declares an API route, e.g. `/api/users/[id]`
    pub fn api(mut self, path: impl Into<String>, api: ApiModule) -> Self {
        self.routes.push((path.into(), RouteHandler::Api(Arc::new(api))));
        self
    }

    /// Declares the layout for a directory, e.g. `/` or `/blog`
    pub fn layout(mut self, dir: impl Into<String>, component: impl Into<ComponentRef>) -> Self {
        self.layouts.push((dir.into(), component.into()));
        self
    }

    /// Appends a middleware; matching ones run in declaration order
    pub fn middleware<F, Fut>(self, name: impl Into<String>, matcher: impl Into<MatcherSpec>, f: F) -> Self
    where
        F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MiddlewareResult> + Send + 'static,
    {
        self.with_middleware(name, matcher, from_fn(f))
    }

    /// Appends a middleware implemented as a type
    pub fn with_middleware(
        mut self,
        name: impl Into<String>,
        matcher: impl Into<MatcherSpec>,
        middleware: Arc<dyn Middleware>,
    ) -> Self {
        self.middleware
            .push((name.into(), matcher.into(), middleware));
        self
    }

    pub fn renderer(mut self, renderer: impl PageRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Handler for unmatched paths; its response is always sent as 404
    pub fn not_found<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.not_found = Some(handler(f));
        self
    }

    /// Compiles the route table and middleware matchers
    ///
    /// Fails on invalid or ambiguous route patterns, duplicate layouts and
    /// invalid middleware globs.
    pub fn build(self) -> Result<Dispatcher> {
        let options = self.config.routing.table_options();

        let table = RouteTableBuilder::new()
            .with_routes(self.routes)
            .with_layouts(self.layouts)
            .with_options(options)
            .build()
            .context("Failed to build route table")?;

        let mut chain = MiddlewareChain::new(options.case_insensitive);
        for (name, spec, middleware) in self.middleware {
            let matcher = Matcher::compile(&spec)
                .with_context(|| format!("Invalid matcher for middleware `{}`", name))?;
            chain.push(MiddlewareEntry::new(name, matcher, middleware));
        }

        let cache = LoaderCache::new(self.config.loader.to_runtime_config());

        tracing::info!(
            "Built dispatcher: {} routes, {} layouts, {} middleware",
            table.len(),
            table.layout_count(),
            chain.len()
        );
        for route in table.iter() {
            tracing::debug!(
                route = route.pattern().raw_path(),
                kind = route.handler().kind(),
                rank = route.pattern().precedence_rank(),
                "registered route"
            );
        }

        Ok(Dispatcher::new(
            table,
            chain,
            cache,
            self.renderer,
            self.not_found,
            self.config.dispatch,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ambiguous_routes_fail_build() {
        let err = AppBuilder::new()
            .page("/blog/[slug]", PageModule::new("Post"))
            .api("/blog/[id]", ApiModule::new())
            .build()
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to build route table");
        assert_eq!(
            err.root_cause().to_string(),
            "ambiguous routes compile to the same pattern: /blog/[slug], /blog/[id]"
        );
    }

    #[test]
    fn test_invalid_glob_names_middleware() {
        let err = AppBuilder::new()
            .middleware("auth", "/users/[id]", |req, next: Next| async move {
                Ok(Some(next.run(req).await?))
            })
            .build()
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid matcher for middleware `auth`");
    }

    #[test]
    fn test_routes_listed_in_precedence_order() {
        let app = AppBuilder::new()
            .page("/users/[id]", PageModule::new("User"))
            .page("/users/settings", PageModule::new("Settings"))
            .page("/[...rest]", PageModule::new("Fallback"))
            .build()
            .unwrap();

        let order: Vec<&str> = app.routes().iter().map(|r| r.pattern().raw_path()).collect();
        assert_eq!(order, vec!["/users/settings", "/users/[id]", "/[...rest]"]);
    }
}
