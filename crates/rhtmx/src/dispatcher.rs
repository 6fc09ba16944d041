// File: src/dispatcher.rs
// Purpose: Match, run middleware around the route's terminal action, map failures to responses

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::handler::{ApiModule, ComponentRef, HandlerFn, LoaderContext, PageModule, RouteHandler};
use crate::middleware::MiddlewareChain;
use crate::renderer::{PageRenderer, RenderContext};
use crate::request_context::RequestContext;
use crate::response::Response;
use crate::revalidate::Revalidator;
use axum::http::{Method, StatusCode};
use futures::future::{BoxFuture, FutureExt};
use rhtmx_loader::{cache_key, LoaderCache};
use rhtmx_router::{LayoutChain, RouteTable};
use serde_json::Value as JsonValue;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

type Terminal =
    Box<dyn FnOnce(RequestContext) -> BoxFuture<'static, Result<Response, DispatchError>> + Send>;

const PAGE_METHODS: &str = "GET, HEAD";

/// Routes requests through middleware to API handlers and pages
///
/// Built by [`AppBuilder`](crate::AppBuilder). Immutable once built, so one
/// instance is shared by every request; only the page data cache changes.
pub struct Dispatcher {
    table: RouteTable<RouteHandler, ComponentRef>,
    middleware: MiddlewareChain,
    cache: LoaderCache<JsonValue>,
    renderer: Arc<dyn PageRenderer>,
    not_found: Option<HandlerFn>,
    config: DispatchConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.len())
            .field("layouts", &self.table.layout_count())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl Dispatcher {
    pub(crate) fn new(
        table: RouteTable<RouteHandler, ComponentRef>,
        middleware: MiddlewareChain,
        cache: LoaderCache<JsonValue>,
        renderer: Arc<dyn PageRenderer>,
        not_found: Option<HandlerFn>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            table,
            middleware,
            cache,
            renderer,
            not_found,
            config,
        }
    }

    /// Handles one request; never fails, errors become 4xx/5xx responses
    pub async fn dispatch(&self, mut req: RequestContext) -> Response {
        let started = Instant::now();
        let method = req.method.clone();
        let path = req.path.clone();

        let Some(found) = self.table.match_path(&req.path) else {
            tracing::debug!(%method, path = %path, "no route matched");
            let res = self.not_found(req).await;
            return Self::finish(&method, res);
        };

        tracing::debug!(
            %method,
            path = %path,
            route = found.pattern().raw_path(),
            kind = found.handler().kind(),
            "route matched"
        );

        let terminal = self.terminal(found.handler(), found.pattern());
        req.params = found.params;
        req.set_revalidator(self.revalidator());

        let res = match AssertUnwindSafe(self.middleware.run(req, terminal))
            .catch_unwind()
            .await
        {
            Ok(Ok(res)) => res,
            Ok(Err(error)) => self.error_response(&method, &path, error),
            Err(panic) => self.error_response(&method, &path, panicked(panic)),
        };

        tracing::debug!(
            %method,
            path = %path,
            status = res.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request dispatched"
        );
        Self::finish(&method, res)
    }

    /// Revalidation handle over this dispatcher's page data
    pub fn revalidator(&self) -> Revalidator {
        Revalidator::new(self.cache.clone())
    }

    pub fn cache(&self) -> &LoaderCache<JsonValue> {
        &self.cache
    }

    pub fn routes(&self) -> &RouteTable<RouteHandler, ComponentRef> {
        &self.table
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    fn terminal(&self, handler: &RouteHandler, pattern: &rhtmx_router::RoutePattern) -> Terminal {
        match handler {
            RouteHandler::Api(api) => Self::api_terminal(api.clone()),
            RouteHandler::Page(page) => {
                let chain =
                    self.table
                        .resolve_layouts(pattern, page.layout(), page.component().clone());
                self.page_terminal(page.clone(), chain)
            }
        }
    }

    fn api_terminal(api: Arc<ApiModule>) -> Terminal {
        Box::new(move |req| {
            async move {
                let Some(handler) = api.handler_for(&req.method).cloned() else {
                    return Err(DispatchError::MethodNotAllowed {
                        allow: api.allow_header(),
                    });
                };
                handler(req).await.map_err(DispatchError::from_anyhow)
            }
            .boxed()
        })
    }

    fn page_terminal(
        &self,
        page: Arc<PageModule>,
        chain: LayoutChain<ComponentRef, ComponentRef>,
    ) -> Terminal {
        let cache = self.cache.clone();
        let renderer = self.renderer.clone();

        Box::new(move |req| {
            async move {
                if !(req.is_get() || req.is_head()) {
                    return Err(DispatchError::MethodNotAllowed {
                        allow: PAGE_METHODS.to_string(),
                    });
                }

                let data = match page.loader().cloned() {
                    Some(loader) => {
                        let key = cache_key("GET", &req.url());
                        let ctx = LoaderContext::from_request(&req);
                        cache.get_or_load(&key, move || loader(ctx)).await?
                    }
                    None => JsonValue::Null,
                };

                let ctx = RenderContext {
                    chain,
                    data,
                    meta: page.meta().clone(),
                    request: req,
                };
                renderer.render(ctx).await.map_err(DispatchError::Render)
            }
            .boxed()
        })
    }

    async fn not_found(&self, req: RequestContext) -> Response {
        let Some(handler) = &self.not_found else {
            return Response::not_found(self.config.not_found_body.clone());
        };

        let method = req.method.clone();
        let path = req.path.clone();
        match AssertUnwindSafe(handler(req)).catch_unwind().await {
            Ok(Ok(res)) => res.with_status(StatusCode::NOT_FOUND),
            Ok(Err(error)) => self.error_response(&method, &path, DispatchError::from_anyhow(error)),
            Err(panic) => self.error_response(&method, &path, panicked(panic)),
        }
    }

    fn error_response(&self, method: &Method, path: &str, error: DispatchError) -> Response {
        let status = error.status();
        match &error {
            DispatchError::MethodNotAllowed { allow } => {
                tracing::warn!(%method, path, allow = %allow, "method not allowed");
                return Response::method_not_allowed(allow);
            }
            DispatchError::MiddlewareProtocol { .. } => {
                tracing::warn!(%method, path, "{}", error);
            }
            _ => {
                tracing::error!(%method, path, "request failed: {}", error);
            }
        }

        let body = if self.config.expose_errors {
            error.to_string()
        } else {
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        };
        Response::text(body).with_status(status)
    }

    fn finish(method: &Method, res: Response) -> Response {
        if *method == Method::HEAD {
            res.without_body()
        } else {
            res
        }
    }
}

/// A caught panic, reported as a handler failure
fn panicked(payload: Box<dyn Any + Send>) -> DispatchError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    DispatchError::Handler(anyhow::anyhow!("handler panicked: {}", message))
}
