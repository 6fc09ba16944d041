// File: src/handler.rs
// Purpose: API modules (method handlers) and page modules (component, loader, meta)

use crate::request_context::{QueryParams, RequestContext};
use crate::response::Response;
use axum::http::Method;
use futures::future::{BoxFuture, FutureExt};
use rhtmx_router::{LayoutOption, Params};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Async request handler
pub type HandlerFn =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, anyhow::Result<Response>> + Send + Sync>;

/// Page data loader
pub type PageLoader =
    Arc<dyn Fn(LoaderContext) -> BoxFuture<'static, anyhow::Result<JsonValue>> + Send + Sync>;

/// Wraps an async fn or closure as a [`HandlerFn`]
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    Arc::new(move |req| f(req).boxed())
}

/// Wraps an async fn or closure as a [`PageLoader`]
pub fn loader<F, Fut>(f: F) -> PageLoader
where
    F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<JsonValue>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Method handlers exported by one API route
///
/// ```
/// use rhtmx::{ApiModule, Response};
///
/// let users = ApiModule::new()
///     .get(|_req| async { Ok(Response::text("list")) })
///     .post(|_req| async { Ok(Response::text("created")) });
/// assert_eq!(users.allow_header(), "GET, POST");
/// ```
#[derive(Clone, Default)]
pub struct ApiModule {
    handlers: Vec<(Method, HandlerFn)>,
}

impl fmt::Debug for ApiModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiModule")
            .field("methods", &self.allow_header())
            .finish()
    }
}

impl ApiModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method`, replacing an earlier one
    pub fn method(mut self, method: Method, handler: HandlerFn) -> Self {
        match self.handlers.iter_mut().find(|(existing, _)| *existing == method) {
            Some((_, slot)) => *slot = handler,
            None => self.handlers.push((method, handler)),
        }
        self
    }

    pub fn get<F, Fut>(self, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.method(Method::GET, handler(f))
    }

    pub fn post<F, Fut>(self, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.method(Method::POST, handler(f))
    }

    pub fn put<F, Fut>(self, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.method(Method::PUT, handler(f))
    }

    pub fn patch<F, Fut>(self, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.method(Method::PATCH, handler(f))
    }

    pub fn delete<F, Fut>(self, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.method(Method::DELETE, handler(f))
    }

    pub fn handler_for(&self, method: &Method) -> Option<&HandlerFn> {
        self.handlers
            .iter()
            .find(|(declared, _)| declared == method)
            .map(|(_, handler)| handler)
    }

    /// Declared methods in declaration order
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.handlers.iter().map(|(method, _)| method)
    }

    /// Value for an `Allow` header, e.g. `GET, POST`
    pub fn allow_header(&self) -> String {
        self.methods()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Opaque reference to a component, resolved by the renderer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef(Arc<str>);

impl ComponentRef {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl Serialize for ComponentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page metadata (title, description)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// What a page loader sees: only URL-derived data, since results are shared per URL
#[derive(Debug, Clone)]
pub struct LoaderContext {
    pub path: String,
    pub params: Params,
    pub query: QueryParams,
}

impl LoaderContext {
    pub fn from_request(req: &RequestContext) -> Self {
        Self {
            path: req.path.clone(),
            params: req.params.clone(),
            query: req.query.clone(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get_str(name)
    }
}

/// Component, optional loader and metadata exported by one page route
#[derive(Clone)]
pub struct PageModule {
    component: ComponentRef,
    loader: Option<PageLoader>,
    meta: PageMeta,
    layout: LayoutOption,
}

impl fmt::Debug for PageModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageModule")
            .field("component", &self.component)
            .field("has_loader", &self.loader.is_some())
            .field("meta", &self.meta)
            .field("layout", &self.layout)
            .finish()
    }
}

impl PageModule {
    pub fn new(component: impl Into<ComponentRef>) -> Self {
        Self {
            component: component.into(),
            loader: None,
            meta: PageMeta::default(),
            layout: LayoutOption::Inherit,
        }
    }

    pub fn with_loader<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<JsonValue>> + Send + 'static,
    {
        self.loader = Some(loader(f));
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn with_layout(mut self, layout: LayoutOption) -> Self {
        self.layout = layout;
        self
    }

    pub fn component(&self) -> &ComponentRef {
        &self.component
    }

    pub fn loader(&self) -> Option<&PageLoader> {
        self.loader.as_ref()
    }

    pub fn meta(&self) -> &PageMeta {
        &self.meta
    }

    pub fn layout(&self) -> LayoutOption {
        self.layout
    }
}

/// What a route table entry resolves to
#[derive(Debug, Clone)]
pub enum RouteHandler {
    Api(Arc<ApiModule>),
    Page(Arc<PageModule>),
}

impl RouteHandler {
    pub fn kind(&self) -> &'static str {
        match self {
            RouteHandler::Api(_) => "api",
            RouteHandler::Page(_) => "page",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_component_ref_serializes_as_name() {
        let component = ComponentRef::new("BlogPost");
        assert_eq!(serde_json::to_value(&component).unwrap(), json!("BlogPost"));
        assert_eq!(
            serde_json::to_value(vec![ComponentRef::from("RootLayout"), component]).unwrap(),
            json!(["RootLayout", "BlogPost"])
        );
    }

    #[test]
    fn test_redeclared_method_replaces_handler() {
        let module = ApiModule::new()
            .get(|_req| async { Ok(Response::text("first")) })
            .delete(|_req| async { Ok(Response::text("gone")) })
            .get(|_req| async { Ok(Response::text("second")) });

        assert_eq!(module.allow_header(), "GET, DELETE");
        assert!(module.handler_for(&Method::GET).is_some());
        assert!(module.handler_for(&Method::POST).is_none());
    }

    #[tokio::test]
    async fn test_handler_runs() {
        let module = ApiModule::new().get(|req: RequestContext| async move {
            Ok(Response::text(format!("hello {}", req.path)))
        });
        let get = module.handler_for(&Method::GET).unwrap();
        let res = get(RequestContext::get("/x")).await.unwrap();
        assert_eq!(res.text_body(), "hello /x");
    }

    #[test]
    fn test_page_defaults() {
        let page = PageModule::new("Home").with_title("Welcome");
        assert_eq!(page.component().name(), "Home");
        assert_eq!(page.meta().title.as_deref(), Some("Welcome"));
        assert_eq!(page.layout(), LayoutOption::Inherit);
        assert!(page.loader().is_none());
    }
}
