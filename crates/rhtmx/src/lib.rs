// RHTMX - Rust + HTMX Framework
// File-based routing, middleware dispatch and cached page data

pub mod app;
pub mod body;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod renderer;
pub mod request_context;
pub mod response;
pub mod revalidate;

// Re-export framework types
pub use app::AppBuilder;
pub use body::BodyReader;
pub use config::{Config, DispatchConfig, RoutingConfig, ServerConfig};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use handler::{
    handler, loader, ApiModule, ComponentRef, HandlerFn, LoaderContext, PageLoader, PageMeta,
    PageModule, RouteHandler,
};
pub use middleware::{from_fn, Matcher, MatcherSpec, Middleware, MiddlewareChain, MiddlewareResult, Next};
pub use renderer::{JsonRenderer, PageRenderer, RenderContext};
pub use request_context::{QueryParams, RequestContext};
pub use response::Response;
pub use revalidate::Revalidator;

// Re-export the routing and cache crates
pub use rhtmx_loader::{self as loader_cache, cache_key, CacheStats, EntryState, LoaderCache};
pub use rhtmx_router::{self as router, LayoutChain, LayoutFrame, LayoutOption, Params};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;
pub use axum::http::{Method, StatusCode};
