mod demo;
mod render;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    Router,
};
use rhtmx::{Config, Dispatcher, RequestContext, Response};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("rhtmx starting...");

    let config = Config::load_default().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {:#}, using defaults", e);
        Config::default()
    });
    let addr = config.server.addr();

    let api_key = std::env::var("RHTMX_API_KEY").ok();
    if api_key.is_none() {
        info!("RHTMX_API_KEY not set: API mutations are open");
    }

    let dispatcher = demo::build(config, demo::PostStore::seeded(), api_key)?;
    for route in dispatcher.routes().iter() {
        info!("  {} -> {}", route.pattern().raw_path(), route.handler().kind());
    }

    let app = router(Arc::new(dispatcher));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Every request goes to the dispatcher; it owns routing
fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new().fallback(dispatch).with_state(dispatcher)
}

async fn dispatch(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let req = RequestContext::new(method, uri.path(), uri.query(), headers, body);
    dispatcher.dispatch(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn app(api_key: Option<&str>) -> Router {
        let dispatcher = demo::build(
            Config::default(),
            demo::PostStore::seeded(),
            api_key.map(str::to_string),
        )
        .unwrap();
        router(Arc::new(dispatcher))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn create_post(slug: &str, api_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/posts")
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        builder
            .body(Body::from(format!("slug={slug}&title=Second+post&body=More")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_home_page_inside_root_layout() {
        let (status, html) = send(&app(None), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Welcome to RHTMX</h1>"));
    }

    #[tokio::test]
    async fn test_blog_post_uses_nested_layouts() {
        let (status, html) = send(&app(None), get("/blog/hello-rhtmx")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<section class=\"blog\">"));
        assert!(html.contains("<h2>Hello, RHTMX</h2>"));
    }

    #[tokio::test]
    async fn test_about_page_skips_blog_layout() {
        let (_, html) = send(&app(None), get("/about")).await;
        assert!(html.contains("<nav>"));
        assert!(!html.contains("<section class=\"blog\">"));
    }

    #[tokio::test]
    async fn test_created_post_shows_up_after_revalidation() {
        let app = app(None);

        let (_, before) = send(&app, get("/blog")).await;
        assert!(!before.contains("Second post"));

        let (status, _) = send(&app, create_post("second", None)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, after) = send(&app, get("/blog")).await;
        assert!(after.contains("Second post"));
    }

    #[tokio::test]
    async fn test_api_key_guards_mutations() {
        let app = app(Some("s3cret"));

        let (status, _) = send(&app, create_post("x", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, create_post("x", Some("s3cret"))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(&app, get("/api/posts")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404_page() {
        let (status, html) = send(&app(None), get("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(html.contains("<code>/nope</code>"));
    }
}
