/// Demo application: a small blog with an API that revalidates page data
use crate::render::{blog_layout, root_layout, MaudRenderer};
use anyhow::Context;
use maud::{html, Markup};
use rhtmx::{
    ApiModule, AppBuilder, Config, Dispatcher, LayoutOption, MatcherSpec, Next, PageModule,
    RequestContext, Response, StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// In-memory post storage shared by loaders and API handlers
#[derive(Debug, Clone, Default)]
pub struct PostStore {
    posts: Arc<RwLock<Vec<Post>>>,
}

impl PostStore {
    pub fn seeded() -> Self {
        let posts = vec![Post {
            slug: "hello-rhtmx".to_string(),
            title: "Hello, RHTMX".to_string(),
            body: "File-based routes, layouts and cached page data.".to_string(),
        }];
        Self {
            posts: Arc::new(RwLock::new(posts)),
        }
    }

    pub async fn list(&self) -> Vec<Post> {
        self.posts.read().await.clone()
    }

    pub async fn find(&self, slug: &str) -> Option<Post> {
        self.posts.read().await.iter().find(|p| p.slug == slug).cloned()
    }

    /// Adds or replaces the post with the same slug
    pub async fn upsert(&self, post: Post) {
        let mut posts = self.posts.write().await;
        match posts.iter_mut().find(|p| p.slug == post.slug) {
            Some(existing) => *existing = post,
            None => posts.push(post),
        }
    }

    pub async fn remove(&self, slug: &str) -> bool {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|p| p.slug != slug);
        posts.len() != before
    }
}

/// Builds the demo dispatcher
///
/// Mutating `/api/*` requests need an `x-api-key` header equal to `api_key`
/// when one is configured.
pub fn build(config: Config, store: PostStore, api_key: Option<String>) -> anyhow::Result<Dispatcher> {
    let renderer = MaudRenderer::new()
        .layout("RootLayout", root_layout)
        .layout("BlogLayout", blog_layout)
        .page("Home", home_page)
        .page("About", about_page)
        .page("BlogIndex", blog_index_page)
        .page("BlogPost", blog_post_page);

    let api_key = api_key.map(Arc::<str>::from);

    AppBuilder::with_config(config)
        .renderer(renderer)
        .layout("/", "RootLayout")
        .layout("/blog", "BlogLayout")
        .middleware("request-log", MatcherSpec::All, |req: RequestContext, next: Next| async move {
            let started = Instant::now();
            let method = req.method.clone();
            let path = req.path.clone();
            let res = next.run(req).await?;
            tracing::info!(
                "{} {} -> {} ({} ms)",
                method,
                path,
                res.status.as_u16(),
                started.elapsed().as_millis()
            );
            Ok(Some(res))
        })
        .middleware("api-key", "/api/*", move |req: RequestContext, next: Next| {
            let api_key = api_key.clone();
            async move {
                let mutating = !(req.is_get() || req.is_head());
                if let (true, Some(expected)) = (mutating, api_key.as_deref()) {
                    if req.get_header("x-api-key") != Some(expected) {
                        return Ok(Some(
                            Response::json(&json!({ "error": "missing or invalid API key" }))
                                .with_status(StatusCode::UNAUTHORIZED),
                        ));
                    }
                }
                Ok(Some(next.run(req).await?))
            }
        })
        .page("/", PageModule::new("Home").with_title("RHTMX"))
        .page(
            "/about",
            PageModule::new("About")
                .with_title("About")
                .with_layout(LayoutOption::Root),
        )
        .page("/blog", blog_index(store.clone()))
        .page("/blog/[slug]", blog_post(store.clone()))
        .api("/api/posts", posts_api(store.clone()))
        .api("/api/posts/[slug]", post_api(store))
        .not_found(|req| async move {
            Ok(Response::html(
                html! {
                    h1 { "404 Not Found" }
                    p { "Nothing lives at " code { (req.path) } }
                    a href="/" { "Go Home" }
                }
                .into_string(),
            ))
        })
        .build()
        .context("Failed to build demo application")
}

fn blog_index(store: PostStore) -> PageModule {
    PageModule::new("BlogIndex")
        .with_title("Blog")
        .with_loader(move |_ctx| {
            let store = store.clone();
            async move { Ok(json!({ "posts": store.list().await })) }
        })
}

fn blog_post(store: PostStore) -> PageModule {
    PageModule::new("BlogPost")
        .with_title("Blog post")
        .with_loader(move |ctx| {
            let store = store.clone();
            async move {
                let slug = ctx.param("slug").unwrap_or_default().to_string();
                Ok(json!({ "slug": slug, "post": store.find(&slug).await }))
            }
        })
}

fn posts_api(store: PostStore) -> ApiModule {
    let create_store = store.clone();
    ApiModule::new()
        .get(move |_req| {
            let store = store.clone();
            async move { Ok(Response::json(&store.list().await)) }
        })
        .post(move |req: RequestContext| {
            let store = create_store.clone();
            async move {
                let Some(body) = req.body() else {
                    return Ok(Response::text("missing body").with_status(StatusCode::BAD_REQUEST));
                };
                let post: Post = match body.parse() {
                    Ok(post) => post,
                    Err(error) => {
                        return Ok(Response::text(format!("invalid post: {:#}", error))
                            .with_status(StatusCode::BAD_REQUEST))
                    }
                };

                let slug = post.slug.clone();
                store.upsert(post.clone()).await;
                if let Some(revalidator) = req.revalidator() {
                    revalidator.revalidate_path("/blog").await;
                    revalidator.revalidate_path(&format!("/blog/{}", slug)).await;
                }
                Ok(Response::json(&post).with_status(StatusCode::CREATED))
            }
        })
}

fn post_api(store: PostStore) -> ApiModule {
    let delete_store = store.clone();
    ApiModule::new()
        .get(move |req: RequestContext| {
            let store = store.clone();
            async move {
                let slug = req.param("slug").unwrap_or_default();
                Ok(match store.find(slug).await {
                    Some(post) => Response::json(&post),
                    None => Response::json(&json!({ "error": "not found" }))
                        .with_status(StatusCode::NOT_FOUND),
                })
            }
        })
        .delete(move |req: RequestContext| {
            let store = delete_store.clone();
            async move {
                let slug = req.param("slug").unwrap_or_default().to_string();
                if !store.remove(&slug).await {
                    return Ok(Response::new(StatusCode::NOT_FOUND));
                }
                if let Some(revalidator) = req.revalidator() {
                    revalidator.revalidate_subtree("/blog").await;
                }
                Ok(Response::new(StatusCode::NO_CONTENT))
            }
        })
}

// -- Page components --

fn home_page(_data: &JsonValue, _req: &RequestContext) -> Markup {
    html! {
        h1 { "Welcome to RHTMX" }
        p { "Rust + HTMX with Maud compile-time templates." }
        a href="/blog" { "Read the blog" }
    }
}

fn about_page(_data: &JsonValue, _req: &RequestContext) -> Markup {
    html! {
        h1 { "About" }
        p { "This page uses only the root layout." }
    }
}

fn blog_index_page(data: &JsonValue, _req: &RequestContext) -> Markup {
    let posts: Vec<Post> = serde_json::from_value(data["posts"].clone()).unwrap_or_default();
    html! {
        @if posts.is_empty() {
            p { "No posts yet." }
        } @else {
            ul {
                @for post in &posts {
                    li { a href={ "/blog/" (post.slug) } { (post.title) } }
                }
            }
        }
    }
}

fn blog_post_page(data: &JsonValue, _req: &RequestContext) -> Markup {
    let post: Option<Post> = serde_json::from_value(data["post"].clone()).unwrap_or(None);
    html! {
        @match post {
            Some(post) => {
                article {
                    h2 { (post.title) }
                    p { (post.body) }
                }
            }
            None => {
                p { "No post named " code { (data["slug"].as_str().unwrap_or_default()) } "." }
            }
        }
    }
}
