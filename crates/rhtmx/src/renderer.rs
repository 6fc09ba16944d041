// File: src/renderer.rs
// Purpose: Turns a resolved layout chain plus loaded data into a response

use crate::handler::{ComponentRef, PageMeta};
use crate::request_context::RequestContext;
use crate::response::Response;
use async_trait::async_trait;
use rhtmx_router::LayoutChain;
use serde_json::{json, Value as JsonValue};

/// Everything a renderer needs for one page view
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Layouts root first, closed by the page component
    pub chain: LayoutChain<ComponentRef, ComponentRef>,
    /// Loader output, `null` for pages without a loader
    pub data: JsonValue,
    pub meta: PageMeta,
    pub request: RequestContext,
}

/// Renders page views
///
/// The dispatcher owns component identity only; how a component becomes
/// markup is up to the implementation.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, ctx: RenderContext) -> anyhow::Result<Response>;
}

/// Default renderer: describes the view as JSON
///
/// ```json
/// { "layouts": ["Root", "Blog"], "page": "Post", "meta": {..}, "data": {..} }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

#[async_trait]
impl PageRenderer for JsonRenderer {
    async fn render(&self, ctx: RenderContext) -> anyhow::Result<Response> {
        let layouts: Vec<&str> = ctx
            .chain
            .layouts()
            .iter()
            .map(|frame| frame.layout.name())
            .collect();

        Ok(Response::json(&json!({
            "layouts": layouts,
            "page": ctx.chain.page().name(),
            "meta": ctx.meta,
            "data": ctx.data,
        })))
    }
}
