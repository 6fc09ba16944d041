/// Maud page renderer
///
/// Components are plain functions registered by name. Layouts wrap the
/// markup of everything inside them; pages turn loader data into markup.
/// HTMX requests (`HX-Request` header) get the page fragment only.
use anyhow::anyhow;
use maud::{html, Markup, DOCTYPE};
use rhtmx::{async_trait, PageMeta, PageRenderer, RenderContext, RequestContext, Response};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

pub type LayoutFn = fn(&PageMeta, Markup) -> Markup;
pub type PageFn = fn(&JsonValue, &RequestContext) -> Markup;

#[derive(Default)]
pub struct MaudRenderer {
    layouts: HashMap<&'static str, LayoutFn>,
    pages: HashMap<&'static str, PageFn>,
}

impl MaudRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(mut self, name: &'static str, layout: LayoutFn) -> Self {
        self.layouts.insert(name, layout);
        self
    }

    pub fn page(mut self, name: &'static str, page: PageFn) -> Self {
        self.pages.insert(name, page);
        self
    }

    fn render_markup(&self, ctx: &RenderContext) -> anyhow::Result<Markup> {
        let page_name = ctx.chain.page().name();
        let page = self
            .pages
            .get(page_name)
            .ok_or_else(|| anyhow!("unknown page component `{}`", page_name))?;
        let fragment = page(&ctx.data, &ctx.request);

        if ctx.request.is_htmx() {
            return Ok(fragment);
        }

        ctx.chain
            .fold_inside_out(
                |_| Ok(fragment),
                |frame, inner: anyhow::Result<Markup>| {
                    let layout = self
                        .layouts
                        .get(frame.layout.name())
                        .ok_or_else(|| anyhow!("unknown layout component `{}`", frame.layout))?;
                    Ok(layout(&ctx.meta, inner?))
                },
            )
    }
}

#[async_trait]
impl PageRenderer for MaudRenderer {
    async fn render(&self, ctx: RenderContext) -> anyhow::Result<Response> {
        let markup = self.render_markup(&ctx)?;
        Ok(Response::html(markup.into_string()))
    }
}

/// Full document shell; every non-standalone page ends up inside it
pub fn root_layout(meta: &PageMeta, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { (meta.title.as_deref().unwrap_or("RHTMX")) }
                @if let Some(description) = &meta.description {
                    meta name="description" content=(description);
                }
                script src="https://unpkg.com/htmx.org@1.9.12" {}
            }
            body hx-boost="true" {
                nav {
                    a href="/" { "Home" } " | "
                    a href="/blog" { "Blog" } " | "
                    a href="/about" { "About" }
                }
                main { (content) }
            }
        }
    }
}

pub fn blog_layout(_meta: &PageMeta, content: Markup) -> Markup {
    html! {
        section.blog {
            h1 { "Blog" }
            (content)
        }
    }
}
