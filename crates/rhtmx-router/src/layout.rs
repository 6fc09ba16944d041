/// Nested layout resolution
///
/// Layouts are declared per directory. For a page declared at `/blog/[slug]`
/// the candidate directories are `/`, `/blog` and `/blog/[slug]`; each one
/// that declares a layout contributes it, root first, and the page component
/// closes the chain. Directories without a layout contribute nothing.
///
/// Directories are compared structurally, so a layout declared at
/// `/blog/[id]` also wraps a page declared at `/blog/[slug]/edit`.

use crate::error::RouteError;
use crate::path::Ancestry;
use crate::route::pattern::{shape_of, ShapeSegment};
use crate::route::RoutePattern;
use crate::table::RouteTable;

/// How a page picks up layouts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LayoutOption {
    /// Every ancestor layout, root first
    #[default]
    Inherit,
    /// Only the layout declared at `/`
    Root,
    /// Standalone page, no layouts
    None,
}

#[derive(Debug, Clone)]
pub(crate) struct LayoutEntry<L> {
    pub(crate) dir: String,
    pub(crate) layout: L,
}

/// One wrapping layout and the directory that declared it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutFrame<L> {
    pub dir: String,
    pub layout: L,
}

/// Element of a [`LayoutChain`], outermost first
#[derive(Debug, PartialEq, Eq)]
pub enum LayoutNode<'a, L, P> {
    Layout(&'a LayoutFrame<L>),
    Page(&'a P),
}

/// Ordered layouts from root to leaf, ending with the page component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutChain<L, P> {
    layouts: Vec<LayoutFrame<L>>,
    page: P,
}

impl<L, P> LayoutChain<L, P> {
    pub fn new(layouts: Vec<LayoutFrame<L>>, page: P) -> Self {
        Self { layouts, page }
    }

    /// Wrapping layouts, outermost first
    pub fn layouts(&self) -> &[LayoutFrame<L>] {
        &self.layouts
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// Number of elements including the page
    pub fn len(&self) -> usize {
        self.layouts.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Walks the chain outermost first; the page is always the last node
    pub fn iter(&self) -> impl Iterator<Item = LayoutNode<'_, L, P>> {
        self.layouts
            .iter()
            .map(LayoutNode::Layout)
            .chain(std::iter::once(LayoutNode::Page(&self.page)))
    }

    /// Renders the page, then wraps the result in each layout from the
    /// innermost outwards
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::{LayoutChain, LayoutFrame};
    ///
    /// let chain = LayoutChain::new(
    ///     vec![
    ///         LayoutFrame { dir: "/".into(), layout: "root" },
    ///         LayoutFrame { dir: "/blog".into(), layout: "blog" },
    ///     ],
    ///     "post",
    /// );
    ///
    /// let html = chain.fold_inside_out(|page| page.to_string(), |frame, inner| {
    ///     format!("{}({})", frame.layout, inner)
    /// });
    /// assert_eq!(html, "root(blog(post))");
    /// ```
    pub fn fold_inside_out<T>(
        &self,
        render_page: impl FnOnce(&P) -> T,
        mut wrap: impl FnMut(&LayoutFrame<L>, T) -> T,
    ) -> T {
        self.layouts
            .iter()
            .rev()
            .fold(render_page(&self.page), |inner, frame| wrap(frame, inner))
    }
}

impl<H, L: Clone> RouteTable<H, L> {
    /// Builds the layout chain for a matched page
    ///
    /// Pure and deterministic given the table; cheap enough to run per request.
    pub fn resolve_layouts<P>(
        &self,
        page: &RoutePattern,
        option: LayoutOption,
        component: P,
    ) -> LayoutChain<L, P> {
        let frame = |entry: &LayoutEntry<L>| LayoutFrame {
            dir: entry.dir.clone(),
            layout: entry.layout.clone(),
        };

        let layouts = match option {
            LayoutOption::None => Vec::new(),
            LayoutOption::Root => {
                let root: &[ShapeSegment] = &[];
                self.layouts.get(root).map(frame).into_iter().collect()
            }
            LayoutOption::Inherit => {
                let shape = shape_of(page.segments(), self.options().case_insensitive);
                let mut frames: Vec<_> = Ancestry::new(&shape)
                    .filter_map(|dir| self.layouts.get(dir))
                    .map(frame)
                    .collect();
                frames.reverse();
                frames
            }
        };

        LayoutChain::new(layouts, component)
    }

    /// Same as [`resolve_layouts`](Self::resolve_layouts) for a declared path
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::{LayoutOption, RouteTableBuilder};
    ///
    /// let table = RouteTableBuilder::<(), &str>::new()
    ///     .with_route("/blog/[slug]", ())
    ///     .with_layout("/", "root")
    ///     .with_layout("/blog", "blog")
    ///     .build()
    ///     .unwrap();
    ///
    /// let chain = table.resolve_layouts_for_path("/blog/[slug]", LayoutOption::Inherit, "post").unwrap();
    /// let names: Vec<&str> = chain.layouts().iter().map(|frame| frame.layout).collect();
    /// assert_eq!(names, vec!["root", "blog"]);
    /// assert_eq!(*chain.page(), "post");
    /// ```
    pub fn resolve_layouts_for_path<P>(
        &self,
        page_path: &str,
        option: LayoutOption,
        component: P,
    ) -> Result<LayoutChain<L, P>, RouteError> {
        let pattern = RoutePattern::compile(page_path)?;
        Ok(self.resolve_layouts(&pattern, option, component))
    }
}
