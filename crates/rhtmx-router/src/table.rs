/// Immutable route table: compiled, ambiguity-checked and sorted by precedence
///
/// A table is built once from the scanner's ordered `(path, handler)` list and
/// then only read. It holds no interior mutability, so sharing it behind an
/// `Arc` across concurrent requests needs no locking.

use std::collections::HashMap;

use crate::error::RouteError;
use crate::layout::LayoutEntry;
use crate::path::split_path;
use crate::route::pattern::{shape_of, ShapeSegment};
use crate::route::{Params, RoutePattern};

/// A compiled route and the opaque handler reference it resolves to
#[derive(Debug, Clone)]
pub struct Route<H> {
    pattern: RoutePattern,
    handler: H,
    declared_at: usize,
}

impl<H> Route<H> {
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Position in the input list; breaks ties between equal ranks
    pub fn declared_at(&self) -> usize {
        self.declared_at
    }
}

/// Result of matching a request path
///
/// Created per request and never shared.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,
    pub params: Params,
}

impl<'a, H> RouteMatch<'a, H> {
    pub fn pattern(&self) -> &'a RoutePattern {
        &self.route.pattern
    }

    pub fn handler(&self) -> &'a H {
        &self.route.handler
    }
}

/// Matching behaviour fixed at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    /// Compare static segments ignoring ASCII case
    pub case_insensitive: bool,
    /// Percent-decode bound parameter values
    pub decode_params: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            decode_params: true,
        }
    }
}

/// Collects declared routes and layouts, then compiles them in one step
#[derive(Debug)]
pub struct RouteTableBuilder<H, L = ()> {
    routes: Vec<(String, H)>,
    layouts: Vec<(String, L)>,
    options: TableOptions,
}

impl<H, L> Default for RouteTableBuilder<H, L> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            layouts: Vec::new(),
            options: TableOptions::default(),
        }
    }
}

impl<H, L> RouteTableBuilder<H, L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, raw_path: impl Into<String>, handler: H) -> Self {
        self.routes.push((raw_path.into(), handler));
        self
    }

    pub fn with_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = (S, H)>,
        S: Into<String>,
    {
        self.routes
            .extend(routes.into_iter().map(|(path, handler)| (path.into(), handler)));
        self
    }

    /// Declares a layout for a directory (`/`, `/blog`, `/blog/[slug]`, ...)
    pub fn with_layout(mut self, dir: impl Into<String>, layout: L) -> Self {
        self.layouts.push((dir.into(), layout));
        self
    }

    pub fn with_layouts<I, S>(mut self, layouts: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
    {
        self.layouts
            .extend(layouts.into_iter().map(|(dir, layout)| (dir.into(), layout)));
        self
    }

    pub fn with_options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.options.case_insensitive = case_insensitive;
        self
    }

    /// Compiles every declared path and freezes the table
    ///
    /// Fails on the first invalid pattern, on two routes that compile to the
    /// same segment composition, or on two layouts for the same directory.
    pub fn build(self) -> Result<RouteTable<H, L>, RouteError> {
        let options = self.options;

        let mut routes = self
            .routes
            .into_iter()
            .enumerate()
            .map(|(declared_at, (raw_path, handler))| -> Result<Route<H>, RouteError> {
                Ok(Route {
                    pattern: RoutePattern::compile(&raw_path)?,
                    handler,
                    declared_at,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        check_ambiguity(&routes, options.case_insensitive)?;

        // Stable sort: equal ranks keep declaration order.
        routes.sort_by_key(|route| route.pattern.precedence_rank());

        let mut layouts = HashMap::with_capacity(self.layouts.len());
        for (dir, layout) in self.layouts {
            let pattern = RoutePattern::compile(&dir)?;
            let shape = shape_of(pattern.segments(), options.case_insensitive);
            if layouts.contains_key(&shape) {
                return Err(RouteError::DuplicateLayout { dir });
            }
            layouts.insert(shape, LayoutEntry { dir, layout });
        }

        Ok(RouteTable {
            routes,
            layouts,
            options,
        })
    }
}

fn check_ambiguity<H>(routes: &[Route<H>], case_insensitive: bool) -> Result<(), RouteError> {
    let mut groups: HashMap<Vec<ShapeSegment>, Vec<usize>> = HashMap::new();
    let shapes: Vec<_> = routes
        .iter()
        .map(|route| shape_of(route.pattern.segments(), case_insensitive))
        .collect();

    for (index, shape) in shapes.iter().enumerate() {
        groups.entry(shape.clone()).or_default().push(index);
    }

    // Report the earliest-declared conflict so the error is deterministic.
    match shapes.iter().find_map(|shape| groups.get(shape).filter(|g| g.len() > 1)) {
        Some(group) => Err(RouteError::AmbiguousRoute {
            paths: group
                .iter()
                .map(|&index| routes[index].pattern.raw_path().to_string())
                .collect(),
        }),
        None => Ok(()),
    }
}

/// Compiled, precedence-ordered routes plus the layouts declared by directory
#[derive(Debug)]
pub struct RouteTable<H, L = ()> {
    routes: Vec<Route<H>>,
    pub(crate) layouts: HashMap<Vec<ShapeSegment>, LayoutEntry<L>>,
    options: TableOptions,
}

impl<H> RouteTable<H> {
    /// Builds a table without layouts using default options
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::RouteTable;
    ///
    /// let table = RouteTable::build([("/users/[id]", "user"), ("/users/settings", "settings")]).unwrap();
    ///
    /// let found = table.match_path("/users/settings").unwrap();
    /// assert_eq!(*found.handler(), "settings");
    /// assert!(found.params.is_empty());
    ///
    /// let found = table.match_path("/users/42").unwrap();
    /// assert_eq!(found.params.get_str("id"), Some("42"));
    /// ```
    pub fn build<I, S>(routes: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = (S, H)>,
        S: Into<String>,
    {
        RouteTableBuilder::new().with_routes(routes).build()
    }
}

impl<H, L> RouteTable<H, L> {
    pub fn builder() -> RouteTableBuilder<H, L> {
        RouteTableBuilder::new()
    }

    /// Finds the first route, in precedence order, that matches `path`
    ///
    /// Returns `None` when nothing matches. The query string, if any, must
    /// already be stripped.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_, H>> {
        let parts = split_path(path);
        self.routes.iter().find_map(|route| {
            route
                .pattern
                .match_segments(&parts, self.options.case_insensitive, self.options.decode_params)
                .map(|params| RouteMatch { route, params })
        })
    }

    /// Routes in matching order
    pub fn routes(&self) -> &[Route<H>] {
        &self.routes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn options(&self) -> TableOptions {
        self.options
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }
}
