//! # RHTMX Router
//!
//! Compiles file-based route declarations into an immutable, precedence-ordered
//! route table:
//! - Static segments (`/about`)
//! - Dynamic segments (`/users/[id]`)
//! - Catch-all segments (`/docs/[...slug]`, one or more trailing segments)
//! - Nested layouts declared per directory
//! - Path globs for middleware matchers (`/api/*`)
//!
//! ## Precedence
//!
//! Every segment gets a weight (static 0, dynamic 1, catch-all 2) and the
//! weights are packed into a single `u64`, first segment most significant.
//! Sorting by that rank makes static beat dynamic beat catch-all at the first
//! differing position, whatever order the routes were declared in. Two routes
//! with the same composition are rejected at build time.
//!
//! ## Example
//!
//! ```
//! use rhtmx_router::{ParamValue, RouteTable};
//!
//! let table = RouteTable::build([
//!     ("/blog/[slug]", "post"),
//!     ("/blog/featured", "featured"),
//!     ("/docs/[...path]", "docs"),
//! ])
//! .unwrap();
//!
//! assert_eq!(*table.match_path("/blog/featured").unwrap().handler(), "featured");
//!
//! let found = table.match_path("/docs/guide/intro").unwrap();
//! assert_eq!(
//!     found.params.get("path"),
//!     Some(&ParamValue::Many(vec!["guide".into(), "intro".into()]))
//! );
//! ```

mod error;
pub mod layout;
pub mod path;
pub mod route;
mod table;

pub use error::{PatternIssue, RouteError};
pub use layout::{LayoutChain, LayoutFrame, LayoutNode, LayoutOption};
pub use path::{split_path, Ancestry, PathGlob};
pub use route::{classify_segment, ParamValue, Params, RoutePattern, Segment, MAX_SEGMENTS};
pub use table::{Route, RouteMatch, RouteTable, RouteTableBuilder, TableOptions};
