/// Route compilation: typed segments, precedence ranks and bound parameters
///
/// Everything here is pure and runs once per declared path; the results are
/// read concurrently by every request afterwards.

pub mod params;
pub mod pattern;

pub use params::{ParamValue, Params};
pub use pattern::{classify_segment, RoutePattern, Segment, MAX_SEGMENTS};
