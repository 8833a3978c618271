//! Market data models
//!
//! - `quote` - The Quote value and its as-of point (instant or date)
//! - `source` - Identifiers of the built-in quote sources

mod quote;
mod source;

pub use quote::{AsOf, Quote};
pub use source::SourceKind;
