//! Source registry for the ordered multi-source fallback.
//!
//! - `priority` - Normalizes the configured source order and resolves it
//!   against the registered sources
//! - `validator` - Plausibility filtering of returned prices
//! - `registry` - The fallback walk itself

mod priority;
mod registry;
mod validator;

pub use priority::{resolve_priority, resolve_sources, SourcePriority, DEFAULT_SOURCE_PRIORITY};
pub use registry::{SourceRegistry, DEFAULT_SOURCE_TIMEOUT};
pub use validator::{PlausibilityValidator, ValidatorConfig, DEFAULT_MIN_PLAUSIBLE_PRICE};
