//! Built-in filters.

mod template;
mod timestamp;
mod trim;

pub use template::{TemplateError, TemplateFilter};
pub use timestamp::TimestampFilter;
pub use trim::TrimFilter;

use crate::filter::FilterRegistry;

/// Registers `template`, `trim` and `timestamp`.
pub fn register_builtins(registry: &mut FilterRegistry) {
    registry.register("template", TemplateFilter);
    registry.register("trim", TrimFilter);
    registry.register("timestamp", TimestampFilter);
}
