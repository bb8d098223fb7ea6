use kiln_model::Content;

use crate::filter::{Filter, FilterContext, FilterError, StepOutcome};
use crate::rules::Params;

/// Strips leading and trailing whitespace. Binary content passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimFilter;

impl Filter for TrimFilter {
    fn run(
        &self,
        content: &Content,
        _params: &Params,
        _ctx: &mut FilterContext<'_>,
    ) -> Result<StepOutcome, FilterError> {
        Ok(StepOutcome::Ready(match content.as_text() {
            Some(text) => Content::from(text.trim()),
            None => content.clone(),
        }))
    }
}
