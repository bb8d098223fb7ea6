use std::time::{SystemTime, UNIX_EPOCH};

use kiln_model::Content;

use crate::filter::{Filter, FilterContext, FilterError, StepOutcome};
use crate::rules::Params;

/// Appends the compilation time, in seconds since the Unix epoch.
///
/// The output differs on every run, so reps using it are always outdated.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampFilter;

impl Filter for TimestampFilter {
    fn run(
        &self,
        content: &Content,
        params: &Params,
        _ctx: &mut FilterContext<'_>,
    ) -> Result<StepOutcome, FilterError> {
        let text = content
            .as_text()
            .ok_or("timestamp filter cannot run on binary content")?;
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let prefix = params
            .get("prefix")
            .and_then(|v| v.as_str())
            .unwrap_or("\n");
        Ok(StepOutcome::Ready(Content::from(format!("{text}{prefix}{now}"))))
    }

    fn always_outdated(&self) -> bool {
        true
    }
}
