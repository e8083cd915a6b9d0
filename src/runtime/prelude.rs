//! The JavaScript runtime prelude shipped with the crate.

use std::path::Path;

use crate::StepwiseResult;

/// Defines `__stepwiseRecord` and wraps the host's suite/case declarators.
pub const PRELUDE_JS: &str = include_str!("prelude.js");

/// Environment variable naming the event file the prelude appends to.
pub const EVENTS_ENV: &str = "STEPWISE_EVENTS";

pub fn write_prelude(path: &Path) -> StepwiseResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, PRELUDE_JS)?;
    tracing::debug!(path = %path.display(), "wrote prelude");
    Ok(())
}
