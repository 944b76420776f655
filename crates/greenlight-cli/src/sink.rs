use std::path::PathBuf;

use tracing::info;

use greenlight_routing::{RoutingPlan, render};
use greenlight_switch::RoutingSink;

/// Writes the rendered routing configuration to the configured file.
/// Regenerate-and-replace: the file is overwritten whole, never
/// edited in place.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RoutingSink for FileSink {
    fn apply(&self, plan: &RoutingPlan) -> Result<(), String> {
        let rendered = render(plan);
        std::fs::write(&self.path, rendered)
            .map_err(|e| format!("write {}: {e}", self.path.display()))?;
        info!(path = %self.path.display(), teams = plan.descriptors.len(), "routing configuration written");
        Ok(())
    }
}
