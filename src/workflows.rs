//! Bundled workflow variants and workflow file resolution

use std::path::Path;

use action_flow::Workflow;
use anyhow::{Context, Result};
use tracing::debug;

/// Workflow variants shipped with the binary, by name
pub const BUNDLED: &[(&str, &str)] = &[
    ("vendor-modal", include_str!("../workflows/vendor-modal.yaml")),
    ("vendor-back", include_str!("../workflows/vendor-back.yaml")),
    ("vendor-loop", include_str!("../workflows/vendor-loop.yaml")),
    ("rdash-full", include_str!("../workflows/rdash-full.yaml")),
];

pub fn bundled_source(name: &str) -> Option<&'static str> {
    BUNDLED
        .iter()
        .find(|(bundled, _)| *bundled == name)
        .map(|(_, source)| *source)
}

/// Parse and validate every bundled variant
pub fn bundled() -> Result<Vec<Workflow>> {
    BUNDLED
        .iter()
        .map(|(name, source)| {
            Workflow::from_yaml(source).with_context(|| format!("Bundled workflow '{}'", name))
        })
        .collect()
}

/// Load a bundled variant by name, or a workflow file by path
pub fn resolve(name_or_path: &str) -> Result<Workflow> {
    if let Some(source) = bundled_source(name_or_path) {
        debug!(workflow = name_or_path, "Using bundled workflow");
        return Workflow::from_yaml(source)
            .with_context(|| format!("Bundled workflow '{}'", name_or_path));
    }

    let path = Path::new(name_or_path);
    let source = std::fs::read_to_string(path).with_context(|| {
        format!(
            "'{}' is neither a bundled workflow ({}) nor a readable file",
            name_or_path,
            BUNDLED
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;
    debug!(path = %path.display(), "Loaded workflow file");
    Workflow::from_yaml(&source)
        .with_context(|| format!("Invalid workflow file {}", path.display()))
}
