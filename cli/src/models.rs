//! Table model files for `migrate plan` and `migrate apply`.

use std::path::Path;

use anyhow::{Context, bail};
use tenancy::{Metadata, ModelFile};

/// Reads a TOML or YAML model file and builds its metadata collection,
/// validating every table marked for RLS.
pub fn load(path: &Path) -> anyhow::Result<Metadata> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let file: ModelFile = match extension.as_deref() {
        Some("toml") => toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        Some("yaml" | "yml") => serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        _ => bail!(
            "Unsupported model file {}: expected .toml, .yaml or .yml",
            path.display()
        )
    };

    Ok(Metadata::from_model_file(file)?)
}
