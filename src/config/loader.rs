//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file from disk, parse it into an [`EngineConfig`], and run
//! validation before returning. This is the primary entry point for loading
//! engine configuration at startup.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O, parse, and validation failures carry distinguishable messages
//! - The file path is included in every error message
//!
//! ## NOT Responsible For
//! - Defining the config schema (that belongs to `mod.rs`)

use std::path::Path;

use crate::OrchestraError;

use super::EngineConfig;

/// Load an [`EngineConfig`] from a TOML file.
///
/// Reads the file, parses it as TOML, and validates all semantic
/// constraints.
///
/// # Errors
///
/// Returns [`OrchestraError::Config`] if the file cannot be read, the TOML
/// is malformed, or a semantic constraint is violated.
///
/// # Example
///
/// ```rust,ignore
/// use model_orchestra::config::load_from_file;
/// use std::path::Path;
///
/// let config = load_from_file(Path::new("orchestra.toml"))?;
/// ```
pub fn load_from_file(path: &Path) -> Result<EngineConfig, OrchestraError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        OrchestraError::Config(format!("failed to read {}: {e}", path.display()))
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Load an [`EngineConfig`] from a TOML string.
///
/// Useful for testing or embedding configs without file I/O. `source_name`
/// identifies the source in error messages.
///
/// # Errors
///
/// Returns [`OrchestraError::Config`] on parse or validation failure.
pub fn load_from_str(content: &str, source_name: &str) -> Result<EngineConfig, OrchestraError> {
    let config: EngineConfig = toml::from_str(content).map_err(|e| {
        OrchestraError::Config(format!("failed to parse {source_name}: {e}"))
    })?;

    let errors = super::validate(&config);
    if !errors.is_empty() {
        return Err(OrchestraError::Config(format!(
            "invalid config {source_name}: {}",
            errors.join("; ")
        )));
    }

    Ok(config)
}
