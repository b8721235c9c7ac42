//! Loading spec documents from disk

use crate::error::{Error, Result};
use crate::model::ApiSpec;
use std::path::Path;
use tracing::debug;

/// Read a YAML or JSON spec document
pub fn load_spec(path: impl AsRef<Path>) -> Result<ApiSpec> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| Error::SpecResourceNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), bytes = text.len(), "Loaded spec document");

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&text)
            .map_err(|e| Error::InvalidSpec(format!("{}: {e}", path.display())))
    } else {
        parse_spec(&text).map_err(|e| match e {
            Error::InvalidSpec(msg) => Error::InvalidSpec(format!("{}: {msg}", path.display())),
            other => other,
        })
    }
}

/// Parse a YAML (or JSON, which is valid YAML) spec document
pub fn parse_spec(text: &str) -> Result<ApiSpec> {
    serde_yaml::from_str(text).map_err(|e| Error::InvalidSpec(e.to_string()))
}
