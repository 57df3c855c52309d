//! Environment variable and home directory expansion for config values.

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Expand `${VAR}`, `${VAR:-default}` and a leading `~` in `value`.
///
/// `field` names the config key for error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

/// Expand a path value. Non-UTF-8 paths are returned unchanged.
pub(crate) fn expand_path(path: &Path, field: &str) -> Result<PathBuf, ConfigError> {
    match path.to_str() {
        Some(value) => expand_env(value, field).map(PathBuf::from),
        None => Ok(path.to_path_buf()),
    }
}
