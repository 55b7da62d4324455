//! API key resolution from the settings store, runtime `.env`, and process
//! environment.
//!
//! Resolution order: stored setting > `~/.agent-architect/.env` > process env.
//! A missing key is reported before any oracle client is constructed.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;

/// Environment variable names checked for the oracle API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Credential errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// No API key could be resolved from any source.
    #[error("API key is missing; run `agent-architect key set <KEY>` or set GEMINI_API_KEY")]
    Missing,
}

/// Oracle API key. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

impl ApiKey {
    /// Wrap a raw key, rejecting blank values.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Missing`] when `raw` is empty or whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, CredentialError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::Missing);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The raw key, for request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// Resolve the API key from the stored setting, `.env` values, and an
/// environment resolver (injected for testability).
///
/// # Errors
///
/// Returns [`CredentialError::Missing`] when every source is empty.
pub fn resolve_api_key(
    stored: Option<&str>,
    env_file: &BTreeMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ApiKey, CredentialError> {
    if let Some(key) = stored.and_then(|k| ApiKey::new(k).ok()) {
        return Ok(key);
    }
    for var in API_KEY_VARS {
        if let Some(key) = env_file.get(var).and_then(|k| ApiKey::new(k.as_str()).ok()) {
            return Ok(key);
        }
    }
    for var in API_KEY_VARS {
        if let Some(key) = env(var).and_then(|k| ApiKey::new(k).ok()) {
            return Ok(key);
        }
    }
    Err(CredentialError::Missing)
}

/// Load key-value pairs from a `.env` file. A missing file yields an empty map.
///
/// # Errors
///
/// Returns an error if permissions are too broad or parsing fails.
pub fn load_env_file(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    validate_private_permissions(path)?;

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    Ok(vars)
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "credentials file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    Ok(())
}
