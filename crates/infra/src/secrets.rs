//! Provider API key lookup from a key file or the environment
//!
//! The key is read on every call so a rotated key file is picked up by the
//! next round without a restart. Key material is never logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use paysched_core::SecretProvider;
use paysched_domain::{PaySchedError, Result, SecretSource};
use tracing::debug;

/// Build the provider described by `source`.
pub fn from_source(source: &SecretSource) -> Arc<dyn SecretProvider> {
    match source {
        SecretSource::File { path } => Arc::new(FileSecretProvider::new(path.clone())),
        SecretSource::Env { var } => Arc::new(EnvSecretProvider::new(var.clone())),
    }
}

/// Reads the first line of a key file, trimmed.
#[derive(Debug, Clone)]
pub struct FileSecretProvider {
    path: PathBuf,
}

impl FileSecretProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SecretProvider for FileSecretProvider {
    async fn api_key(&self) -> Result<String> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PaySchedError::Secret(format!("Failed to read key file {}: {e}", self.path.display()))
        })?;

        let key = contents.lines().next().map(str::trim).unwrap_or_default();
        if key.is_empty() {
            return Err(PaySchedError::Secret(format!(
                "Key file {} is empty",
                self.path.display()
            )));
        }

        debug!(path = %self.path.display(), "Loaded provider key from file");
        Ok(key.to_string())
    }
}

/// Reads the key from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    var: String,
}

impl EnvSecretProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn api_key(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            Ok(_) => Err(PaySchedError::Secret(format!("{} is empty", self.var))),
            Err(_) => Err(PaySchedError::Secret(format!("{} is not set", self.var))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[tokio::test]
    async fn file_provider_reads_first_trimmed_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  sk_test_abc  ").unwrap();
        writeln!(file, "ignored").unwrap();

        let provider = FileSecretProvider::new(file.path());
        assert_eq!(provider.api_key().await.unwrap(), "sk_test_abc");
    }

    #[tokio::test]
    async fn file_provider_rejects_missing_or_empty_file() {
        let missing = FileSecretProvider::new("/nonexistent/StripeApiKey.txt");
        assert!(matches!(missing.api_key().await, Err(PaySchedError::Secret(_))));

        let empty = NamedTempFile::new().unwrap();
        let provider = FileSecretProvider::new(empty.path());
        assert!(matches!(provider.api_key().await, Err(PaySchedError::Secret(_))));
    }

    #[tokio::test]
    async fn env_provider_reports_unset_variable() {
        let provider = EnvSecretProvider::new("PAYSCHED_TEST_KEY_THAT_IS_NEVER_SET");
        let error = provider.api_key().await.unwrap_err();
        assert!(error.to_string().contains("is not set"));
    }

    #[tokio::test]
    async fn from_source_picks_file_provider() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sk_live_xyz").unwrap();

        let provider = from_source(&SecretSource::File { path: file.path().to_path_buf() });
        assert_eq!(provider.api_key().await.unwrap(), "sk_live_xyz");
    }
}
