//! TOML configuration parsing.
//!
//! The configuration is loaded once by the CLI and passed by reference to
//! every component. [`load_config`] is the only place that reads process
//! state: it resolves `remote.client_secret_env` into a concrete secret so
//! nothing downstream touches the environment. An unset variable is not a
//! load error; it surfaces when a token is first requested.
//!
//! ```toml
//! [remote]
//! resource_url = "https://org.crm.dynamics.com"
//! tenant_id = "00000000-0000-0000-0000-000000000000"
//! client_id = "00000000-0000-0000-0000-000000000000"
//! client_secret_env = "VSYNC_CLIENT_SECRET"
//!
//! [paths]
//! source_csv = "data/structured_to_upload/vendor_spend.csv"
//! documents_dir = "data/contracts_to_upload"
//! output_csv = "data/structured/vendor_spend.csv"
//! output_documents_dir = "data/contracts"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub remote: RemoteConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

#[derive(Deserialize, Clone)]
pub struct RemoteConfig {
    /// Organization URL, e.g. `https://org.crm.dynamics.com`.
    pub resource_url: String,
    pub tenant_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Name of an environment variable holding the client secret.
    #[serde(default)]
    pub client_secret_env: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    /// Transport timeout. Unset means the HTTP client's default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

// Hand-written so the secret never ends up in logs.
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("resource_url", &self.resource_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("client_secret_env", &self.client_secret_env)
            .field("api_version", &self.api_version)
            .field("authority_host", &self.authority_host)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_api_version() -> String {
    "v9.2".to_string()
}
fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

impl RemoteConfig {
    /// Base URL of the entity API, e.g. `https://org.crm.dynamics.com/api/data/v9.2`.
    pub fn api_base(&self) -> String {
        format!(
            "{}/api/data/{}",
            self.resource_url.trim_end_matches('/'),
            self.api_version
        )
    }

    /// OAuth2 token endpoint for the configured tenant.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// Scope requested for the client-credentials grant.
    pub fn scope(&self) -> String {
        format!("{}/.default", self.resource_url.trim_end_matches('/'))
    }

    /// The resolved client secret, if any.
    ///
    /// A missing secret only matters once a token is requested, so commands
    /// that never contact the remote store (`backfill --dry-run`) run without one.
    pub fn secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Why [`RemoteConfig::secret`] is absent.
    pub fn missing_secret_message(&self) -> String {
        match &self.client_secret_env {
            Some(var) => format!("{} environment variable not set", var),
            None => "Missing credentials: set remote.client_secret or remote.client_secret_env"
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Tabular source read by backfill and cleanup.
    pub source_csv: PathBuf,
    /// Contract documents uploaded by backfill.
    pub documents_dir: PathBuf,
    /// Tabular output written by extract.
    pub output_csv: PathBuf,
    /// Contract documents downloaded by extract.
    pub output_documents_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    /// Recognized document extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Token planted in fixture filenames, stripped before name resolution.
    #[serde(default = "default_fixture_marker")]
    pub fixture_marker: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            fixture_marker: default_fixture_marker(),
        }
    }
}

fn default_extension() -> String {
    "pdf".to_string()
}
fn default_fixture_marker() -> String {
    "{trap}".to_string()
}

impl DocumentsConfig {
    /// Whether `filename` carries the recognized extension (case-insensitive).
    pub fn is_document(&self, filename: &str) -> bool {
        let suffix = format!(".{}", self.extension.to_ascii_lowercase());
        filename.to_ascii_lowercase().ends_with(&suffix)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.remote.resolve_secret(|name| std::env::var(name).ok());
    Ok(config)
}

/// Parse and validate configuration text without resolving the secret.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    let remote = &config.remote;
    if !remote.resource_url.starts_with("http://") && !remote.resource_url.starts_with("https://")
    {
        bail!("remote.resource_url must be an http(s) URL");
    }
    if remote.tenant_id.trim().is_empty() || remote.client_id.trim().is_empty() {
        bail!("remote.tenant_id and remote.client_id must be set");
    }
    if remote.client_secret.is_some() && remote.client_secret_env.is_some() {
        bail!("Set only one of remote.client_secret and remote.client_secret_env");
    }

    let ext = &config.documents.extension;
    if ext.is_empty() || ext.starts_with('.') {
        bail!("documents.extension must be a bare extension like \"pdf\"");
    }

    Ok(config)
}

impl RemoteConfig {
    fn resolve_secret(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.client_secret.is_some() {
            return;
        }
        if let Some(var) = self.client_secret_env.as_deref() {
            self.client_secret = lookup(var).filter(|s| !s.is_empty());
        }
    }
}
