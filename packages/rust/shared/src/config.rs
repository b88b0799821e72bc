//! Application configuration for kbsync.
//!
//! User config lives at `~/.kbsync/kbsync.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{KbSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "kbsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".kbsync";

// ---------------------------------------------------------------------------
// Config structs (matching kbsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Help-center API settings.
    #[serde(default)]
    pub helpcenter: HelpCenterSection,

    /// Deployment environment.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Which pages participate in sync.
    #[serde(default)]
    pub sync: SyncSection,

    /// Page/revision database.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[helpcenter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpCenterSection {
    /// API root, e.g. `https://example.zendesk.com/api/v2`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the `Authorization` header value
    /// (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Section every article is filed under.
    #[serde(default = "default_section_id")]
    pub section_id: u64,

    /// Locale of created articles and updated translations.
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HelpCenterSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
            section_id: default_section_id(),
            locale: default_locale(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://example.zendesk.com/api/v2".into()
}
fn default_token_env() -> String {
    "KBSYNC_HELPCENTER_TOKEN".into()
}
fn default_section_id() -> u64 {
    360_000_000_000
}
fn default_locale() -> String {
    "en-us".into()
}
fn default_timeout_secs() -> u64 {
    5
}

/// `[environment]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Sync only runs in production; everywhere else it is a no-op.
    #[serde(default)]
    pub production: bool,
}

/// `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Page kind that carries knowledge-base fields.
    #[serde(default = "default_page_kind")]
    pub page_kind: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            page_kind: default_page_kind(),
        }
    }
}

fn default_page_kind() -> String {
    "knowledge_base_page".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database. A leading `~/` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.kbsync/kbsync.db".into()
}

// ---------------------------------------------------------------------------
// Runtime config (resolved once, injected at construction)
// ---------------------------------------------------------------------------

/// Resolved help-center client configuration.
#[derive(Debug, Clone)]
pub struct HelpCenterConfig {
    /// API root without a trailing slash.
    pub base_url: String,
    /// Sent verbatim as the `Authorization` header.
    pub authorization: String,
    pub section_id: u64,
    pub locale: String,
    pub timeout: Duration,
}

impl HelpCenterConfig {
    /// Build a config with the default section, locale, and timeout.
    pub fn new(base_url: &str, authorization: impl Into<String>) -> Result<Self> {
        let section = HelpCenterSection::default();
        Self::from_section(
            &HelpCenterSection {
                base_url: base_url.to_string(),
                ..section
            },
            authorization.into(),
        )
    }

    /// Resolve from app config, reading the token from the configured env var.
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        let var_name = &config.helpcenter.token_env;
        match std::env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => Self::from_section(&config.helpcenter, val),
            _ => Err(KbSyncError::config(format!(
                "help center token not found. Set the {var_name} environment variable \
                 to the full Authorization header value (e.g. \"Bearer <token>\")."
            ))),
        }
    }

    /// Validate a `[helpcenter]` section and pair it with an authorization value.
    pub fn from_section(section: &HelpCenterSection, authorization: String) -> Result<Self> {
        let parsed = Url::parse(&section.base_url).map_err(|e| {
            KbSyncError::config(format!("invalid help center base_url '{}': {e}", section.base_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(KbSyncError::config(format!(
                "help center base_url must be http(s), got '{}'",
                parsed.scheme()
            )));
        }
        if section.timeout_secs == 0 {
            return Err(KbSyncError::config("help center timeout_secs must be positive"));
        }

        Ok(Self {
            base_url: section.base_url.trim_end_matches('/').to_string(),
            authorization,
            section_id: section.section_id,
            locale: section.locale.clone(),
            timeout: Duration::from_secs(section.timeout_secs),
        })
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Orchestrator settings, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Production gate; when false every trigger is skipped.
    pub production: bool,
    /// Page kind that carries knowledge-base fields.
    pub page_kind: String,
}

impl From<&AppConfig> for SyncSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            production: config.environment.production,
            page_kind: config.sync.page_kind.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.kbsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| KbSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.kbsync/kbsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| KbSyncError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| KbSyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| KbSyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| KbSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| KbSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| KbSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("KBSYNC_HELPCENTER_TOKEN"));
        assert!(toml_str.contains("production = false"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.helpcenter.timeout_secs, 5);
        assert_eq!(parsed.helpcenter.locale, "en-us");
        assert_eq!(parsed.sync.page_kind, "knowledge_base_page");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[helpcenter]
base_url = "https://acme.zendesk.com/api/v2/"
section_id = 115000123

[environment]
production = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.helpcenter.section_id, 115000123);
        assert_eq!(config.helpcenter.timeout_secs, 5);
        assert!(config.environment.production);

        let settings = SyncSettings::from(&config);
        assert!(settings.production);
        assert_eq!(settings.page_kind, "knowledge_base_page");
    }

    #[test]
    fn helpcenter_config_trims_trailing_slash() {
        let section = HelpCenterSection {
            base_url: "https://acme.zendesk.com/api/v2/".into(),
            ..HelpCenterSection::default()
        };
        let resolved =
            HelpCenterConfig::from_section(&section, "Bearer abc".into()).expect("resolve");
        assert_eq!(resolved.base_url, "https://acme.zendesk.com/api/v2");
        assert_eq!(resolved.timeout, Duration::from_secs(5));
        assert_eq!(resolved.authorization, "Bearer abc");
    }

    #[test]
    fn helpcenter_config_rejects_bad_url() {
        let section = HelpCenterSection {
            base_url: "not a url".into(),
            ..HelpCenterSection::default()
        };
        let err = HelpCenterConfig::from_section(&section, "Bearer abc".into()).unwrap_err();
        assert!(err.to_string().contains("invalid help center base_url"));

        let section = HelpCenterSection {
            base_url: "ftp://acme.example.com".into(),
            ..HelpCenterSection::default()
        };
        assert!(HelpCenterConfig::from_section(&section, "Bearer abc".into()).is_err());
    }

    #[test]
    fn token_resolution_requires_env_var() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.helpcenter.token_env = "KBSYNC_TEST_NONEXISTENT_TOKEN_12345".into();
        let result = HelpCenterConfig::resolve(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("token not found"));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(
            expand_home("/var/lib/kbsync.db").expect("expand"),
            PathBuf::from("/var/lib/kbsync.db")
        );
    }
}
