//! TOML-based configuration for the loginpolicy directory.
//!
//! Every section is optional: a missing file or a missing key falls back to
//! the built-in defaults, so the provider works with nothing but a policy
//! file in its default location.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/loginpolicy.toml";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "LOGINPOLICY_CONFIG";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level provider configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Location of the login policy file.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// How account (passwd) entries are rendered.
    #[serde(default)]
    pub accounts: AccountConfig,

    /// How credential-status (shadow) entries are rendered.
    #[serde(default)]
    pub shadow: ShadowConfig,

    /// Aggregate group names and ids.
    #[serde(default)]
    pub groups: GroupConfig,

    /// Log level and optional log file.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Login policy file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Path of the colon-separated policy file.
    #[serde(default = "default_policy_file")]
    pub file: PathBuf,
}

fn default_policy_file() -> PathBuf {
    PathBuf::from("/var/lib/loginpolicy/login_policy")
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            file: default_policy_file(),
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Fixed fields of every account entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Value of the password field (never a real hash).
    #[serde(default = "default_x")]
    pub password_placeholder: String,

    /// Home directories are `<home_base>/<login name>`.
    #[serde(default = "default_home_base")]
    pub home_base: PathBuf,

    /// Login shell of every account.
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_x() -> String {
    "x".into()
}
fn default_home_base() -> PathBuf {
    PathBuf::from("/home")
}
fn default_shell() -> String {
    "/bin/bash".into()
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            password_placeholder: default_x(),
            home_base: default_home_base(),
            shell: default_shell(),
        }
    }
}

impl AccountConfig {
    /// Home directory for a login name. The name is appended as text, so an
    /// absolute name never replaces the base.
    pub fn home_for(&self, login: &str) -> String {
        let base = self.home_base.display().to_string();
        format!("{}/{}", base.trim_end_matches('/'), login)
    }
}

// ---------------------------------------------------------------------------
// Shadow
// ---------------------------------------------------------------------------

/// Fixed fields of every credential-status entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Value of the password field. `*` locks password authentication.
    #[serde(default = "default_locked")]
    pub password_placeholder: String,
}

fn default_locked() -> String {
    "*".into()
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            password_placeholder: default_locked(),
        }
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Names and ids of the two aggregate groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Value of the group password field.
    #[serde(default = "default_x")]
    pub password_placeholder: String,

    /// Group containing every login name.
    #[serde(default = "default_all_users_name")]
    pub all_users_name: String,

    #[serde(default = "default_all_users_gid")]
    pub all_users_gid: u32,

    /// Group containing the login names of superusers.
    #[serde(default = "default_superusers_name")]
    pub superusers_name: String,

    #[serde(default = "default_superusers_gid")]
    pub superusers_gid: u32,
}

fn default_all_users_name() -> String {
    "loginpolicy".into()
}
fn default_all_users_gid() -> u32 {
    10000
}
fn default_superusers_name() -> String {
    "loginpolicy_sudo".into()
}
fn default_superusers_gid() -> u32 {
    10001
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            password_placeholder: default_x(),
            all_users_name: default_all_users_name(),
            all_users_gid: default_all_users_gid(),
            superusers_name: default_superusers_name(),
            superusers_gid: default_superusers_gid(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file used by the NSS module. The module logs nothing when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl DirectoryConfig {
    /// Load a [`DirectoryConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: DirectoryConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load the file if it exists, otherwise return the defaults. The result
    /// is validated either way.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Path of the configuration file: `$LOGINPOLICY_CONFIG` when set and
    /// non-empty, otherwise [`DEFAULT_CONFIG_PATH`].
    pub fn resolve_path() -> PathBuf {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(val) if !val.is_empty() => PathBuf::from(val),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Validate that all fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.file.as_os_str().is_empty() {
            return Err(invalid("policy.file", "policy file path must not be empty"));
        }
        if !self.accounts.home_base.is_absolute() {
            return Err(invalid("accounts.home_base", "home base must be absolute"));
        }
        if !self.accounts.shell.starts_with('/') {
            return Err(invalid("accounts.shell", "shell must be an absolute path"));
        }

        let groups = &self.groups;
        for (field, name) in [
            ("groups.all_users_name", &groups.all_users_name),
            ("groups.superusers_name", &groups.superusers_name),
        ] {
            if name.is_empty() || name.contains(':') {
                return Err(invalid(field, "group name must be non-empty without ':'"));
            }
        }
        if groups.all_users_name == groups.superusers_name {
            return Err(invalid(
                "groups.superusers_name",
                "aggregate group names must differ",
            ));
        }
        if groups.all_users_gid == groups.superusers_gid {
            return Err(invalid(
                "groups.superusers_gid",
                "aggregate group ids must differ",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, detail: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        detail: detail.into(),
    }
}
