//! Connection profile file.
//!
//! ```yaml
//! connections:
//!   default:
//!     endpoint: "http://localhost:8081"
//!   prod:
//!     endpoint: "https://fga.internal:8081"
//!     store_id: "01HXYZ..."
//!     api_token: "secret"
//! ```

use fga_acl::{AclError, ConnectionProfile, FgaConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_PROFILES_FILE: &str = "fga-acl.yaml";

/// Name used when `--connection` is not given.
pub const DEFAULT_CONNECTION: &str = "default";

/// Named connection profiles.
#[derive(Debug, Default, Deserialize)]
pub struct ProfilesFile {
    #[serde(default)]
    pub connections: BTreeMap<String, FgaConfig>,
    /// Where the profiles were loaded from, `None` when no file was found.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl ProfilesFile {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AclError> {
        serde_yaml::from_str(yaml).map_err(|e| AclError::Configuration(e.to_string()))
    }

    /// Load the profiles from `path`, or from [`DEFAULT_PROFILES_FILE`] if it exists.
    ///
    /// An explicit path must exist. A missing default file yields no profiles.
    pub fn load(path: Option<&Path>) -> Result<Self, AclError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_PROFILES_FILE);
                if !default.exists() {
                    tracing::debug!("no {} found, using environment only", DEFAULT_PROFILES_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            AclError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut profiles = Self::from_yaml_str(&content)?;
        profiles.source = Some(path);
        Ok(profiles)
    }

    /// Resolve `name`, filling unset fields from the process environment.
    pub fn profile(&self, name: &str) -> Result<ConnectionProfile, AclError> {
        self.profile_with(name, |key| std::env::var(key).ok())
    }

    /// Resolve `name`, filling unset fields from `lookup`.
    ///
    /// The default connection may be configured through the environment
    /// alone. Any other name must be declared in the file.
    pub fn profile_with(
        &self,
        name: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ConnectionProfile, AclError> {
        let config = match self.connections.get(name) {
            Some(config) => config.clone(),
            None if name == DEFAULT_CONNECTION => FgaConfig::default(),
            None => {
                return Err(AclError::Configuration(format!(
                    "unknown connection '{}'",
                    name
                )))
            }
        };
        let config = config.with_fallback(lookup);
        config.validate()?;
        Ok(ConnectionProfile::new(name, config))
    }

    /// Declared connection names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }
}
