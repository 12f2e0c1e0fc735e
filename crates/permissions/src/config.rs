use crate::restricted::{RestrictedMethod, RestrictedMethods};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {err}", path.display())]
    Io { path: PathBuf, err: io::Error },
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Configuration of the [`PermissionsController`](crate::PermissionsController).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// File the permissions state is persisted to, kept in memory if unset
    pub state_path: Option<PathBuf>,
    /// Additional restricted methods, name to description, executed by the provider
    pub restricted_methods: BTreeMap<String, String>,
    /// Whether approved accounts must be known to the provider
    pub validate_accounts: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self { state_path: None, restricted_methods: BTreeMap::new(), validate_accounts: true }
    }
}

impl PermissionsConfig {
    /// Reads the config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|err| ConfigError::Io { path: path.to_path_buf(), err })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Config for tests: in memory, no extra methods.
    pub fn test() -> Self {
        Self::default()
    }

    /// Sets the file the state is persisted to
    #[must_use]
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Registers an additional restricted method
    #[must_use]
    pub fn with_restricted_method(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.restricted_methods.insert(name.into(), description.into());
        self
    }

    /// Sets whether approved accounts are checked against the provider
    #[must_use]
    pub fn with_validate_accounts(mut self, validate_accounts: bool) -> Self {
        self.validate_accounts = validate_accounts;
        self
    }

    /// Builds the restricted method registry: the built-in methods plus the configured ones.
    pub fn restricted_methods(&self) -> RestrictedMethods {
        let mut methods = RestrictedMethods::new();
        for (name, description) in &self.restricted_methods {
            methods.register(name.clone(), RestrictedMethod::provider(description.clone()));
        }
        methods
    }
}
