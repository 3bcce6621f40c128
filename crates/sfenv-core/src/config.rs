use std::env;
use std::path::{Path, PathBuf};

use crate::command::SessionCommand;

/// Env file written by the exporter and read by the query runner.
pub const DEFAULT_ENV_FILE: &str = ".env";
/// REST API version used when none is requested explicitly.
pub const DEFAULT_API_VERSION: &str = "59.0";

pub const INSTANCE_URL_VAR: &str = "INSTANCE_URL";
pub const ACCESS_TOKEN_VAR: &str = "ACCESS_TOKEN";

/// Settings for a session export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub command: SessionCommand,
    pub env_file: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            command: default_session_command(),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
        }
    }
}

impl ExportConfig {
    pub fn with_env_file(mut self, path: impl AsRef<Path>) -> Self {
        self.env_file = path.as_ref().to_path_buf();
        self
    }
}

/// `sf org display user --json`, forced into JSON output.
pub fn default_session_command() -> SessionCommand {
    SessionCommand::new("sf", ["org", "display", "user", "--json"]).env("SF_CONTENT_TYPE", "JSON")
}

/// Values needed to open a connection to the org's REST API.
///
/// Nothing here is validated: an empty or malformed value only surfaces once the
/// connection is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub instance_url: String,
    pub access_token: String,
    pub api_version: String,
}

impl ConnectionSettings {
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_owned(),
        }
    }

    /// Read `INSTANCE_URL` and `ACCESS_TOKEN` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(
            lookup(INSTANCE_URL_VAR).unwrap_or_default(),
            lookup(ACCESS_TOKEN_VAR).unwrap_or_default(),
        )
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        let trimmed = version.trim().trim_start_matches(['v', 'V']);
        if !trimmed.is_empty() {
            self.api_version = trimmed.to_owned();
        }
        self
    }
}
