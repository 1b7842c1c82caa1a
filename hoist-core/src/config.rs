//! Configuration file layout
//!
//! Hoist reads a single JSON file, `hoist.json`, from the project being
//! deployed (or from its `config/` directory). The file lists the build
//! commands to run locally and every environment the project can be deployed
//! to. Selecting an environment resolves it into an immutable
//! [`Environment`] that the pipeline is built from.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::VERSION;
use crate::domain::{Environment, Target};

/// File name looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "hoist.json";

/// Project deploy configuration, as stored in `hoist.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Hoist version the file was written for
    #[serde(default)]
    pub hoist_version: String,

    pub environments: Vec<EnvironmentConfig>,

    /// Local tree uploaded as the application payload
    #[serde(default = "default_built_app_dir")]
    pub built_app_dir: String,

    /// Local tree uploaded as static assets
    #[serde(default = "default_built_assets_dir")]
    pub built_assets_dir: String,

    #[serde(default)]
    pub app_build_commands: Vec<String>,

    #[serde(default)]
    pub asset_build_commands: Vec<String>,

    /// How many releases to keep on the server, the new one included
    #[serde(default = "default_keep_releases")]
    pub keep_releases: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campfire: Option<CampfireConfig>,
}

/// One named environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    #[serde(default)]
    pub deploydir: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_deploy_command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_deploy_remote_command: Option<String>,
}

/// One server entry of an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub ip: String,
    pub user: String,
    pub port: String,
}

/// Campfire chat room announcements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampfireConfig {
    pub account: String,
    pub token: String,
    /// Comma-separated numeric room ids
    pub rooms: String,
}

impl CampfireConfig {
    /// Whether every field is filled in
    pub fn is_complete(&self) -> bool {
        !self.account.is_empty() && !self.token.is_empty() && !self.rooms.is_empty()
    }

    /// Parses [`CampfireConfig::rooms`] into room ids
    pub fn room_ids(&self) -> Result<Vec<u64>> {
        self.rooms
            .split(',')
            .map(str::trim)
            .filter(|room| !room.is_empty())
            .map(|room| {
                room.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidRoomId(room.to_string()))
            })
            .collect()
    }
}

fn default_built_app_dir() -> String {
    "dist".to_string()
}

fn default_built_assets_dir() -> String {
    "public/assets".to_string()
}

fn default_keep_releases() -> usize {
    5
}

impl Config {
    /// Finds the configuration file for the project rooted at `dir`
    ///
    /// Looks for `hoist.json`, then `config/hoist.json`.
    pub fn locate(dir: impl AsRef<Path>) -> Result<PathBuf> {
        let searched = vec![
            dir.as_ref().join(CONFIG_FILE_NAME),
            dir.as_ref().join("config").join(CONFIG_FILE_NAME),
        ];

        searched
            .iter()
            .find(|path| path.is_file())
            .cloned()
            .ok_or(ConfigError::NotFound { searched })
    }

    /// Reads and parses the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        contents.parse()
    }

    /// Checks project-wide settings
    ///
    /// Environment-specific checks happen in [`Config::environment`].
    pub fn validate(&self) -> Result<()> {
        if self.app_build_commands.is_empty() && self.asset_build_commands.is_empty() {
            return Err(ConfigError::NoBuildCommands);
        }

        if self.hoist_version.is_empty() {
            return Err(ConfigError::Unversioned);
        }

        if self.hoist_version != VERSION {
            return Err(ConfigError::VersionMismatch {
                required: self.hoist_version.clone(),
                running: VERSION.to_string(),
            });
        }

        if self.keep_releases == 0 {
            return Err(ConfigError::InvalidKeepReleases);
        }

        if let Some(campfire) = &self.campfire {
            campfire.room_ids()?;
        }

        Ok(())
    }

    /// Selects the environment called `name` and resolves it
    pub fn environment(&self, name: &str) -> Result<Environment> {
        let env = self
            .environments
            .iter()
            .find(|env| env.name == name)
            .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_string()))?;

        if env.deploydir.trim().is_empty() {
            return Err(ConfigError::MissingDeployDir(env.name.clone()));
        }

        // Single-server environments only
        let server = match env.servers.as_slice() {
            [server] => server,
            servers => {
                return Err(ConfigError::ServerCount {
                    environment: env.name.clone(),
                    count: servers.len(),
                });
            }
        };

        let port = server
            .port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort {
                environment: env.name.clone(),
                port: server.port.clone(),
            })?;

        Ok(Environment {
            name: env.name.clone(),
            target: Target::new(server.ip.clone(), server.user.clone(), port),
            deploy_root: env.deploydir.clone(),
            restart_command: non_empty(&env.restart_command),
            after_deploy_command: non_empty(&env.after_deploy_command),
            after_deploy_remote_command: non_empty(&env.after_deploy_remote_command),
        })
    }

    /// Campfire settings, if present and filled in
    pub fn campfire(&self) -> Option<&CampfireConfig> {
        self.campfire.as_ref().filter(|campfire| campfire.is_complete())
    }

    /// Example configuration written by `hoist init`
    pub fn sample() -> Self {
        Self {
            hoist_version: VERSION.to_string(),
            environments: vec![
                EnvironmentConfig {
                    name: "staging".to_string(),
                    servers: vec![ServerConfig {
                        ip: "127.0.0.1".to_string(),
                        user: "deployment".to_string(),
                        port: "22".to_string(),
                    }],
                    deploydir: "/var/www/myapp".to_string(),
                    restart_command: Some(
                        "(sudo stop myapp_staging || true) && sudo start myapp_staging"
                            .to_string(),
                    ),
                    after_deploy_command: None,
                    after_deploy_remote_command: None,
                },
                EnvironmentConfig {
                    name: "production".to_string(),
                    servers: vec![ServerConfig {
                        ip: "www.myapp.com".to_string(),
                        user: "deployment".to_string(),
                        port: "22".to_string(),
                    }],
                    deploydir: "/var/www/myapp".to_string(),
                    restart_command: Some(
                        "(sudo stop myapp_production || true) && sudo start myapp_production"
                            .to_string(),
                    ),
                    after_deploy_command: Some("make cleanup".to_string()),
                    after_deploy_remote_command: None,
                },
            ],
            built_app_dir: default_built_app_dir(),
            built_assets_dir: default_built_assets_dir(),
            app_build_commands: vec!["make linux64bit".to_string()],
            asset_build_commands: vec![
                "make css_assets_gzip".to_string(),
                "make js_assets_gzip".to_string(),
            ],
            keep_releases: default_keep_releases(),
            campfire: Some(CampfireConfig {
                account: "mycampfireaccount".to_string(),
                token: "foobarfoobarfoobar".to_string(),
                rooms: "8343,234223".to_string(),
            }),
        }
    }

    /// Pretty-printed JSON, as written to disk
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Writes the configuration to `path`, refusing to replace an existing file
    pub fn write_new(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }

        let mut contents = self.to_json_pretty()?;
        contents.push('\n');

        fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(ConfigError::Parse)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|value| !value.trim().is_empty())
        .cloned()
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find a configuration file (looked at {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("invalid configuration file: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("no app_build_commands or asset_build_commands configured")]
    NoBuildCommands,

    #[error("configuration is unversioned, add \"hoist_version\": \"{}\"", VERSION)]
    Unversioned,

    #[error("configuration requires hoist {required} but this is hoist {running}")]
    VersionMismatch { required: String, running: String },

    #[error("keep_releases must be at least 1")]
    InvalidKeepReleases,

    #[error("environment '{0}' not found")]
    UnknownEnvironment(String),

    #[error("environment '{0}' has no deploydir")]
    MissingDeployDir(String),

    #[error("environment '{environment}' must list exactly one server, found {count}")]
    ServerCount { environment: String, count: usize },

    #[error("environment '{environment}' has an invalid port '{port}'")]
    InvalidPort { environment: String, port: String },

    #[error("campfire room id '{0}' is not a number")]
    InvalidRoomId(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for configuration operations
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
