// ABOUTME: Configuration types and parsing for otto.yml.
// ABOUTME: Handles YAML parsing, validated fields, and template generation.

mod server;

pub use server::ServerConfig;

use crate::error::{Error, Result};
use crate::types::SiteName;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "otto.yml";
pub const CONFIG_FILENAME_ALT: &str = "otto.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".otto/config.yml";

/// Which version store backend manages releases on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Versions are uploaded tarballs extracted into sibling directories;
    /// pointers are symlinks.
    #[default]
    Tarball,
    /// Versions are tags in a server-side git clone; pointers are
    /// force-moved tags.
    Git,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_site_name")]
    pub site: SiteName,

    #[serde(default)]
    pub backend: BackendKind,

    /// Local directory your build step assembles, staged as-is by the
    /// tarball backend.
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// How many recent versions `cleanup` keeps beyond pointer-referenced ones.
    #[serde(default = "default_retain")]
    pub retain: usize,

    /// Remote directory that holds one subdirectory per site.
    /// `$HOME` is expanded by the remote shell.
    #[serde(default = "default_site_root")]
    pub site_root: String,

    /// Service reloaded after activation (e.g. "apache2", "nginx").
    #[serde(default)]
    pub http_server: Option<String>,

    #[serde(deserialize_with = "deserialize_servers")]
    pub servers: NonEmpty<ServerConfig>,

    /// Required when backend is `git`.
    #[serde(default)]
    pub git: Option<GitConfig>,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitConfig {
    /// Origin URL or path of the repository as seen from the target host.
    pub repo: String,

    /// Server-side working clone that gets checked out on deploy.
    #[serde(default)]
    pub workspace: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Optional build command run in the workspace after checkout.
    #[serde(default)]
    pub build: Option<String>,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("./build")
}

fn default_retain() -> usize {
    3
}

fn default_site_root() -> String {
    "$HOME/otto/sites".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Git && self.git.is_none() {
            return Err(Error::InvalidConfig(
                "backend is `git` but no `git:` section is configured".to_string(),
            ));
        }
        Ok(())
    }

    /// The remote directory holding this site's versions and pointers.
    pub fn site_dir(&self) -> String {
        format!("{}/{}", self.site_root, self.site)
    }

    /// The server-side working clone for the git backend.
    pub fn git_workspace(&self) -> String {
        self.git
            .as_ref()
            .and_then(|g| g.workspace.clone())
            .unwrap_or_else(|| format!("$HOME/otto/workspace/{}", self.site))
    }
}

pub fn init_config(dir: &Path, site: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let site = match site {
        Some(s) => SiteName::new(s).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => SiteName::new("example.com").map_err(|e| Error::InvalidConfig(e.to_string()))?,
    };

    std::fs::write(&config_path, generate_template_yaml(&site))?;

    Ok(())
}

fn generate_template_yaml(site: &SiteName) -> String {
    format!(
        r#"site: {site}
backend: tarball
build_dir: ./build
retain: 3
# http_server: apache2
servers:
  - deploy@{site}
# For the git backend instead:
# backend: git
# git:
#   repo: /srv/git/{site}.git
#   branch: master
"#
    )
}

// Custom deserializers

fn deserialize_site_name<'de, D>(deserializer: D) -> std::result::Result<SiteName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    SiteName::new(&s).map_err(serde::de::Error::custom)
}

fn deserialize_servers<'de, D>(
    deserializer: D,
) -> std::result::Result<NonEmpty<ServerConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<ServerEntry> = Vec::deserialize(deserializer)?;
    let servers = values
        .into_iter()
        .map(|entry| entry.into_server_config())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)?;

    NonEmpty::from_vec(servers)
        .ok_or_else(|| serde::de::Error::custom("at least one server is required"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServerEntry {
    Simple(String),
    Detailed(ServerConfig),
}

impl ServerEntry {
    fn into_server_config(self) -> std::result::Result<ServerConfig, String> {
        match self {
            ServerEntry::Simple(s) => ServerConfig::parse(&s),
            ServerEntry::Detailed(c) => Ok(c),
        }
    }
}
