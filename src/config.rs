use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Command;
use crate::coordinator::DEFAULT_REFRESH_DELAY;
use crate::fetch::Backoff;
use crate::fetch::backoff::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::fetch::fanout::DEFAULT_CONCURRENCY;
use crate::model::Tags;
use crate::service::ListFilter;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Config {
    pub version: u32,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "backoff_base_ms")]
    pub backoff_base: Duration,
    pub concurrency: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "previous_refresh_delay_ms")]
    pub previous_refresh_delay: Duration,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct ReplayConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "latency_ms")]
    pub latency: Duration,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct UiConfig {
    pub show_help: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_filter: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            fetch: FetchConfig::default(),
            replay: ReplayConfig::default(),
            ui: UiConfig::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BASE_DELAY,
            concurrency: DEFAULT_CONCURRENCY,
            previous_refresh_delay: DEFAULT_REFRESH_DELAY,
        }
    }
}

impl FetchConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.max_attempts, self.backoff_base)
    }
}

/// Filters the listing runs with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub filter: ListFilter,
    /// Applied to every column of the listing, on top of `filter`
    pub extra_filter: Option<String>,
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "pipescope")
        .context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("pipescope.toml"))
}

pub fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("pipescope"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pipescope.log")
}

/// Expand a leading `~` to the home directory
pub fn expand_path(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn validate(filter: ListFilter) -> Result<ListFilter> {
    if filter.has_tags() && filter.name.is_none() {
        bail!("Filtering only on tags is not supported, please provide a name filter as well");
    }
    Ok(filter)
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            let default_config = Config::default();
            // Create directory if it doesn't exist
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            default_config.save(&path)?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Work out the listing filters from the subcommand
    pub fn selection(&self, command: Option<&Command>) -> Result<Selection> {
        match command {
            None | Some(Command::Profiles) => Ok(Selection::default()),
            Some(Command::Run { name_filter, tags }) => Ok(Selection {
                filter: validate(ListFilter {
                    name: name_filter.clone(),
                    tags: tags.iter().cloned().collect(),
                })?,
                extra_filter: None,
            }),
            Some(Command::Load {
                profile,
                extra_filter,
            }) => {
                let Some(found) = self.profiles.get(profile) else {
                    bail!("Unknown profile: {profile}");
                };
                let filter = validate(ListFilter {
                    name: found.name_filter.clone(),
                    tags: found.tags.clone(),
                })
                .with_context(|| format!("Invalid profile: {profile}"))?;
                Ok(Selection {
                    filter,
                    extra_filter: extra_filter.clone(),
                })
            }
        }
    }
}
