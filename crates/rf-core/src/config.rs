use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use rf_fetch::FetchSettings;
use tracing::warn;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub groups: GroupsConfig,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of cached feeds. Defaults to ~/.local/share/rfeed/feeds/.
    pub cache_dir: Option<String>,
    /// Directory of cached groups. Defaults to ~/.local/share/rfeed/groups/.
    pub group_dir: Option<String>,
    /// Newline-delimited feed sources. Defaults to ~/.local/share/rfeed/sources.txt.
    pub source_list: Option<String>,
}

impl StorageConfig {
    pub fn resolve_cache_dir(&self) -> PathBuf {
        resolve(&self.cache_dir, "feeds")
    }

    pub fn resolve_group_dir(&self) -> PathBuf {
        resolve(&self.group_dir, "groups")
    }

    pub fn resolve_source_list(&self) -> PathBuf {
        resolve(&self.source_list, "sources.txt")
    }
}

/// The configured path, or `name` under the XDG data directory.
fn resolve(custom: &Option<String>, name: &str) -> PathBuf {
    if let Some(custom) = custom {
        return PathBuf::from(custom);
    }

    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("rfeed").join(name)
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound for one fetch, HTTP or command.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Fetches running at once during a refresh. 0 means no limit.
    pub max_concurrent: usize,
    /// Shell used to run command sources as `<shell> -c <line>`.
    pub shell: String,
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_concurrent: 8,
            shell: "sh".to_string(),
            user_agent: None,
        }
    }
}

impl FetchConfig {
    pub fn settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            shell: self.shell.clone(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    /// Limit handed to `for_each_concurrent`; `None` is unbounded.
    pub fn concurrency_limit(&self) -> Option<usize> {
        match self.max_concurrent {
            0 => None,
            n => Some(n),
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupsConfig {
    /// How a group expanded from a single member is flagged.
    pub single_source: MergePolicy,
}

/// Whether engine-produced feeds always count as merged.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum MergePolicy {
    /// Every merge output is merged, whatever its contributor count.
    #[default]
    #[serde(rename = "merged")]
    AlwaysMerged,
    /// A merge output with exactly one contributor is a plain feed.
    #[serde(rename = "plain")]
    ByContributors,
}

impl Config {
    pub fn load_or_default() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to parse config");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("rfeed").join("config.toml")
}
