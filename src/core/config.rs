//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.rainbow/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::StreamOptions;
use crate::feed::twitter::{DEFAULT_API_BASE_URL, DEFAULT_STREAM_BASE_URL};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RainbowConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub home_tweet_count: Option<u32>,
    pub search_max_record: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TwitterConfig {
    pub bearer_token: Option<String>,
    pub credentials_file: Option<String>,
    pub api_base_url: Option<String>,
    pub stream_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Seconds.
    pub timeout: Option<u64>,
    /// Seconds.
    pub heartbeat_timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    pub id_map_path: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_HOME_TWEET_COUNT: u32 = 5;
pub const DEFAULT_SEARCH_MAX_RECORD: usize = 5;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 90;
const DEFAULT_CREDENTIALS_FILE: &str = ".rainbow_oauth";

// ============================================================================
// CLI overrides
// ============================================================================

/// Values given on the command line (None = not specified).
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub timeout: Option<u64>,
    pub heartbeat_timeout: Option<u64>,
    pub no_block: bool,
    pub track_keywords: Option<String>,
}

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub bearer_token: Option<String>,
    pub api_base_url: String,
    pub stream_base_url: String,
    pub home_tweet_count: u32,
    pub search_max_record: usize,
    pub stream: StreamOptions,
    pub id_map_path: Option<PathBuf>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// A value is present but out of range.
    Invalid(String),
    MissingCredentials,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
            ConfigError::MissingCredentials => write!(
                f,
                "no bearer token: set RAINBOW_BEARER_TOKEN, [twitter] bearer_token, or write it to ~/{DEFAULT_CREDENTIALS_FILE}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

fn rainbow_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".rainbow"))
}

/// Returns the path to `~/.rainbow/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    rainbow_dir().map(|d| d.join("config.toml"))
}

/// Load config from `path`, or `~/.rainbow/config.toml` when `None`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `RainbowConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config(path: Option<&Path>) -> Result<RainbowConfig, ConfigError> {
    let path = match path.map(Path::to_path_buf).or_else(config_path) {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(RainbowConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(RainbowConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: RainbowConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    // Don't log the token
    debug!(
        "Config: general={:?} stream={:?} storage={:?}",
        config.general, config.stream, config.storage
    );
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Rainbow Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# home_tweet_count = 5               # "home" / "view" without a count
# search_max_record = 5              # results shown by "s #tag"

# [twitter]
# bearer_token = "AAAA..."           # Or set RAINBOW_BEARER_TOKEN env var
# credentials_file = "~/.rainbow_oauth"
# api_base_url = "https://api.twitter.com/1.1"
# stream_base_url = "https://userstream.twitter.com/1.1"

# [stream]
# timeout = 30                       # seconds; --timeout
# heartbeat_timeout = 90             # seconds; --heartbeat-timeout

# [storage]
# id_map_path = "~/.rainbow/ids.jsonl"
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// Stream timeouts of zero seconds are rejected wherever they come from.
pub fn resolve(config: &RainbowConfig, cli: &CliOverrides) -> Result<ResolvedConfig, ConfigError> {
    // Token: env → inline config → credentials file
    let bearer_token = std::env::var("RAINBOW_BEARER_TOKEN")
        .ok()
        .or_else(|| config.twitter.bearer_token.clone())
        .or_else(|| read_credentials_file(config))
        .filter(|t| !t.trim().is_empty());

    // Base URLs: env → config → default
    let api_base_url = std::env::var("RAINBOW_API_BASE_URL")
        .ok()
        .or_else(|| config.twitter.api_base_url.clone())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let stream_base_url = std::env::var("RAINBOW_STREAM_BASE_URL")
        .ok()
        .or_else(|| config.twitter.stream_base_url.clone())
        .unwrap_or_else(|| DEFAULT_STREAM_BASE_URL.to_string());

    // Id map: env → config → ~/.rainbow/ids.jsonl
    let id_map_path = std::env::var("RAINBOW_ID_MAP")
        .ok()
        .or_else(|| config.storage.id_map_path.clone())
        .map(|p| expand_home(&p))
        .or_else(crate::core::idmap::default_path);

    // Stream: CLI → config → default
    let timeout = cli.timeout.or(config.stream.timeout);
    if timeout == Some(0) {
        return Err(ConfigError::Invalid(
            "stream timeout must be at least 1 second".to_string(),
        ));
    }
    let heartbeat_timeout = cli
        .heartbeat_timeout
        .or(config.stream.heartbeat_timeout)
        .unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT_SECS);
    if heartbeat_timeout == 0 {
        return Err(ConfigError::Invalid(
            "heartbeat timeout must be at least 1 second".to_string(),
        ));
    }
    let stream = StreamOptions {
        timeout: timeout.map(Duration::from_secs),
        heartbeat_timeout: Duration::from_secs(heartbeat_timeout),
        block: !cli.no_block,
        track: cli.track_keywords.clone(),
        ..Default::default()
    };

    Ok(ResolvedConfig {
        bearer_token,
        api_base_url,
        stream_base_url,
        home_tweet_count: config
            .general
            .home_tweet_count
            .unwrap_or(DEFAULT_HOME_TWEET_COUNT),
        search_max_record: config
            .general
            .search_max_record
            .unwrap_or(DEFAULT_SEARCH_MAX_RECORD),
        stream,
        id_map_path,
    })
}

/// First non-empty line of the credentials file, if there is one.
fn read_credentials_file(config: &RainbowConfig) -> Option<String> {
    let path = match config.twitter.credentials_file.as_deref() {
        Some(p) => expand_home(p),
        None => dirs::home_dir()?.join(DEFAULT_CREDENTIALS_FILE),
    };
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let token = contents
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string);
            if token.is_some() {
                info!("Loaded credentials from {}", path.display());
            }
            token
        }
        Err(e) => {
            debug!("No credentials file at {}: {}", path.display(), e);
            None
        }
    }
}

impl ResolvedConfig {
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.bearer_token
            .as_deref()
            .ok_or(ConfigError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = RainbowConfig::default();
        assert!(config.general.home_tweet_count.is_none());
        assert!(config.twitter.bearer_token.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let config = RainbowConfig::default();
        let resolved = resolve(&config, &CliOverrides::default()).unwrap();
        assert_eq!(resolved.home_tweet_count, DEFAULT_HOME_TWEET_COUNT);
        assert_eq!(resolved.search_max_record, DEFAULT_SEARCH_MAX_RECORD);
        assert_eq!(resolved.stream.heartbeat_timeout, Duration::from_secs(90));
        assert!(resolved.stream.block);
        assert!(resolved.stream.track.is_none());
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = RainbowConfig {
            general: GeneralConfig {
                home_tweet_count: Some(12),
                search_max_record: Some(3),
            },
            stream: StreamConfig {
                timeout: Some(30),
                heartbeat_timeout: Some(120),
            },
            ..Default::default()
        };
        let resolved = resolve(&config, &CliOverrides::default()).unwrap();
        assert_eq!(resolved.home_tweet_count, 12);
        assert_eq!(resolved.search_max_record, 3);
        assert_eq!(resolved.stream.timeout, Some(Duration::from_secs(30)));
        assert_eq!(resolved.stream.heartbeat_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_resolve_cli_wins() {
        let config = RainbowConfig {
            stream: StreamConfig {
                timeout: Some(30),
                heartbeat_timeout: Some(120),
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            timeout: Some(5),
            heartbeat_timeout: Some(60),
            no_block: true,
            track_keywords: Some("rust".to_string()),
        };
        let resolved = resolve(&config, &cli).unwrap();
        assert_eq!(resolved.stream.timeout, Some(Duration::from_secs(5)));
        assert_eq!(resolved.stream.heartbeat_timeout, Duration::from_secs(60));
        assert!(!resolved.stream.block);
        assert_eq!(resolved.stream.track.as_deref(), Some("rust"));
    }

    #[test]
    fn test_resolve_rejects_zero_timeouts() {
        let zero_timeout = RainbowConfig {
            stream: StreamConfig {
                timeout: Some(0),
                heartbeat_timeout: None,
            },
            ..Default::default()
        };
        assert!(matches!(
            resolve(&zero_timeout, &CliOverrides::default()),
            Err(ConfigError::Invalid(_))
        ));

        let zero_heartbeat = RainbowConfig {
            stream: StreamConfig {
                timeout: None,
                heartbeat_timeout: Some(0),
            },
            ..Default::default()
        };
        assert!(matches!(
            resolve(&zero_heartbeat, &CliOverrides::default()),
            Err(ConfigError::Invalid(_))
        ));

        // A CLI value fixes a bad file value
        let cli = CliOverrides {
            heartbeat_timeout: Some(30),
            ..Default::default()
        };
        let resolved = resolve(&zero_heartbeat, &cli).unwrap();
        assert_eq!(resolved.stream.heartbeat_timeout, Duration::from_secs(30));

        let cli = CliOverrides {
            timeout: Some(0),
            ..Default::default()
        };
        assert!(resolve(&RainbowConfig::default(), &cli).is_err());
    }

    #[test]
    fn test_credentials_file_supplies_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth");
        fs::write(&path, "\n  secret-token  \nsecond-line\n").unwrap();
        let config = RainbowConfig {
            twitter: TwitterConfig {
                credentials_file: Some(path.to_string_lossy().into_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(read_credentials_file(&config).as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let resolved = ResolvedConfig {
            bearer_token: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            stream_base_url: DEFAULT_STREAM_BASE_URL.to_string(),
            home_tweet_count: 5,
            search_max_record: 5,
            stream: StreamOptions::default(),
            id_map_path: None,
        };
        assert!(matches!(resolved.require_token(), Err(ConfigError::MissingCredentials)));
    }

    #[test]
    fn test_load_generates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rainbow").join("config.toml");
        let config = load_config(Some(&path)).unwrap();
        assert!(config.general.home_tweet_count.is_none());
        assert!(path.exists());
        // The generated file is all comments, so it loads back as defaults
        let reloaded = load_config(Some(&path)).unwrap();
        assert!(reloaded.twitter.api_base_url.is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[general]
home_tweet_count = 7
search_max_record = 10

[twitter]
bearer_token = "tok-123"
api_base_url = "http://localhost:9999/1.1"

[stream]
heartbeat_timeout = 45

[storage]
id_map_path = "/tmp/ids.jsonl"
"#;
        let config: RainbowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.home_tweet_count, Some(7));
        assert_eq!(config.general.search_max_record, Some(10));
        assert_eq!(config.twitter.bearer_token.as_deref(), Some("tok-123"));
        assert_eq!(config.stream.heartbeat_timeout, Some(45));
        assert!(config.stream.timeout.is_none());
        assert_eq!(config.storage.id_map_path.as_deref(), Some("/tmp/ids.jsonl"));
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing, everything else stays default
        let toml_str = r#"
[general]
search_max_record = 2
"#;
        let config: RainbowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.search_max_record, Some(2));
        assert!(config.general.home_tweet_count.is_none());
        assert!(config.twitter.bearer_token.is_none());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[general\nhome_tweet_count = ").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/ids.jsonl"), PathBuf::from("/abs/ids.jsonl"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/x.json"), home.join("x.json"));
        }
    }
}
