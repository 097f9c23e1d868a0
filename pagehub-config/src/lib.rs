use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// `owner/name` repository identifiers as accepted by the GitHub API.
static REPO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][-A-Za-z0-9_\.]*/[A-Za-z0-9][-A-Za-z0-9_\.]*$").unwrap());

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub github: Option<GithubSection>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct GithubSection {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s; // suppress unused warning
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub github: GithubConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Remote repository settings. `branch` carries no default on purpose:
/// deployments disagree on `main` vs `master`, so the operator has to say
/// which one this repository uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GithubConfig {
    pub token: String,
    pub repo: String,
    pub branch: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            database: DatabaseConfig {
                url: "pagehub.sqlite".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            github: GithubConfig {
                token: String::new(),
                repo: String::new(),
                branch: String::new(),
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    let bytes = s.as_bytes();
    match bytes {
        b"1" | b"true" | b"TRUE" | b"True" | b"yes" | b"YES" | b"Yes" | b"y" | b"Y" => Ok(true),
        b"0" | b"false" | b"FALSE" | b"False" | b"no" | b"NO" | b"No" | b"n" | b"N" => Ok(false),
        _ => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Ok(true),
            "false" | "no" | "n" => Ok(false),
            _ => Err(()),
        },
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    // Start with file values if provided
    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(server) = raw.server {
            apply_opt!(cfg.server.host, server.host);
            apply_opt!(cfg.server.port, server.port);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
        if let Some(db) = raw.database {
            apply_opt!(cfg.database.url, db.url);
            apply_opt!(cfg.database.max_connections, db.max_connections);
            apply_opt!(cfg.database.min_connections, db.min_connections);
        }
        if let Some(gh) = raw.github {
            apply_opt!(cfg.github.token, gh.token);
            apply_opt!(cfg.github.repo, gh.repo);
            apply_opt!(cfg.github.branch, gh.branch);
        }
    }

    // Apply environment variable overrides (env takes precedence)
    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

/// Helper to get env var as string
#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("PAGEHUB_SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>("PAGEHUB_SERVER_PORT")? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str("PAGEHUB_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("PAGEHUB_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Database
    if let Some(v) = env_str("PAGEHUB_DATABASE_URL") {
        cfg.database.url = v;
    }
    if let Some(v) = env_parse::<u32>("PAGEHUB_DATABASE_MAX_CONNECTIONS")? {
        cfg.database.max_connections = v;
    }
    if let Some(v) = env_parse::<u32>("PAGEHUB_DATABASE_MIN_CONNECTIONS")? {
        cfg.database.min_connections = v;
    }

    // GitHub
    if let Some(v) = env_str("PAGEHUB_GITHUB_TOKEN") {
        cfg.github.token = v;
    }
    if let Some(v) = env_str("PAGEHUB_GITHUB_REPO") {
        cfg.github.repo = v;
    }
    if let Some(v) = env_str("PAGEHUB_GITHUB_BRANCH") {
        cfg.github.branch = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    // server port range
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    // validate server.host: allow IPs or simple hostname pattern
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    if cfg.database.url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database.url must not be empty".into(),
        ));
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".into(),
        ));
    }

    if cfg.github.token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "github.token must be set (PAGEHUB_GITHUB_TOKEN)".into(),
        ));
    }
    if !REPO_REGEX.is_match(&cfg.github.repo) {
        return Err(ConfigError::Validation(format!(
            "github.repo must be an owner/name identifier, got: {:?}",
            cfg.github.repo
        )));
    }
    // No fallback branch: guessing main vs master writes commits to the
    // wrong place.
    if cfg.github.branch.trim().is_empty() {
        return Err(ConfigError::Validation(
            "github.branch must be set (PAGEHUB_GITHUB_BRANCH); there is no default".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn github_section_ok() -> GithubConfig {
        GithubConfig {
            token: "ghp_test".into(),
            repo: "someone/pages".into(),
            branch: "main".into(),
        }
    }

    #[test]
    fn parse_toml() {
        let f = NamedTempFile::new().expect("tmpfile");
        std::fs::write(
            f.path(),
            r#"
[server]
host = "127.0.0.1"
port = 5000

[github]
repo = "someone/pages"
branch = "main"
"#,
        )
        .unwrap();
        let cfg = load_raw_from_file(f.path()).expect("load");
        assert!(cfg.server.is_some());
        let s = cfg.server.unwrap();
        assert_eq!(s.host.unwrap(), "127.0.0.1");
        assert_eq!(s.port.unwrap(), 5000);
        let gh = cfg.github.unwrap();
        assert_eq!(gh.repo.unwrap(), "someone/pages");
        assert_eq!(gh.branch.unwrap(), "main");
    }

    #[test]
    fn parse_yaml() {
        let f = NamedTempFile::new().expect("tmpfile");
        std::fs::write(
            f.path(),
            r#"
server:
  host: 0.0.0.0
  port: 9000
database:
  url: sqlite://pages.sqlite
"#,
        )
        .unwrap();
        let cfg = load_raw_from_file(f.path()).expect("load");
        let s = cfg.server.unwrap();
        assert_eq!(s.host.unwrap(), "0.0.0.0");
        assert_eq!(s.port.unwrap(), 9000);
        assert_eq!(cfg.database.unwrap().url.unwrap(), "sqlite://pages.sqlite");
    }

    #[test]
    fn env_overrides() {
        for k in &[
            "PAGEHUB_SERVER_HOST",
            "PAGEHUB_SERVER_PORT",
            "PAGEHUB_GITHUB_BRANCH",
        ] {
            std::env::remove_var(k);
        }

        std::env::set_var("PAGEHUB_SERVER_HOST", "10.1.2.3");
        std::env::set_var("PAGEHUB_SERVER_PORT", "1234");
        std::env::set_var("PAGEHUB_GITHUB_BRANCH", "master");

        let cfg = load_config::<&Path>(None).expect("load config");
        assert_eq!(cfg.server.host, "10.1.2.3");
        assert_eq!(cfg.server.port, 1234);
        assert_eq!(cfg.github.branch, "master");

        for k in &[
            "PAGEHUB_SERVER_HOST",
            "PAGEHUB_SERVER_PORT",
            "PAGEHUB_GITHUB_BRANCH",
        ] {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn env_wins_over_file() {
        std::env::remove_var("PAGEHUB_GITHUB_REPO");

        let f = NamedTempFile::new().expect("tmpfile");
        std::fs::write(
            f.path(),
            r#"
[github]
repo = "file/repo"
branch = "main"
"#,
        )
        .unwrap();

        std::env::set_var("PAGEHUB_GITHUB_REPO", "env/repo");
        let cfg = load_config(Some(f.path())).expect("load config");
        assert_eq!(cfg.github.repo, "env/repo");
        // values only the file sets still come through
        assert_eq!(cfg.github.branch, "main");
        std::env::remove_var("PAGEHUB_GITHUB_REPO");
    }

    #[test]
    fn missing_branch_rejected() {
        let mut cfg = Config::default();
        cfg.github = github_section_ok();
        cfg.github.branch = String::new();
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("github.branch"));
    }

    #[test]
    fn malformed_repo_rejected() {
        let mut cfg = Config::default();
        cfg.github = github_section_ok();
        cfg.github.repo = "not-a-repo".into();
        assert!(validate_config(&cfg).is_err());
        cfg.github.repo = "owner/name".into();
        assert!(validate_config(&cfg).is_ok());
    }
}
