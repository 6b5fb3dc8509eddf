use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub groups: Groups,
    pub http: Http,
    pub log: Log,
    pub store: Store,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub backend: String, // "fake" or "real"
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub audience: String,
}

#[derive(Debug, Deserialize)]
pub struct Groups {
    #[serde(default = "default_invite_code_length")]
    pub invite_code_length: usize,
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: usize,
    #[serde(default = "default_max_members")]
    pub default_max_members: u32,
}

fn default_invite_code_length() -> usize {
    6
}

fn default_max_commit_attempts() -> usize {
    5
}

fn default_max_members() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    /// TLS is enabled when both paths are set.
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "mysql"
    #[serde(default)]
    pub mysql_dsn: Option<String>,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Environment overrides, e.g. `STREAKBOARD__STORE__MYSQL_DSN`.
const ENV_PREFIX: &str = "STREAKBOARD";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_settings_parse() {
        for path in ["settings/dev.toml", "settings/release.toml"] {
            let settings = parse_settings(Some(path)).unwrap();
            assert!(settings.http.address.parse::<std::net::SocketAddr>().is_ok());
            assert_eq!(settings.groups.invite_code_length, 6);
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
