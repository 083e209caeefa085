//! Configuration discovery and parsing.
//!
//! The config is a TOML document read once at startup from the first
//! existing candidate path:
//!
//! 1. `$REDDIFY_CONFIG`, when set (it must exist)
//! 2. `./reddify.toml`
//! 3. `$XDG_CONFIG_HOME/reddify.toml`, else `$HOME/.config/reddify.toml`
//! 4. `$HOME/reddify.toml`

use crate::error::{ConfigError, CoreError};
use crate::types::ChannelKeywordMap;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "reddify.toml";
pub const CONFIG_PATH_ENV: &str = "REDDIFY_CONFIG";

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct PushoverCredentials {
    pub api_key: String,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reddit: RedditCredentials,
    pub pushover: PushoverCredentials,
    pub submissions: ChannelKeywordMap,
    pub comments: ChannelKeywordMap,
    /// Seed the stream with the current listing instead of yielding it.
    pub skip_existing: bool,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    reddit: Option<RawReddit>,
    pushover: Option<RawPushover>,
    #[serde(default)]
    submissions: ChannelKeywordMap,
    #[serde(default)]
    comments: ChannelKeywordMap,
}

#[derive(Debug, Deserialize)]
struct RawReddit {
    #[serde(rename = "CLIENT_ID", alias = "client_id")]
    client_id: Option<String>,
    #[serde(rename = "CLIENT_SECRET", alias = "client_secret")]
    client_secret: Option<String>,
    #[serde(rename = "USER_AGENT", alias = "user_agent")]
    user_agent: Option<String>,
    #[serde(rename = "SKIP_EXISTING", alias = "skip_existing", default)]
    skip_existing: bool,
}

#[derive(Debug, Deserialize)]
struct RawPushover {
    #[serde(rename = "API_KEY", alias = "api_key")]
    api_key: Option<String>,
    #[serde(rename = "USER_ID", alias = "user_id")]
    user_id: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: "empty string".to_string(),
        }),
        None => Err(ConfigError::MissingField {
            field: field.to_string(),
        }),
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;

        let reddit = raw.reddit.ok_or_else(|| ConfigError::MissingField {
            field: "reddit".to_string(),
        })?;
        let pushover = raw.pushover.ok_or_else(|| ConfigError::MissingField {
            field: "pushover".to_string(),
        })?;

        let config = Self {
            reddit: RedditCredentials {
                client_id: required(reddit.client_id, "reddit.CLIENT_ID")?,
                client_secret: required(reddit.client_secret, "reddit.CLIENT_SECRET")?,
                user_agent: required(reddit.user_agent, "reddit.USER_AGENT")?,
            },
            pushover: PushoverCredentials {
                api_key: required(pushover.api_key, "pushover.API_KEY")?,
                user_id: required(pushover.user_id, "pushover.USER_ID")?,
            },
            submissions: raw.submissions,
            comments: raw.comments,
            skip_existing: reddit.skip_existing,
        };

        warn_empty_keywords("submissions", &config.submissions);
        warn_empty_keywords("comments", &config.comments);

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Load the first config found among [`candidate_paths`], unless
    /// `$REDDIFY_CONFIG` names a file explicitly.
    pub fn discover() -> Result<(PathBuf, Self), CoreError> {
        Self::discover_from(
            env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
            &candidate_paths(
                env::var_os("HOME").map(PathBuf::from),
                env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            ),
        )
    }

    /// An explicit path must exist; the candidates are not consulted.
    pub fn discover_from(
        explicit: Option<PathBuf>,
        candidates: &[PathBuf],
    ) -> Result<(PathBuf, Self), CoreError> {
        match explicit {
            Some(path) => Self::discover_in(std::slice::from_ref(&path)),
            None => Self::discover_in(candidates),
        }
    }

    pub fn discover_in(candidates: &[PathBuf]) -> Result<(PathBuf, Self), CoreError> {
        let path = candidates
            .iter()
            .find(|path| path.exists())
            .ok_or_else(|| ConfigError::FileNotFound {
                searched: candidates
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect(),
            })?;

        info!("Found config in {}", path.display());
        let config = Self::load(path)?;
        Ok((path.clone(), config))
    }
}

/// Ordered candidate locations: working directory, user config directory,
/// home directory.
pub fn candidate_paths(home: Option<PathBuf>, xdg_config_home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];

    let config_dir = xdg_config_home
        .filter(|dir| dir.is_absolute())
        .or_else(|| home.as_ref().map(|home| home.join(".config")));
    if let Some(dir) = config_dir {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Some(home) = home {
        paths.push(home.join(CONFIG_FILE_NAME));
    }

    paths
}

fn warn_empty_keywords(section: &str, keywords: &ChannelKeywordMap) {
    for (channel, words) in keywords.iter() {
        if words.iter().any(|word| word.is_empty()) {
            warn!(
                "Empty keyword configured for {} in [{}]; it will match every item",
                channel, section
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FULL_CONFIG: &str = r#"
[reddit]
CLIENT_ID = "id"
CLIENT_SECRET = "secret"
USER_AGENT = "reddify/0.1 by tester"

[pushover]
API_KEY = "token"
USER_ID = "user"

[submissions]
rust = ["tokio", "async"]
programming = ["rust"]

[comments]
rust = ["borrow checker"]
"#;

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(config.reddit.client_id, "id");
        assert_eq!(config.reddit.client_secret, "secret");
        assert_eq!(config.reddit.user_agent, "reddify/0.1 by tester");
        assert_eq!(config.pushover.api_key, "token");
        assert_eq!(config.pushover.user_id, "user");
        assert_eq!(config.submissions.channels(), vec!["programming", "rust"]);
        assert_eq!(
            config.submissions.keywords_for("rust").unwrap(),
            &["tokio".to_string(), "async".to_string()]
        );
        assert_eq!(config.comments.len(), 1);
        assert!(!config.skip_existing);
    }

    #[test]
    fn test_subscription_sections_are_optional() {
        let content = r#"
[reddit]
client_id = "id"
client_secret = "secret"
user_agent = "ua"
skip_existing = true

[pushover]
api_key = "token"
user_id = "user"
"#;
        let config = AppConfig::from_toml_str(content).unwrap();
        assert!(config.submissions.is_empty());
        assert!(config.comments.is_empty());
        assert!(config.skip_existing);
    }

    #[test]
    fn test_empty_subscription_section() {
        let content = FULL_CONFIG.replace(
            "[comments]\nrust = [\"borrow checker\"]",
            "[comments]",
        );
        let config = AppConfig::from_toml_str(&content).unwrap();
        assert!(config.comments.is_empty());
        assert_eq!(config.submissions.len(), 2);
    }

    #[test]
    fn test_missing_section() {
        let content = r#"
[reddit]
CLIENT_ID = "id"
CLIENT_SECRET = "secret"
USER_AGENT = "ua"
"#;
        let err = AppConfig::from_toml_str(content).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "pushover"));
    }

    #[test]
    fn test_missing_key_names_dotted_path() {
        let content = FULL_CONFIG.replace("CLIENT_SECRET = \"secret\"\n", "");
        let err = AppConfig::from_toml_str(&content).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingField { ref field } if field == "reddit.CLIENT_SECRET")
        );
    }

    #[test]
    fn test_blank_credential_is_invalid() {
        let content = FULL_CONFIG.replace("API_KEY = \"token\"", "API_KEY = \"  \"");
        let err = AppConfig::from_toml_str(&content).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "pushover.API_KEY")
        );
    }

    #[test]
    fn test_malformed_toml() {
        let err = AppConfig::from_toml_str("[reddit\nCLIENT_ID = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_candidate_paths_order() {
        let home = PathBuf::from("/home/tester");
        let paths = candidate_paths(Some(home.clone()), None);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("reddify.toml"),
                home.join(".config/reddify.toml"),
                home.join("reddify.toml"),
            ]
        );

        let paths = candidate_paths(Some(home.clone()), Some(PathBuf::from("/xdg")));
        assert_eq!(paths[1], PathBuf::from("/xdg/reddify.toml"));

        let paths = candidate_paths(None, None);
        assert_eq!(paths, vec![PathBuf::from("reddify.toml")]);
    }

    #[test]
    fn test_discover_picks_first_existing() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("missing.toml");
        let second = dir.path().join("second.toml");
        let third = dir.path().join("third.toml");
        fs::write(&second, FULL_CONFIG).unwrap();
        fs::write(&third, "not even toml [").unwrap();

        let (path, config) =
            AppConfig::discover_in(&[first, second.clone(), third]).unwrap();
        assert_eq!(path, second);
        assert_eq!(config.pushover.user_id, "user");
    }

    #[test]
    fn test_discover_reports_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![dir.path().join("a.toml"), dir.path().join("b.toml")];

        let err = AppConfig::discover_in(&candidates).unwrap_err();
        match err {
            CoreError::Config(ConfigError::FileNotFound { searched }) => {
                assert_eq!(searched.len(), 2);
                assert!(searched[0].ends_with("a.toml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("reddify.toml");
        fs::write(&fallback, FULL_CONFIG).unwrap();
        let explicit = dir.path().join("elsewhere.toml");

        let err = AppConfig::discover_from(Some(explicit.clone()), &[fallback]).unwrap_err();
        match err {
            CoreError::Config(ConfigError::FileNotFound { searched }) => {
                assert_eq!(searched, vec![explicit.display().to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_explicit_path_wins_over_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("reddify.toml");
        fs::write(&fallback, "not even toml [").unwrap();
        let explicit = dir.path().join("explicit.toml");
        fs::write(&explicit, FULL_CONFIG).unwrap();

        let (path, config) =
            AppConfig::discover_from(Some(explicit.clone()), &[fallback.clone()]).unwrap();
        assert_eq!(path, explicit);
        assert_eq!(config.reddit.client_id, "id");

        let candidates = [dir.path().join("x.toml"), explicit.clone()];
        let (path, _) = AppConfig::discover_from(None, &candidates).unwrap();
        assert_eq!(path, explicit);
    }
}
