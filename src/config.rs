//! Configuration module
//!
//! The configuration is a YAML file, optionally overridden by environment
//! variables for container deployments. It is validated into [`Settings`]
//! before anything touches the network.

use crate::channel_filter::ChannelFilter;
use crate::date_format::{DateFormatError, DateFormatSpec};
use crate::kometa::{BackdropSettings, CollectionSettings, DocumentSettings, TextSettings};
use crate::trailer::TrailerSettings;
use chrono::FixedOffset;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_yaml::Mapping;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yml";

const MAX_UTC_OFFSET_HOURS: f64 = 14.0;

/// Errors that can occur while loading or validating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file does not exist
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// The config file is not valid YAML or has the wrong shape
    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// A required setting is missing or empty
    #[error("Missing required setting '{0}'")]
    MissingSetting(&'static str),

    /// A setting has an unusable value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// A date pattern or divider could not be parsed
    #[error("Invalid date format in '{section}': {source}")]
    DateFormat {
        section: &'static str,
        source: DateFormatError,
    },
}

/// Raw configuration as read from the YAML file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sonarr_url: Option<String>,
    #[serde(default)]
    pub sonarr_api_key: Option<String>,
    #[serde(default = "default_future_days")]
    pub future_days_upcoming_shows: u32,
    /// Hours east of UTC, fractional values allowed
    #[serde(default, deserialize_with = "flexible_f64")]
    pub utc_offset: f64,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub inclusive_window_end: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub skip_unmonitored: bool,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub premieres_only: bool,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub download_trailers: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub debug: bool,
    /// Either a YAML list or a comma separated string
    #[serde(default, deserialize_with = "string_list")]
    pub skip_channels: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub path_mappings: Vec<PathMappingConfig>,
    #[serde(default)]
    pub trailer: TrailerConfig,
    #[serde(default)]
    pub collection_upcoming_shows: CollectionConfig,
    #[serde(default)]
    pub backdrop_upcoming_shows: BackdropConfig,
    #[serde(default)]
    pub text_upcoming_shows: TextConfig,
}

/// A single `from` -> `to` path substitution
#[derive(Debug, Clone, Deserialize)]
pub struct PathMappingConfig {
    pub from: String,
    pub to: String,
}

/// Trailer search, filter and download tuning
#[derive(Debug, Clone, Deserialize)]
pub struct TrailerConfig {
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: u64,
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
    #[serde(default = "default_search_results")]
    pub search_results: usize,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_avoid_keywords", deserialize_with = "string_list")]
    pub avoid_keywords: Vec<String>,
}

impl Default for TrailerConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            search_results: default_search_results(),
            max_height: default_max_height(),
            search_timeout_secs: default_search_timeout(),
            download_timeout_secs: default_download_timeout(),
            avoid_keywords: default_avoid_keywords(),
        }
    }
}

/// `collection_upcoming_shows` section
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    #[serde(default = "default_summary")]
    pub summary: String,
    #[serde(default)]
    pub sort_title: Option<String>,
    #[serde(default = "default_smart_label")]
    pub smart_label: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub divider: Option<String>,
    /// Any other keys, passed through into the collection unchanged
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            collection_name: default_collection_name(),
            summary: default_summary(),
            sort_title: None,
            smart_label: default_smart_label(),
            date_format: default_date_format(),
            divider: None,
            extra: Mapping::new(),
        }
    }
}

/// `backdrop_upcoming_shows` section
#[derive(Debug, Clone, Deserialize)]
pub struct BackdropConfig {
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub enable: bool,
    /// Overlay keys such as `back_color` or `back_height`
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            enable: true,
            extra: Mapping::new(),
        }
    }
}

/// `text_upcoming_shows` section
#[derive(Debug, Clone, Deserialize)]
pub struct TextConfig {
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub enable: bool,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub divider: Option<String>,
    #[serde(default = "default_use_text")]
    pub use_text: String,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub capitalize_dates: bool,
    /// Overlay keys such as `font` or `font_size`
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            enable: true,
            date_format: default_date_format(),
            divider: None,
            use_text: default_use_text(),
            capitalize_dates: true,
            extra: Mapping::new(),
        }
    }
}

/// Validated, ready-to-use settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub sonarr_url: String,
    pub sonarr_api_key: String,
    pub future_days: u32,
    pub utc_offset: FixedOffset,
    pub inclusive_window_end: bool,
    pub skip_unmonitored: bool,
    pub premieres_only: bool,
    pub download_trailers: bool,
    pub debug: bool,
    pub channel_filter: ChannelFilter,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
    pub path_mappings: PathMappings,
    pub trailer: TrailerSettings,
    pub max_height: u32,
    pub search_timeout: Duration,
    pub download_timeout: Duration,
    pub documents: DocumentSettings,
}

/// Tracker path prefixes rewritten to locally visible paths
///
/// The tracker often runs in another container and reports paths as it
/// sees them. Rules are matched component-wise, longest prefix first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMappings {
    rules: Vec<(PathBuf, PathBuf)>,
}

impl PathMappings {
    pub fn new<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, PathBuf)>,
    {
        let mut rules: Vec<_> = rules.into_iter().collect();
        rules.sort_by_key(|(from, _)| std::cmp::Reverse(from.components().count()));
        Self { rules }
    }

    /// Rewrites `path` using the first matching rule, or returns it unchanged
    pub fn apply(&self, path: &Path) -> PathBuf {
        for (from, to) in &self.rules {
            if let Ok(rest) = path.strip_prefix(from) {
                if rest.as_os_str().is_empty() {
                    return to.clone();
                }
                return to.join(rest);
            }
        }
        path.to_path_buf()
    }
}

impl Config {
    /// Loads the configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_yaml_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Parses the configuration from YAML text
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return serde_yaml::from_str("{}");
        }
        serde_yaml::from_str(content)
    }

    /// Applies `SONARR_URL` and `SONARR_API_KEY` overrides
    ///
    /// Blank values are ignored.
    pub fn apply_env(&mut self, env_lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| {
            env_lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = lookup("SONARR_URL") {
            self.sonarr_url = Some(url);
        }
        if let Some(key) = lookup("SONARR_API_KEY") {
            self.sonarr_api_key = Some(key);
        }
    }

    /// Validates the configuration into [`Settings`]
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let sonarr_url = required(&self.sonarr_url, "sonarr_url")?;
        let sonarr_api_key = required(&self.sonarr_api_key, "sonarr_api_key")?;
        let utc_offset = parse_offset(self.utc_offset)?;

        let trailer = &self.trailer;
        if trailer.min_duration_secs > trailer.max_duration_secs {
            return Err(ConfigError::InvalidValue {
                field: "trailer.min_duration_secs",
                reason: format!(
                    "{} is greater than max_duration_secs {}",
                    trailer.min_duration_secs, trailer.max_duration_secs
                ),
            });
        }
        positive(trailer.max_duration_secs, "trailer.max_duration_secs")?;
        positive(trailer.search_results as u64, "trailer.search_results")?;
        positive(u64::from(trailer.max_height), "trailer.max_height")?;
        positive(trailer.search_timeout_secs, "trailer.search_timeout_secs")?;
        positive(trailer.download_timeout_secs, "trailer.download_timeout_secs")?;
        positive(self.request_timeout_secs, "request_timeout_secs")?;

        let path_mappings = self.path_mappings()?;
        let documents = self.documents()?;

        Ok(Settings {
            sonarr_url,
            sonarr_api_key,
            future_days: self.future_days_upcoming_shows,
            utc_offset,
            inclusive_window_end: self.inclusive_window_end,
            skip_unmonitored: self.skip_unmonitored,
            premieres_only: self.premieres_only,
            download_trailers: self.download_trailers,
            debug: self.debug,
            channel_filter: ChannelFilter::new(&self.skip_channels),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            output_dir: self.output_dir.clone(),
            path_mappings,
            trailer: TrailerSettings {
                min_duration: Duration::from_secs(trailer.min_duration_secs),
                max_duration: Duration::from_secs(trailer.max_duration_secs),
                search_results: trailer.search_results,
                avoid_keywords: trailer
                    .avoid_keywords
                    .iter()
                    .map(|keyword| keyword.trim().to_lowercase())
                    .filter(|keyword| !keyword.is_empty())
                    .collect(),
            },
            max_height: trailer.max_height,
            search_timeout: Duration::from_secs(trailer.search_timeout_secs),
            download_timeout: Duration::from_secs(trailer.download_timeout_secs),
            documents,
        })
    }

    fn path_mappings(&self) -> Result<PathMappings, ConfigError> {
        let mut rules = Vec::with_capacity(self.path_mappings.len());
        for mapping in &self.path_mappings {
            let from = mapping.from.trim();
            if from.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "path_mappings",
                    reason: format!("empty 'from' prefix for target '{}'", mapping.to),
                });
            }
            rules.push((PathBuf::from(from), PathBuf::from(mapping.to.trim())));
        }
        Ok(PathMappings::new(rules))
    }

    fn documents(&self) -> Result<DocumentSettings, ConfigError> {
        let collection = &self.collection_upcoming_shows;
        let text = &self.text_upcoming_shows;

        let collection_date =
            DateFormatSpec::parse(&collection.date_format, collection.divider.as_deref())
                .map_err(|e| ConfigError::DateFormat {
                    section: "collection_upcoming_shows",
                    source: e,
                })?;
        let text_date = DateFormatSpec::parse(&text.date_format, text.divider.as_deref())
            .map_err(|e| ConfigError::DateFormat {
                section: "text_upcoming_shows",
                source: e,
            })?;

        if collection.collection_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "collection_upcoming_shows.collection_name",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(DocumentSettings {
            future_days: self.future_days_upcoming_shows,
            collection: CollectionSettings {
                name: collection.collection_name.trim().to_string(),
                summary: collection.summary.clone(),
                sort_title: collection.sort_title.clone(),
                smart_label: collection.smart_label.clone(),
                date: collection_date,
                extra: collection.extra.clone(),
            },
            backdrop: BackdropSettings {
                enable: self.backdrop_upcoming_shows.enable,
                extra: self.backdrop_upcoming_shows.extra.clone(),
            },
            text: TextSettings {
                enable: text.enable,
                date: text_date,
                use_text: text.use_text.clone(),
                capitalize_dates: text.capitalize_dates,
                extra: text.extra.clone(),
            },
        })
    }
}

/// Returns the config path used when none is given on the command line
///
/// `config/config.yml` in the working directory wins if it exists, then the
/// platform config directory.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CONFIG_PATH);
    if local.is_file() {
        return local;
    }

    directories::ProjectDirs::from("", "", "upcoming-trailers")
        .map(|dirs| dirs.config_dir().join("config.yml"))
        .filter(|path| path.is_file())
        .unwrap_or(local)
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingSetting(field))
}

fn positive(value: u64, field: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn parse_offset(hours: f64) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        field: "utc_offset",
        reason: format!("{} is not within ±{} hours", hours, MAX_UTC_OFFSET_HOURS),
    };

    if !hours.is_finite() || hours.abs() > MAX_UTC_OFFSET_HOURS {
        return Err(invalid());
    }

    let seconds = (hours * 3600.0).round() as i32;
    FixedOffset::east_opt(seconds).ok_or_else(invalid)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    String(String),
}

/// Accepts YAML booleans as well as `"true"`/`"false"` strings
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(value) => Ok(value),
        BoolOrString::String(value) => match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" | "" => Ok(false),
            other => Err(de::Error::custom(format!("expected a boolean, got '{}'", other))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::String(value) => value
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a number, got '{}'", value))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrString {
    List(Vec<String>),
    String(String),
}

/// Accepts a YAML list or a comma separated string
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let items = match Option::<ListOrString>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ListOrString::List(items)) => items,
        Some(ListOrString::String(value)) => value.split(',').map(str::to_string).collect(),
    };

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

fn default_true() -> bool {
    true
}

fn default_future_days() -> u32 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Kometa")
}

fn default_min_duration() -> u64 {
    10
}

fn default_max_duration() -> u64 {
    900
}

fn default_search_results() -> usize {
    15
}

fn default_max_height() -> u32 {
    1080
}

fn default_search_timeout() -> u64 {
    45
}

fn default_download_timeout() -> u64 {
    900
}

fn default_avoid_keywords() -> Vec<String> {
    [
        "reaction",
        "review",
        "breakdown",
        "analysis",
        "explained",
        "easter eggs",
        "theory",
        "predictions",
        "recap",
        "commentary",
        "first time watching",
        "blind reaction",
        "behind the scenes",
        "fan made",
        "concept",
        "music video",
        "news",
        "interview",
    ]
    .iter()
    .map(|keyword| keyword.to_string())
    .collect()
}

fn default_collection_name() -> String {
    "Upcoming Shows".to_string()
}

fn default_summary() -> String {
    "Shows with their first episode premiering within {days} days".to_string()
}

fn default_smart_label() -> String {
    "random".to_string()
}

fn default_date_format() -> String {
    "yyyy-mm-dd".to_string()
}

fn default_use_text() -> String {
    "Coming Soon".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    const MINIMAL: &str = "sonarr_url: http://localhost:8989\nsonarr_api_key: abc123\n";

    #[test]
    fn test_defaults() {
        let settings = Config::from_yaml_str(MINIMAL).unwrap().validate().unwrap();

        assert_eq!(settings.future_days, 30);
        assert_eq!(settings.utc_offset, FixedOffset::east_opt(0).unwrap());
        assert!(settings.inclusive_window_end);
        assert!(!settings.skip_unmonitored);
        assert!(settings.premieres_only);
        assert!(settings.download_trailers);
        assert!(settings.channel_filter.is_empty());
        assert_eq!(settings.output_dir, PathBuf::from("Kometa"));
        assert_eq!(settings.trailer.max_duration, Duration::from_secs(900));
        assert_eq!(settings.trailer.avoid_keywords.len(), 18);
        assert_eq!(settings.documents.collection.name, "Upcoming Shows");
        assert_eq!(settings.documents.text.use_text, "Coming Soon");
        assert!(settings.documents.backdrop.enable);
    }

    #[test]
    fn test_full_config() {
        let yaml = r##"
sonarr_url: "http://sonarr:8989"
sonarr_api_key: "key"
future_days_upcoming_shows: 14
utc_offset: -5.5
skip_unmonitored: "true"
download_trailers: false
skip_channels: "Screen Culture, KH Studio ,"
path_mappings:
  - from: /data/tv
    to: /mnt/media/tv
collection_upcoming_shows:
  collection_name: "Soon on TV"
  sort_title: "+1_Soon"
  visible_home: true
backdrop_upcoming_shows:
  enable: false
  back_color: "#000000"
text_upcoming_shows:
  date_format: "mmm d"
  use_text: "NEW SHOW"
  capitalize_dates: "false"
  font_size: 35
"##;
        let settings = Config::from_yaml_str(yaml).unwrap().validate().unwrap();

        assert_eq!(settings.future_days, 14);
        assert_eq!(
            settings.utc_offset,
            FixedOffset::west_opt(5 * 3600 + 1800).unwrap()
        );
        assert!(settings.skip_unmonitored);
        assert!(!settings.download_trailers);
        assert_eq!(settings.channel_filter.len(), 2);
        assert!(settings.channel_filter.is_blocked("kh studio"));
        assert_eq!(
            settings.path_mappings.apply(Path::new("/data/tv/Show")),
            PathBuf::from("/mnt/media/tv/Show")
        );

        let collection = &settings.documents.collection;
        assert_eq!(collection.name, "Soon on TV");
        assert_eq!(collection.sort_title.as_deref(), Some("+1_Soon"));
        assert_eq!(
            collection.extra.get("visible_home"),
            Some(&Value::Bool(true))
        );
        assert!(!collection.extra.contains_key("collection_name"));

        assert!(!settings.documents.backdrop.enable);
        assert_eq!(settings.documents.backdrop.extra.len(), 1);

        let text = &settings.documents.text;
        assert!(!text.capitalize_dates);
        assert_eq!(text.use_text, "NEW SHOW");
        assert_eq!(text.extra.get("font_size").and_then(Value::as_u64), Some(35));
        assert!(!text.extra.contains_key("date_format"));
    }

    #[test]
    fn test_skip_channels_as_list() {
        let yaml = format!("{}skip_channels:\n  - One\n  - '  '\n  - Two\n", MINIMAL);
        let config = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.skip_channels, vec!["One", "Two"]);
    }

    #[test]
    fn test_missing_credentials() {
        let config = Config::from_yaml_str("sonarr_url: http://x\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSetting("sonarr_api_key"))
        ));

        let config = Config::from_yaml_str("").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSetting("sonarr_url"))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::from_yaml_str(MINIMAL).unwrap();
        config.apply_env(|key| match key {
            "SONARR_URL" => Some("http://override:8989".to_string()),
            "SONARR_API_KEY" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.sonarr_url.as_deref(), Some("http://override:8989"));
        assert_eq!(config.sonarr_api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_env_supplies_missing_credentials() {
        let mut config = Config::from_yaml_str("").unwrap();
        config.apply_env(|key| Some(format!("value-of-{}", key)));

        let settings = config.validate().unwrap();
        assert_eq!(settings.sonarr_api_key, "value-of-SONARR_API_KEY");
    }

    #[test]
    fn test_invalid_offset() {
        let yaml = format!("{}utc_offset: 15\n", MINIMAL);
        let err = Config::from_yaml_str(&yaml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "utc_offset", .. }));
    }

    #[test]
    fn test_offset_as_string() {
        let yaml = format!("{}utc_offset: \"+2\"\n", MINIMAL);
        let settings = Config::from_yaml_str(&yaml).unwrap().validate().unwrap();
        assert_eq!(settings.utc_offset, FixedOffset::east_opt(7200).unwrap());
    }

    #[test]
    fn test_duration_bounds_checked() {
        let yaml = format!(
            "{}trailer:\n  min_duration_secs: 600\n  max_duration_secs: 300\n",
            MINIMAL
        );
        let err = Config::from_yaml_str(&yaml).unwrap().validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "trailer.min_duration_secs",
                ..
            }
        ));
    }

    #[test]
    fn test_date_conflict_is_config_error() {
        let yaml = format!(
            "{}text_upcoming_shows:\n  date_format: \"yyyy/mmdd\"\n  divider: \"-\"\n",
            MINIMAL
        );
        let err = Config::from_yaml_str(&yaml).unwrap().validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DateFormat {
                section: "text_upcoming_shows",
                source: DateFormatError::DividerConflict { .. }
            }
        ));
    }

    #[test]
    fn test_invalid_bool_string() {
        let yaml = format!("{}debug: maybe\n", MINIMAL);
        assert!(Config::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_empty_path_mapping_prefix() {
        let yaml = format!("{}path_mappings:\n  - from: ' '\n    to: /mnt\n", MINIMAL);
        let err = Config::from_yaml_str(&yaml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "path_mappings", .. }));
    }

    #[test]
    fn test_path_mappings_longest_prefix_wins() {
        let mappings = PathMappings::new([
            (PathBuf::from("/data"), PathBuf::from("/mnt/data")),
            (PathBuf::from("/data/tv"), PathBuf::from("/media/series")),
        ]);

        assert_eq!(
            mappings.apply(Path::new("/data/tv/Show")),
            PathBuf::from("/media/series/Show")
        );
        assert_eq!(
            mappings.apply(Path::new("/data/movies/Film")),
            PathBuf::from("/mnt/data/movies/Film")
        );
        // Component-wise: /data/tvshows is not below /data/tv
        assert_eq!(
            mappings.apply(Path::new("/data/tvshows/Show")),
            PathBuf::from("/mnt/data/tvshows/Show")
        );
        assert_eq!(mappings.apply(Path::new("/other")), PathBuf::from("/other"));
        assert_eq!(mappings.apply(Path::new("/data")), PathBuf::from("/mnt/data"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yml");
        assert!(matches!(Config::load(&path), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, MINIMAL).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sonarr_api_key.as_deref(), Some("abc123"));

        fs::write(&path, "sonarr_url: [unclosed").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ParseFailed { .. })
        ));
    }
}
