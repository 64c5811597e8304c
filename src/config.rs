use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::features::FeatureConfig;
use crate::fixtures::ScorePolicy;
use crate::http_client::RetryPolicy;
use crate::model::StatColumn;
use crate::odds::OddsFilter;

const DEFAULT_BASE_URL: &str = "https://api.sportmonks.com/v3/football";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_BASE: f64 = 2.0;
const DEFAULT_API_DELAY_MS: u64 = 500;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_PER_PAGE: usize = 50;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("SPORTMONKS_API_KEY is not set")]
    MissingApiKey,
    #[error("{key} must list at least one id")]
    EmptyAllowList { key: &'static str },
    #[error("{key}: unknown statistic column {value:?}")]
    UnknownStat { key: &'static str, value: String },
    #[error("{key}: invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: f64,
    pub api_delay: Duration,
    pub batch_size: usize,
    pub per_page: usize,
    pub fixture_limit: Option<usize>,
    pub odds_filter: OddsFilter,
    pub features: FeatureConfig,
    pub score_policy: ScorePolicy,
    pub archive_raw: bool,
}

impl PipelineConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = get("HALFLINE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let db_path = get("HALFLINE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("database").join("football_data.sqlite"));

        let timeout_secs = parse_or(&get, "HALFLINE_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?
            .clamp(1, 300);
        let max_retries = parse_or(&get, "HALFLINE_MAX_RETRIES", DEFAULT_MAX_RETRIES)?.clamp(1, 10);
        let backoff_base =
            parse_or(&get, "HALFLINE_BACKOFF_BASE", DEFAULT_BACKOFF_BASE)?.clamp(1.0, 10.0);
        let api_delay_ms =
            parse_or(&get, "HALFLINE_API_DELAY_MS", DEFAULT_API_DELAY_MS)?.clamp(0, 60_000);
        let batch_size = parse_or(&get, "HALFLINE_BATCH_SIZE", DEFAULT_BATCH_SIZE)?.clamp(1, 10_000);
        let per_page = parse_or(&get, "HALFLINE_PER_PAGE", DEFAULT_PER_PAGE)?.clamp(1, 50);
        let fixture_limit = match get("HALFLINE_FIXTURE_LIMIT") {
            Some(raw) => Some(parse_value::<usize>("HALFLINE_FIXTURE_LIMIT", &raw)?),
            None => None,
        }
        .filter(|n| *n > 0);

        let odds_filter = OddsFilter::new(
            parse_ids(&get, "HALFLINE_ODDS_MARKET_IDS", &[1])?,
            parse_ids(&get, "HALFLINE_ODDS_BOOKMAKER_IDS", &[20])?,
        );

        let defaults = FeatureConfig::default();
        let features = FeatureConfig {
            market_id: parse_or(&get, "HALFLINE_FEATURE_MARKET_ID", defaults.market_id)?,
            bookmaker_id: parse_or(&get, "HALFLINE_FEATURE_BOOKMAKER_ID", defaults.bookmaker_id)?,
            handicap_line: parse_finite(&get, "HALFLINE_HANDICAP_LINE", defaults.handicap_line)?,
            feature_stats: parse_stats(&get, "HALFLINE_FEATURE_STATS", &defaults.feature_stats)?,
            required_stats: parse_stats(&get, "HALFLINE_REQUIRED_STATS", &defaults.required_stats)?,
            pressure_feature: match get("HALFLINE_PRESSURE_FEATURE") {
                Some(raw) => parse_flag("HALFLINE_PRESSURE_FEATURE", &raw)?,
                None => defaults.pressure_feature,
            },
        };

        let score_policy = match get("HALFLINE_SCORE_POLICY") {
            Some(raw) => ScorePolicy::parse(&raw).ok_or(ConfigError::Invalid {
                key: "HALFLINE_SCORE_POLICY",
                value: raw,
            })?,
            None => ScorePolicy::default(),
        };

        let archive_raw = match get("HALFLINE_ARCHIVE_RAW") {
            Some(raw) => parse_flag("HALFLINE_ARCHIVE_RAW", &raw)?,
            None => true,
        };

        Ok(Self {
            api_key: get("SPORTMONKS_API_KEY"),
            api_base_url: get("SPORTMONKS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            data_dir,
            db_path,
            request_timeout: Duration::from_secs(timeout_secs),
            max_retries,
            backoff_base,
            api_delay: Duration::from_millis(api_delay_ms),
            batch_size,
            per_page,
            fixture_limit,
            odds_filter,
            features,
            score_policy,
            archive_raw,
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            backoff_base: self.backoff_base,
            ..RetryPolicy::default()
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// `NaN` and infinities parse as `f64` but would make every comparison false.
fn parse_finite(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value = parse_or(get, key, default)?;
    if !value.is_finite() {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

fn parse_ids(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    defaults: &[u64],
) -> Result<Vec<u64>, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(defaults.to_vec());
    };
    let mut ids = Vec::new();
    for part in raw.split([',', ';', ' ']).map(str::trim).filter(|s| !s.is_empty()) {
        let id = parse_value::<u64>(key, part)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(ConfigError::EmptyAllowList { key });
    }
    Ok(ids)
}

fn parse_stats(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    defaults: &[StatColumn],
) -> Result<Vec<StatColumn>, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(defaults.to_vec());
    };
    let mut out = Vec::new();
    for part in raw.split([',', ';', ' ']).map(str::trim).filter(|s| !s.is_empty()) {
        let column = StatColumn::from_str(part).map_err(|_| ConfigError::UnknownStat {
            key,
            value: part.to_string(),
        })?;
        if !out.contains(&column) {
            out.push(column);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PipelineConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        PipelineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_provider_conventions() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(
            cfg.db_path,
            PathBuf::from("data/database/football_data.sqlite")
        );
        assert!(cfg.odds_filter.markets.contains(&1));
        assert!(cfg.odds_filter.bookmakers.contains(&20));
        assert_eq!(cfg.features.handicap_line, -0.5);
        assert_eq!(cfg.require_api_key(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn values_are_clamped_and_parsed() {
        let cfg = config_from(&[
            ("SPORTMONKS_API_KEY", " secret "),
            ("HALFLINE_MAX_RETRIES", "99"),
            ("HALFLINE_ODDS_MARKET_IDS", "1, 28;1"),
            ("HALFLINE_FEATURE_STATS", "goals,corners"),
            ("HALFLINE_ARCHIVE_RAW", "off"),
        ])
        .unwrap();
        assert_eq!(cfg.require_api_key(), Ok("secret"));
        assert_eq!(cfg.max_retries, 10);
        assert_eq!(cfg.odds_filter.markets.len(), 2);
        assert_eq!(
            cfg.features.feature_stats,
            vec![StatColumn::Goals, StatColumn::Corners]
        );
        assert!(!cfg.archive_raw);
    }

    #[test]
    fn bad_values_are_errors() {
        assert_eq!(
            config_from(&[("HALFLINE_ODDS_BOOKMAKER_IDS", ",;")]).unwrap_err(),
            ConfigError::EmptyAllowList {
                key: "HALFLINE_ODDS_BOOKMAKER_IDS"
            }
        );
        assert!(matches!(
            config_from(&[("HALFLINE_FEATURE_STATS", "xg")]),
            Err(ConfigError::UnknownStat { .. })
        ));
        assert!(matches!(
            config_from(&[("HALFLINE_BATCH_SIZE", "lots")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn handicap_line_must_be_finite() {
        for raw in ["NaN", "inf", "-infinity"] {
            assert!(
                matches!(
                    config_from(&[("HALFLINE_HANDICAP_LINE", raw)]),
                    Err(ConfigError::Invalid {
                        key: "HALFLINE_HANDICAP_LINE",
                        ..
                    })
                ),
                "{raw}"
            );
        }
        let cfg = config_from(&[("HALFLINE_HANDICAP_LINE", "-1.5")]).unwrap();
        assert_eq!(cfg.features.handicap_line, -1.5);
    }

    #[test]
    fn pressure_feature_is_opt_in() {
        assert!(!config_from(&[]).unwrap().features.pressure_feature);
        let cfg = config_from(&[("HALFLINE_PRESSURE_FEATURE", "yes")]).unwrap();
        assert!(cfg.features.pressure_feature);
    }
}
