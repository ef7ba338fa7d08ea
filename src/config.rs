use std::{env, fmt::Debug, fmt::Display, path::PathBuf, str::FromStr};

use log::info;

use crate::error::ConfigError;
use crate::quiz::matcher::MatchPolicy;

pub struct Config {
    pub db_path: PathBuf,
    pub catalog_path: PathBuf,
    pub match_policy: MatchPolicy,
}

impl Config {
    /// Reads the environment. `.env` is expected to be loaded already.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = MatchPolicy::default();
        Ok(Self {
            db_path: try_load(&lookup, "QUIZ_DB_PATH", PathBuf::from("quiz.sqlite"))?,
            catalog_path: try_load(&lookup, "CATALOG_PATH", PathBuf::from("catalog.json"))?,
            match_policy: MatchPolicy {
                exact_limit: try_load(&lookup, "MATCH_EXACT_LIMIT", defaults.exact_limit)?,
                fallback_limit: try_load(&lookup, "MATCH_FALLBACK_LIMIT", defaults.fallback_limit)?,
            },
        })
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Debug,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => {
            info!("{key} not set, using default: {default:?}");
            Ok(default)
        }
    }
}
