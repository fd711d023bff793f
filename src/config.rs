//! Configuration management for the reader engine

use serde::Deserialize;
use std::env;

use crate::annotations::{HighlightColor, HIGHLIGHT_TEXT_LIMIT};
use crate::error::{ReaderError, Result};
use crate::search::{SearchOptions, MIN_QUERY_CHARS};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub search: SearchOptions,
    pub highlights: HighlightSettings,
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HighlightSettings {
    pub default_color: HighlightColor,
    /// Highlight text snapshots are clipped to this many characters
    pub text_limit: usize,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        HighlightSettings {
            default_color: HighlightColor::default(),
            text_limit: HIGHLIGHT_TEXT_LIMIT,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig {
                url: "sqlite:./reader.db".to_string(),
            },
            search: SearchOptions::default(),
            highlights: HighlightSettings::default(),
            log_filter: "los_libros_reader=info".to_string(),
        }
    }
}

impl Config {
    /// Read `READER_*` variables, loading `.env` first. Unset variables keep defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let text_limit = match lookup("READER_HIGHLIGHT_TEXT_LIMIT") {
            Some(value) => parse_number("READER_HIGHLIGHT_TEXT_LIMIT", &value)?,
            None => defaults.highlights.text_limit,
        };

        Ok(Config {
            database: DatabaseConfig {
                url: lookup("READER_DATABASE_URL").unwrap_or(defaults.database.url),
            },
            search: SearchOptions {
                min_query_chars: match lookup("READER_SEARCH_MIN_CHARS") {
                    Some(value) => parse_number("READER_SEARCH_MIN_CHARS", &value)?,
                    None => defaults.search.min_query_chars,
                }
                .max(MIN_QUERY_CHARS),
                limit: lookup("READER_SEARCH_LIMIT")
                    .map(|value| parse_number("READER_SEARCH_LIMIT", &value))
                    .transpose()?,
            },
            highlights: HighlightSettings {
                default_color: match lookup("READER_DEFAULT_COLOR") {
                    Some(value) => value.parse().map_err(ReaderError::Config)?,
                    None => defaults.highlights.default_color,
                },
                text_limit: text_limit.min(HIGHLIGHT_TEXT_LIMIT),
            },
            log_filter: lookup("READER_LOG").unwrap_or(defaults.log_filter),
        })
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| ReaderError::Config(format!("{}={}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.database.url, "sqlite:./reader.db");
        assert_eq!(config.search, SearchOptions::default());
        assert_eq!(config.highlights.default_color, HighlightColor::Yellow);
        assert_eq!(config.highlights.text_limit, 500);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("READER_DATABASE_URL", "sqlite::memory:"),
            ("READER_SEARCH_MIN_CHARS", "3"),
            ("READER_SEARCH_LIMIT", "50"),
            ("READER_DEFAULT_COLOR", "Blue"),
            ("READER_HIGHLIGHT_TEXT_LIMIT", "9000"),
        ]))
        .unwrap();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.search.min_query_chars, 3);
        assert_eq!(config.search.limit, Some(50));
        assert_eq!(config.highlights.default_color, HighlightColor::Blue);
        // Never above the stored snapshot limit
        assert_eq!(config.highlights.text_limit, 500);
    }

    #[test]
    fn test_min_query_chars_has_a_floor() {
        for value in ["0", "1"] {
            let config =
                Config::from_lookup(lookup(&[("READER_SEARCH_MIN_CHARS", value)])).unwrap();
            assert_eq!(config.search.min_query_chars, MIN_QUERY_CHARS);
        }
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("READER_SEARCH_LIMIT", "many")])),
            Err(ReaderError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("READER_DEFAULT_COLOR", "orange")])),
            Err(ReaderError::Config(_))
        ));
    }
}
