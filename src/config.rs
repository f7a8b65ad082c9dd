use crate::constants::{
    DB_PATH_ENV, DEFAULT_API_BASE_URL, DEFAULT_CONFIG_PATH, DEFAULT_COUNTRIES, DEFAULT_CSV_PATH,
    DEFAULT_INDICATORS, DEFAULT_TABLE, LEGACY_HEALTH_ECONOMY_COLUMNS,
};
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default = "default_countries")]
    pub countries: Vec<Country>,
    #[serde(default = "default_indicators")]
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// An indicator API code and the column name its values land in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Indicator {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; `WORLDBANK_DB_PATH` takes precedence
    pub path: Option<PathBuf>,
    #[serde(default = "default_table")]
    pub table: String,
    /// Explicit insert column list. `"legacy"` selects the historical
    /// `Health_economy` subset; absent means every column of the CSV.
    pub columns: Option<ColumnsSetting>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColumnsSetting {
    Preset(String),
    List(Vec<String>),
}

/// Which columns the loader inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelection {
    /// `country_code, date_year` and every indicator column in the CSV
    FromFile,
    /// Exactly these columns, in this order
    Explicit(Vec<String>),
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            table: default_table(),
            columns: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            output: OutputConfig::default(),
            database: DatabaseConfig::default(),
            countries: default_countries(),
            indicators: default_indicators(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_csv_path() -> PathBuf {
    PathBuf::from(DEFAULT_CSV_PATH)
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_countries() -> Vec<Country> {
    DEFAULT_COUNTRIES
        .iter()
        .map(|(code, name)| Country {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect()
}

fn default_indicators() -> Vec<Indicator> {
    DEFAULT_INDICATORS
        .iter()
        .map(|(code, name)| Indicator {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect()
}

impl Config {
    /// Load configuration. An explicit path must exist; otherwise
    /// `config.toml` in the working directory is used when present and the
    /// built-in defaults when not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                info!("No {} found, using built-in configuration", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.normalize()?;
        Ok(config)
    }

    /// Merge duplicate indicator codes the way a keyed map literal would:
    /// the first position is kept, the last name wins.
    fn normalize(&mut self) -> Result<()> {
        if self.countries.is_empty() {
            return Err(PipelineError::Config("no countries configured".into()));
        }
        if self.indicators.is_empty() {
            return Err(PipelineError::Config("no indicators configured".into()));
        }

        let mut merged: Vec<Indicator> = Vec::with_capacity(self.indicators.len());
        for indicator in self.indicators.drain(..) {
            match merged.iter_mut().find(|i| i.code == indicator.code) {
                Some(existing) => {
                    warn!(code = %indicator.code, "Duplicate indicator code in config; keeping first position");
                    existing.name = indicator.name;
                }
                None => merged.push(indicator),
            }
        }
        self.indicators = merged;
        Ok(())
    }

    /// Destination database path: CLI override, then environment, then
    /// config. There is no built-in default.
    pub fn database_path(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(p) = cli_override {
            return Ok(p.to_path_buf());
        }
        if let Ok(p) = std::env::var(DB_PATH_ENV) {
            if !p.trim().is_empty() {
                return Ok(PathBuf::from(p));
            }
        }
        self.database.path.clone().ok_or_else(|| {
            PipelineError::Config(format!(
                "No database path: pass --database, set {} or [database].path",
                DB_PATH_ENV
            ))
        })
    }

    pub fn column_selection(&self) -> Result<ColumnSelection> {
        match &self.database.columns {
            None => Ok(ColumnSelection::FromFile),
            Some(ColumnsSetting::Preset(p)) if p == "legacy" => Ok(ColumnSelection::Explicit(
                LEGACY_HEALTH_ECONOMY_COLUMNS
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            )),
            Some(ColumnsSetting::Preset(p)) if p == "all" => Ok(ColumnSelection::FromFile),
            Some(ColumnsSetting::Preset(p)) => Err(PipelineError::Config(format!(
                "unknown column preset '{p}' (expected \"all\" or \"legacy\")"
            ))),
            Some(ColumnsSetting::List(list)) if list.is_empty() => {
                Err(PipelineError::Config("[database].columns is empty".into()))
            }
            Some(ColumnsSetting::List(list)) => Ok(ColumnSelection::Explicit(list.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let config = Config::default();
        assert_eq!(config.countries.len(), 3);
        assert_eq!(config.indicators.len(), 22);
        assert_eq!(config.indicators[0].name, "life_expectancy");
        assert_eq!(config.countries[2].name, "United States of America");
        assert_eq!(config.api.base_url, "https://api.worldbank.org/v2");
        assert_eq!(config.column_selection().unwrap(), ColumnSelection::FromFile);
    }

    #[test]
    fn test_parse_toml_preserves_indicator_order() {
        let config = Config::from_toml_str(
            r#"
            [api]
            base_url = "http://localhost:9999/v2"

            [[countries]]
            code = "CAN"
            name = "Canada"

            [[indicators]]
            code = "SP.POP.TOTL"
            name = "population_total"

            [[indicators]]
            code = "SP.DYN.LE00.IN"
            name = "life_expectancy"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://localhost:9999/v2");
        assert_eq!(config.countries.len(), 1);
        let names: Vec<_> = config.indicators.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["population_total", "life_expectancy"]);
        assert_eq!(config.database.table, "health_economy");
    }

    #[test]
    fn test_duplicate_codes_keep_first_position_last_name() {
        let config = Config::from_toml_str(
            r#"
            [[indicators]]
            code = "A"
            name = "first"

            [[indicators]]
            code = "B"
            name = "second"

            [[indicators]]
            code = "A"
            name = "renamed"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.indicators,
            vec![
                Indicator { code: "A".into(), name: "renamed".into() },
                Indicator { code: "B".into(), name: "second".into() },
            ]
        );
    }

    #[test]
    fn test_column_presets() {
        let legacy = Config::from_toml_str("[database]\ncolumns = \"legacy\"\n").unwrap();
        match legacy.column_selection().unwrap() {
            ColumnSelection::Explicit(cols) => {
                assert_eq!(cols.len(), 21);
                assert!(!cols.contains(&"gni_per_capita_usd".to_string()));
            }
            other => panic!("unexpected selection {other:?}"),
        }

        let list = Config::from_toml_str("[database]\ncolumns = [\"country_code\", \"date_year\"]\n").unwrap();
        assert_eq!(
            list.column_selection().unwrap(),
            ColumnSelection::Explicit(vec!["country_code".into(), "date_year".into()])
        );

        let bad = Config::from_toml_str("[database]\ncolumns = \"some\"\n").unwrap();
        assert!(bad.column_selection().is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_toml_str(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.countries.len(), 3);
        assert_eq!(config.indicators[2].name, "gdp_usd");
        assert_eq!(config.column_selection().unwrap(), ColumnSelection::FromFile);
    }

    #[test]
    fn test_empty_country_list_is_rejected() {
        assert!(Config::from_toml_str("countries = []\n").is_err());
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Run `f` with `WORLDBANK_DB_PATH` set to `value` (or unset), restoring
    /// the previous value afterwards.
    fn with_db_env<T>(value: Option<&str>, f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved = std::env::var(DB_PATH_ENV).ok();
        match value {
            Some(v) => std::env::set_var(DB_PATH_ENV, v),
            None => std::env::remove_var(DB_PATH_ENV),
        }
        let out = f();
        match saved {
            Some(v) => std::env::set_var(DB_PATH_ENV, v),
            None => std::env::remove_var(DB_PATH_ENV),
        }
        out
    }

    fn config_with_db_path(path: &str) -> Config {
        let mut config = Config::default();
        config.database.path = Some(PathBuf::from(path));
        config
    }

    #[test]
    fn test_database_path_env_beats_config() {
        let config = config_with_db_path("/data/from_config.db");
        let path = with_db_env(Some("/data/from_env.db"), || config.database_path(None)).unwrap();
        assert_eq!(path, PathBuf::from("/data/from_env.db"));
    }

    #[test]
    fn test_blank_env_falls_through_to_config() {
        let config = config_with_db_path("/data/from_config.db");
        let path = with_db_env(Some("   "), || config.database_path(None)).unwrap();
        assert_eq!(path, PathBuf::from("/data/from_config.db"));
    }

    #[test]
    fn test_database_path_without_any_source_is_config_error() {
        let config = Config::default();
        let err = with_db_env(None, || config.database_path(None)).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_database_path_prefers_cli_override() {
        let config = config_with_db_path("/data/from_config.db");
        let path = with_db_env(Some("/data/from_env.db"), || {
            config.database_path(Some(Path::new("/tmp/x.db")))
        })
        .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/x.db"));
    }
}
