//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Weekday;
use chrono_tz::Tz;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use twt_core::Calendar;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// IANA zone used for civil period boundaries. Defaults to the system zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// First day of the week, e.g. `monday`.
    pub week_start: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("timezone", &self.timezone)
            .field("week_start", &self.week_start)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("twt.db"),
            timezone: None,
            week_start: "monday".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // TWT_DATABASE_PATH, TWT_TIMEZONE, TWT_WEEK_START
        figment = figment.merge(Env::prefixed("TWT_"));

        figment.extract()
    }

    /// The configured zone, or the system zone, or UTC.
    pub fn timezone(&self) -> Result<Tz> {
        if let Some(name) = &self.timezone {
            return name
                .parse::<Tz>()
                .map_err(|err| anyhow::anyhow!("invalid timezone {name:?}: {err}"));
        }
        match iana_time_zone::get_timezone() {
            Ok(name) => Ok(name.parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!(zone = %name, "unknown system timezone, using UTC");
                Tz::UTC
            })),
            Err(err) => {
                tracing::warn!(error = %err, "could not detect system timezone, using UTC");
                Ok(Tz::UTC)
            }
        }
    }

    /// Calendar conventions from `week_start`.
    pub fn calendar(&self) -> Result<Calendar> {
        let week_start: Weekday = self
            .week_start
            .parse()
            .ok()
            .with_context(|| format!("invalid week_start: {:?}", self.week_start))?;
        Ok(Calendar::new(week_start))
    }
}

/// Returns the platform-specific config directory for twt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("twt"))
}

/// Returns the platform-specific data directory for twt.
///
/// On Linux: `~/.local/share/twt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("twt"))
}
