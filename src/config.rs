//! Generator configuration (pcr-ics.toml).
//!
//! Every key is optional; command-line flags take precedence over the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use pcr_ics_core::CalendarHeader;
use pcr_ics_core::schedule::{BuildOptions, local_to_utc};
use serde::Deserialize;

/// Config file looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "pcr-ics.toml";

const DEFAULT_VERSION_URL: &str = "https://redive.estertion.win/last_version_cn.json";
const DEFAULT_DATABASE_URL: &str = "https://redive.estertion.win/db/redive_cn.db.br";
const DEFAULT_REFERENCE: &str = "https://wlkz.github.io/pcr_ics/dist/pcr_cn.ics";
const DEFAULT_TARGET: &str = "./deploy/dist/pcr_cn.ics";
const DEFAULT_RELEASE_TIME: &str = "2020-04-17T11:00:00";

/// What to do when a reference calendar is given but can't be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BadReferencePolicy {
    /// Abort the run
    #[default]
    Fail,
    /// Log a warning and generate from scratch
    Fresh,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Endpoint reporting the data site's current database version
    pub version_url: String,
    /// Brotli-compressed SQLite master database
    pub database_url: String,
    /// Previously published calendar: a path, an http(s) URL or "none"
    pub reference: String,
    /// Where the generated calendar is written
    pub target: PathBuf,
    pub on_bad_reference: BadReferencePolicy,
    /// Timezone of the feed's local times
    pub timezone: String,
    /// Server launch, as local time in `timezone`
    pub release_time: NaiveDateTime,
    pub calendar: CalendarSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    pub name: String,
    pub description: String,
}

impl Default for CalendarSection {
    fn default() -> Self {
        let header = CalendarHeader::default();
        CalendarSection {
            name: header.name,
            description: header.description,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version_url: DEFAULT_VERSION_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            reference: DEFAULT_REFERENCE.to_string(),
            target: PathBuf::from(DEFAULT_TARGET),
            on_bad_reference: BadReferencePolicy::default(),
            timezone: chrono_tz::Asia::Shanghai.name().to_string(),
            release_time: NaiveDateTime::from_str(DEFAULT_RELEASE_TIME)
                .unwrap_or(NaiveDateTime::MIN),
            calendar: CalendarSection::default(),
        }
    }
}

impl Config {
    /// Load config from an explicit path, or from ./pcr-ics.toml when present.
    ///
    /// An explicit path that doesn't exist is an error; a missing default
    /// file just means built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found at {}", path.display());
            }
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        // Fail on a bad timezone now rather than halfway through a run
        config.tz()?;
        Ok(config)
    }

    pub fn tz(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone)
            .map_err(|e| anyhow::anyhow!("Unknown timezone '{}': {}", self.timezone, e))
    }

    pub fn header(&self) -> Result<CalendarHeader> {
        Ok(CalendarHeader {
            name: self.calendar.name.clone(),
            description: self.calendar.description.clone(),
            timezone: self.tz()?.name().to_string(),
        })
    }

    pub fn build_options(&self) -> Result<BuildOptions> {
        let timezone = self.tz()?;
        let release_time =
            local_to_utc(&self.release_time, timezone).context("Invalid release_time")?;

        Ok(BuildOptions {
            timezone,
            release_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    #[test]
    fn test_defaults_match_build_options_default() {
        let config = Config::default();
        let options = config.build_options().unwrap();
        let expected = BuildOptions::default();

        assert_eq!(options.timezone, expected.timezone);
        assert_eq!(options.release_time, expected.release_time);
        assert_eq!(config.on_bad_reference, BadReferencePolicy::Fail);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
reference = "none"
on_bad_reference = "fresh"
release_time = "2021-01-01T00:00:00"

[calendar]
name = "测试日历"
"#,
        )
        .unwrap();

        assert_eq!(config.reference, "none");
        assert_eq!(config.on_bad_reference, BadReferencePolicy::Fresh);
        assert_eq!(config.calendar.name, "测试日历");
        assert_eq!(config.calendar.description, CalendarSection::default().description);
        assert_eq!(config.version_url, DEFAULT_VERSION_URL);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(
            config.build_options().unwrap().release_time,
            Utc.with_ymd_and_hms(2020, 12, 31, 16, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let err = Config::from_toml(r#"timezone = "Mars/Olympus_Mons""#).unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"), "{err}");
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"target = "out/cal.ics""#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.target, PathBuf::from("out/cal.ics"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
