//! orgcal configuration, read from `~/.config/orgcal/config.toml`.
//!
//! ```toml
//! timezone = "Europe/Berlin"
//!
//! [[calendars]]
//! url = "https://dav.example.com"
//! id = "/calendars/me/tasks/"
//! username = "me"
//! password_file = "~/.secrets/dav"
//! org_files = ["~/org/agenda.org", "~/org/projects"]
//! sync_cutoff = "thisweek"
//! ```

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::derive::Vocabulary;
use crate::error::ConfigError;
use crate::outline::TodoKeywords;
use crate::outline::source::SyncCutoff;

const DEFAULT_SYNC_CUTOFF: &str = "thisweek";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_sync_cutoff() -> String {
    DEFAULT_SYNC_CUTOFF.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrgcalConfig {
    /// IANA zone name. Defaults to the system zone.
    pub timezone: Option<String>,

    pub cache_dir: Option<PathBuf>,

    pub todo_keywords: Option<Vec<String>>,
    pub done_keywords: Option<Vec<String>>,
    pub priorities: Option<Vec<String>>,

    #[serde(default)]
    pub calendars: Vec<CalendarConfig>,
}

/// One `[[calendars]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct CalendarConfig {
    pub name: Option<String>,

    /// Server base URL
    pub url: String,

    /// Calendar collection path, joined to `url`
    pub id: String,

    pub username: Option<String>,
    pub password: Option<String>,
    pub password_file: Option<PathBuf>,

    pub org_files: Vec<String>,

    #[serde(default = "default_sync_cutoff")]
    pub sync_cutoff: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl OrgcalConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("orgcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path` (or the default location), with `ORGCAL_*` environment
    /// variables overriding top-level keys.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()),
            None => Self::default_path()?,
        };

        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }

        let config: OrgcalConfig = Config::builder()
            .add_source(File::from(path.as_path()).format(FileFormat::Toml))
            .add_source(Environment::with_prefix("ORGCAL"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        tracing::debug!(path = %path.display(), calendars = config.calendars.len(), "Loaded config");

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.calendars.is_empty() {
            return Err(ConfigError::Invalid("no [[calendars]] configured".into()));
        }
        self.timezone()?;
        for calendar in &self.calendars {
            calendar.cutoff()?;
            if calendar.org_files.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "calendar '{}' has no org_files",
                    calendar.display_name()
                )));
            }
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        match &self.timezone {
            Some(name) => name
                .parse()
                .map_err(|_| ConfigError::UnknownTimeZone(name.clone())),
            None => Ok(iana_time_zone::get_timezone()
                .ok()
                .and_then(|name| name.parse().ok())
                .unwrap_or(Tz::UTC)),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).as_ref()),
            None => dirs::cache_dir()
                .map(|d| d.join("orgcal"))
                .unwrap_or_else(|| PathBuf::from(".orgcal_cache")),
        }
    }

    /// Keywords and priorities for the event model. Configured lists replace the
    /// defaults.
    pub fn vocabulary(&self) -> Result<Vocabulary, ConfigError> {
        let mut vocabulary = Vocabulary::new(self.timezone()?);
        let defaults = TodoKeywords::default();

        vocabulary.keywords = TodoKeywords {
            todo: self.todo_keywords.clone().unwrap_or(defaults.todo),
            done: self.done_keywords.clone().unwrap_or(defaults.done),
        };
        if let Some(priorities) = &self.priorities {
            vocabulary.priorities = priorities.clone();
        }

        Ok(vocabulary)
    }

    /// Find calendars by id or name. `None` selects all of them.
    pub fn select(&self, filter: Option<&str>) -> Vec<&CalendarConfig> {
        self.calendars
            .iter()
            .filter(|c| filter.is_none_or(|f| c.id == f || c.name.as_deref() == Some(f)))
            .collect()
    }
}

impl CalendarConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn cutoff(&self) -> Result<SyncCutoff, ConfigError> {
        SyncCutoff::parse(&self.sync_cutoff).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Password from `password`, or the first line of `password_file`.
    pub fn resolve_password(&self) -> Result<Option<String>, ConfigError> {
        if let Some(password) = &self.password {
            return Ok(Some(password.clone()));
        }

        let Some(file) = &self.password_file else {
            return Ok(None);
        };

        let path = PathBuf::from(shellexpand::tilde(&file.to_string_lossy()).as_ref());
        let content = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::PasswordFile { path, source })?;

        Ok(content.lines().next().map(|l| l.trim().to_string()))
    }
}
