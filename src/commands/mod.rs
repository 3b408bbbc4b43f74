pub mod check;
pub mod sync;

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use orgcal_caldav::{CaldavCalendar, Credentials, calendar_url};
use orgcal_core::config::{CalendarConfig, OrgcalConfig};

/// Pick the calendars to operate on. An unknown filter is an error.
pub fn resolve_calendars(config: &OrgcalConfig, filter: Option<&str>) -> Result<Vec<CalendarConfig>> {
    let selected: Vec<CalendarConfig> = config.select(filter).into_iter().cloned().collect();

    if let Some(filter) = filter
        && selected.is_empty()
    {
        let available: Vec<_> = config
            .calendars
            .iter()
            .map(|c| c.display_name().to_string())
            .collect();
        anyhow::bail!(
            "Calendar '{}' not found. Available: {}",
            filter,
            available.join(", ")
        );
    }

    Ok(selected)
}

/// Build the CalDAV client for a calendar, prompting for a password if none is
/// configured and we are attached to a terminal.
pub fn connect(calendar: &CalendarConfig, timezone: Tz) -> Result<CaldavCalendar> {
    let url = calendar_url(&calendar.url, &calendar.id)?;

    let credentials = match &calendar.username {
        Some(username) => {
            let password = match calendar.resolve_password()? {
                Some(password) => Some(password),
                None if std::io::stdin().is_terminal() => Some(prompt_password(username, url.as_str())?),
                None => None,
            };
            Some(Credentials {
                username: username.clone(),
                password,
            })
        }
        None => None,
    };

    let timeout = Duration::from_secs(calendar.timeout_secs);
    Ok(CaldavCalendar::new(url, credentials, timeout, timezone)?)
}

fn prompt_password(username: &str, url: &str) -> Result<String> {
    let prompt = format!("Password for {} at {}: ", username, url);
    rpassword::prompt_password(&prompt).context("Failed to read password")
}
