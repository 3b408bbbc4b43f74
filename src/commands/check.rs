use anyhow::Result;
use orgcal_core::config::{CalendarConfig, OrgcalConfig};
use orgcal_core::outline::source::discover_files;
use owo_colors::OwoColorize;

use crate::render::calendar_header;

/// Verify config, credentials, org files and remote reachability per calendar.
pub async fn run(config: &OrgcalConfig, calendars: Vec<CalendarConfig>) -> Result<()> {
    let timezone = config.timezone()?;
    println!("{} {}", "Time zone:".dimmed(), timezone.name());
    println!(
        "{} {}\n",
        "Snapshots:".dimmed(),
        config.cache_dir().display()
    );

    let mut failures = 0;

    for calendar in &calendars {
        println!("{}", calendar_header(calendar.display_name()));

        match discover_files(&calendar.org_files) {
            Ok(files) => println!("   {} {} org files", "✓".green(), files.len()),
            Err(e) => {
                failures += 1;
                println!("   {} {}", "✗".red(), e.to_string().red());
            }
        }

        let reachable = match super::connect(calendar, timezone) {
            Ok(port) => port.check().await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        match reachable {
            Ok(()) => println!("   {} {}", "✓".green(), calendar.url.dimmed()),
            Err(e) => {
                failures += 1;
                println!("   {} {}", "✗".red(), format!("{e:#}").red());
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} check(s) failed", failures);
    }

    Ok(())
}
