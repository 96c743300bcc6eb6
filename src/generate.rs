//! The generation pipeline: fetch, reconcile, serialize, write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pcr_ics_core::ics::write_calendar;
use pcr_ics_core::schedule::{BuildOptions, ScheduleFeed, build_records};
use pcr_ics_core::{Calendar, CalendarHeader, Clock, ReconcileStats, SystemClock, reconcile};
use tracing::{debug, info};

use crate::config::{BadReferencePolicy, Config};
use crate::reference::{self, ReferenceSource};
use crate::source::FeedClient;

/// Settings for one run, after merging CLI flags over the config file
pub struct RunOptions {
    pub reference: ReferenceSource,
    pub target: PathBuf,
    pub policy: BadReferencePolicy,
    pub force: bool,
    pub config: Config,
}

pub async fn run(opts: RunOptions) -> Result<()> {
    info!("pcr-ics {} start", env!("CARGO_PKG_VERSION"));
    info!("reference calendar: {}", opts.reference);

    let header = opts.config.header()?;
    let build_options = opts.config.build_options()?;
    let client = FeedClient::new(&opts.config.version_url, &opts.config.database_url)?;

    let reference = reference::load(&opts.reference, client.http(), opts.policy).await?;
    let reference_version = reference.as_ref().and_then(|r| r.calendar.version.clone());
    info!(
        "reference calendar version: {}",
        reference_version.as_deref().unwrap_or("(none)")
    );

    let latest_version = client.latest_version().await?;
    info!("data site version: {}", latest_version);

    if let Some(ref reference) = reference {
        if should_republish(reference_version.as_deref(), &latest_version, opts.force) {
            info!("calendar is up to date, republishing the reference unchanged");
            write_target(&opts.target, &reference.raw)?;
            info!("target {} is saved", opts.target.display());
            return Ok(());
        }
    }
    if opts.force {
        debug!("regeneration forced");
    }

    info!("downloading database version {}", latest_version);
    let feed = client.fetch_schedule(&latest_version).await?;

    let prior = reference.as_ref().map(|r| &r.calendar);
    let (calendar, stats) = regenerate(&feed, prior, header, &build_options, &SystemClock)?;
    info!("reconciled {} events: {}", calendar.len(), stats);

    write_target(&opts.target, &write_calendar(&calendar))?;
    info!("target {} is saved", opts.target.display());

    Ok(())
}

/// Whether the reference calendar already reflects the latest data version
pub fn should_republish(reference_version: Option<&str>, latest: &str, force: bool) -> bool {
    !force && reference_version == Some(latest)
}

/// Build this run's calendar from the feed, carrying metadata over from `prior`
pub fn regenerate(
    feed: &ScheduleFeed,
    prior: Option<&Calendar>,
    header: CalendarHeader,
    options: &BuildOptions,
    clock: &dyn Clock,
) -> Result<(Calendar, ReconcileStats)> {
    let (records, build_stats) = build_records(feed, options);
    info!(
        "feed version {}: {} rows, {} events, {} malformed, {} ignored",
        feed.truth_version,
        build_stats.rows,
        build_stats.records,
        build_stats.malformed,
        build_stats.ignored
    );

    let reconciliation =
        reconcile(records, prior, clock).context("Failed to reconcile with reference calendar")?;

    let calendar = Calendar::new(
        header,
        Some(feed.truth_version.clone()),
        reconciliation.entries,
    );

    Ok((calendar, reconciliation.stats))
}

/// Write the calendar text, creating parent directories as needed
pub fn write_target(target: &Path, content: &str) -> Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    std::fs::write(target, content)
        .with_context(|| format!("Failed to write calendar to {}", target.display()))
}
