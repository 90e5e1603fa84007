//! File logger installed when logging is enabled in
//! [`LeagueConfig`](crate::configuration::LeagueConfig).

use std::fs::File;

use anyhow::Context;
use time::{format_description, OffsetDateTime, UtcOffset};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Installs a file-backed subscriber logging everything down to TRACE.
///
/// Timestamps use the local offset, falling back to UTC when it cannot be
/// determined. Fails when the log file cannot be created or a global
/// subscriber is already installed.
pub fn init_logger() -> anyhow::Result<()> {
    let file_name = log_file_name()?;
    let file = File::create(&file_name)
        .with_context(|| format!("could not create log file {file_name}"))?;
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")?,
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(BoxMakeWriter::new(file))
        .finish();

    set_global_default(subscriber)
        .context("a global tracing subscriber is already set; disable file logging")?;
    Ok(())
}

/// Timestamped log file name, so successive runs never clobber each other.
fn log_file_name() -> anyhow::Result<String> {
    let format =
        format_description::parse("[year]-[month]-[day]_[hour]:[minute]:[second]_league_log.txt")?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(now.format(&format)?)
}
