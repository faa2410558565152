use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use time::{format_description::parse, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{
    fmt::{
        time::{FormatTime, OffsetTime},
        writer::BoxMakeWriter,
    },
    FmtSubscriber,
};

fn local_timer() -> anyhow::Result<impl FormatTime> {
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let format = parse("[year]-[month]-[day] [hour]:[minute]:[second]")
        .context("invalid log time format")?;
    Ok(OffsetTime::new(local_offset, format))
}

/// Log everything (trace level) to `<dir>/<date>_<time>_log.txt` and return the file path.
///
/// # Error
/// If the file cannot be created or a global subscriber is already set.
pub fn init_logger(dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join(get_log_file_name()?);
    let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
    let writer = BoxMakeWriter::new(file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(local_timer()?)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).map_err(|e| {
        anyhow!("could not set global default tracing subscriber ({e}), disable file logs if a subscriber is already set")
    })?;
    Ok(path)
}

/// Warnings and above to stderr, for the CLI when file logging is off.
pub fn init_console_logger() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_timer(local_timer()?)
        .with_writer(std::io::stderr)
        .finish();
    set_global_default(subscriber).context("could not set global default tracing subscriber")
}

fn get_log_file_name() -> anyhow::Result<String> {
    let format = parse("[year]-[month]-[day]_[hour]:[minute]:[second]_log.txt")
        .context("invalid log file name format")?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format).context("cannot format log file name")
}

#[cfg(test)]
mod logger_tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        let name = get_log_file_name().unwrap();
        assert!(name.ends_with("_log.txt"));
        // 2025-03-02_18:40:11_log.txt
        assert_eq!(name.len(), "2025-03-02_18:40:11_log.txt".len());
    }
}
