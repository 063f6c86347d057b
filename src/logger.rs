//! Tracing subscriber setup.

use std::fs::File;

use anyhow::Context;
use time::{
    format_description::{self, parse},
    OffsetDateTime,
};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{
    fmt::{time::OffsetTime, writer::BoxMakeWriter},
    FmtSubscriber,
};

use crate::configuration::Configuration;

const TIME_FORMAT: &str = "[day]-[month]-[year] [hour]:[minute]:[second]";

/// Install the subscriber requested by `config`: a log file when `log` is set, stdout when
/// `verbose` is set, nothing otherwise.
pub fn init_from_config(config: &Configuration) -> anyhow::Result<()> {
    if config.log() {
        init_logger()
    } else if config.verbose() {
        init_stdout_logger()
    } else {
        Ok(())
    }
}

/// Log everything to a timestamped file in the working directory.
pub fn init_logger() -> anyhow::Result<()> {
    let file_name = get_log_file_name()?;
    let file = File::create(&file_name).with_context(|| format!("cannot create {file_name}"))?;
    install(BoxMakeWriter::new(file), false)
}

/// Log everything to stdout.
pub fn init_stdout_logger() -> anyhow::Result<()> {
    install(BoxMakeWriter::new(std::io::stdout), true)
}

fn install(writer: BoxMakeWriter, ansi: bool) -> anyhow::Result<()> {
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(local_offset, format_description::parse(TIME_FORMAT)?);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(ansi)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).context(
        "could not set global default tracing subscriber, disable logs if one is already set",
    )
}

fn get_log_file_name() -> anyhow::Result<String> {
    let format = parse("[year]-[month]-[day]_[hour]-[minute]-[second]_bridge_log.txt")?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(now.format(&format)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_name_is_timestamped() {
        let name = get_log_file_name().unwrap();
        assert!(name.ends_with("_bridge_log.txt"));
        assert!(!name.contains(':'));
    }

    #[test]
    fn disabled_config_installs_nothing() {
        assert!(init_from_config(&Configuration::new()).is_ok());
    }
}
