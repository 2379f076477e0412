use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::{fs::OpenOptions, io::Write};

/// Timestamp format of every log record, e.g. '2023-05-04 13:02:11,042'
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// The default log level from the verbosity flags.  Quiet wins over verbose
///
/// # Example
/// ```
/// use hmas_tools::logging::log_level;
/// use log::LevelFilter;
///
/// assert_eq!(log_level(false, false), LevelFilter::Info);
/// assert_eq!(log_level(true, false), LevelFilter::Debug);
/// assert_eq!(log_level(true, true), LevelFilter::Warn);
/// ```
pub fn log_level(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Warn
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Starts the logger.  RUST_LOG overrides the level, and the records are appended to the log file
/// instead of stderr when one is given
pub fn init_logger(level: LevelFilter, log_file: Option<&str>) -> Result<()> {
    let mut builder =
        Builder::from_env(Env::default().default_filter_or(level.to_string().to_lowercase()));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {} {}({}) - {}",
            Local::now().format(LOG_TIME_FORMAT),
            record.level(),
            record.module_path().unwrap_or("hmas_tools"),
            record.line().unwrap_or(0),
            record.args()
        )
    });
    if let Some(log_file) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context(format!("Failed to open log file {}", log_file))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("Failed to start the logger")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_format_test() {
        let stamp = Local::now().format(LOG_TIME_FORMAT).to_string();
        // yyyy-mm-dd hh:mm:ss,mmm
        assert_eq!(stamp.len(), 23);
        assert_eq!(&stamp[19..20], ",");
    }
}
