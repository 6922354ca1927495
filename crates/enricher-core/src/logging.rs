//! Logging utilities with indicatif integration

use indicatif::MultiProgress;

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// One log line, shared by both output modes:
/// `<timestamp> [LEVEL] message`, plus ` (target)` at debug and below so
/// engine internals can be told apart from phase output.
fn format_line(record: &log::Record, color: bool, timestamp: impl std::fmt::Display) -> String {
    let (pre, label, post) = level_style(record.level(), color);
    if record.level() >= log::Level::Debug {
        format!(
            "{timestamp} [{pre}{label}{post}] {} ({})",
            record.args(),
            record.target()
        )
    } else {
        format!("{timestamp} [{pre}{label}{post}] {}", record.args())
    }
}

/// Logger that prints through indicatif MultiProgress so lines don't tear
/// the run bar. Filtering stays with the wrapped env_logger.
pub struct IndicatifLogger {
    filter: env_logger::Logger,
    multi: MultiProgress,
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        log::Log::enabled(&self.filter, metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.filter.matches(record) {
            return;
        }
        let time = chrono::Local::now().format("%H:%M:%S");
        let line = format_line(record, true, time);
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {}
}

/// Initialize logging.
///
/// `level` is the configured default filter (e.g. `"info"`), replaced by
/// `debug` when `debug` is set; `RUST_LOG` still wins over both. With a
/// `MultiProgress` the logger is bridged through indicatif (TTY mode).
pub fn init_logging(
    level: &str,
    debug: bool,
    multi: Option<&MultiProgress>,
) -> Result<(), log::SetLoggerError> {
    use std::io::Write;

    let default_level = if debug { "debug" } else { level };
    let env = env_logger::Env::default().default_filter_or(default_level);

    match multi {
        Some(multi) => {
            let filter = env_logger::Builder::from_env(env).build();
            let max_level = filter.filter();
            log::set_boxed_logger(Box::new(IndicatifLogger {
                filter,
                multi: multi.clone(),
            }))?;
            log::set_max_level(max_level);
            Ok(())
        }
        // Non-TTY: no ANSI colors, full timestamp for log aggregation
        None => env_logger::Builder::from_env(env)
            .format(|buf, record| {
                writeln!(buf, "{}", format_line(record, false, buf.timestamp_seconds()))
            })
            .try_init(),
    }
}
