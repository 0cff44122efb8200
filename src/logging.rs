use std::io::{stderr, IsTerminal, Write};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Writes diagnostics to stderr so stdout only carries the generated file.
struct StderrLogger {
    color: bool,
}

fn level2color(level: Level) -> u8 {
    match level {
        Level::Error => 31, // Red
        Level::Warn => 93,  // BrightYellow
        Level::Info => 0,
        Level::Debug => 32, // Green
        Level::Trace => 90, // BrightBlack
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "error: ",
            Level::Warn => "warning: ",
            Level::Info => "",
            Level::Debug => "[D] ",
            Level::Trace => "[T] ",
        };
        let mut err = stderr().lock();
        // nowhere left to report a failed diagnostic write
        let _ = match (self.color, level2color(record.level())) {
            (true, color) if color != 0 => writeln!(
                err,
                "\u{1B}[{}m{}{}\u{1B}[0m",
                color,
                tag,
                record.args()
            ),
            _ => writeln!(err, "{}{}", tag, record.args()),
        };
    }

    fn flush(&self) {
        let _ = stderr().flush();
    }
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = StderrLogger {
        color: stderr().is_terminal(),
    };
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}
