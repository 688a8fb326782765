//! Console logger behind the [`log`] facade.
//!
//! On the brain records go to the terminal through vexide's `println!`; on the
//! host they go to stderr. Each line carries the time since [`init`] was called:
//!
//! ```text
//!    2.140 INFO  hurricane_chassis::motion - turn_to_angle: settled in 410ms at (-31.02, 15.00, 180.0°)
//! ```

extern crate alloc;

use alloc::{boxed::Box, format, string::String};
use core::time::Duration;

use log::{LevelFilter, Metadata, Record, SetLoggerError};

#[cfg(not(target_vendor = "vex"))]
use std::{eprintln as println, time::Instant};
#[cfg(target_vendor = "vex")]
use vexide::{io::println, time::Instant};

struct ConsoleLogger {
    start: Instant,
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{}", format_line(self.start.elapsed(), record));
        }
    }

    fn flush(&self) {}
}

fn format_line(elapsed: Duration, record: &Record) -> String {
    format!(
        "{:>8.3} {:<5} {} - {}",
        elapsed.as_secs_f64(),
        record.level(),
        record.target(),
        record.args()
    )
}

/// Installs the logger. Call once, before anything logs.
///
/// # Errors
///
/// Returns [`SetLoggerError`] if a logger was already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = Box::leak(Box::new(ConsoleLogger {
        start: Instant::now(),
    }));
    log::set_logger(logger).map(|()| log::set_max_level(level))
}

#[cfg(test)]
mod tests {
    use log::Level;

    use super::*;

    #[test]
    fn line_has_time_level_and_target() {
        let line = format_line(
            Duration::from_millis(2140),
            &Record::builder()
                .args(format_args!("settled in {}ms", 410))
                .level(Level::Info)
                .target("hurricane_chassis::motion")
                .build(),
        );
        assert_eq!(line, "   2.140 INFO  hurricane_chassis::motion - settled in 410ms");
    }
}
