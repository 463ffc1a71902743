//! Minimal stderr logger behind the `log` facade.

use log::{LevelFilter, Metadata, Record};

pub fn init(level: LevelFilter) {
    static LOGGER: Logger = Logger;

    // Losing the race against a second init only happens in tests.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{:<5} {}] {}",
                record.level(),
                record.module_path().unwrap_or_default(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
