//! Logger construction
//!
//! Components never reach for a global logger; each one receives an
//! `slog::Logger` when it is built.

use slog::{o, Drain, Level, LevelFilter, Logger};

/// Root logger writing human readable records to stderr
///
/// `verbose` lowers the threshold from `Info` to `Debug`.
pub fn build_logger(verbose: bool) -> Logger {
    let level = if verbose { Level::Debug } else { Level::Info };

    let decorator = slog_term::PlainDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = LevelFilter::new(drain, level).fuse();

    Logger::root(drain, o!())
}

/// Logger that drops every record
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}
