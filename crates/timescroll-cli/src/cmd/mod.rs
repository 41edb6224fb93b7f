pub mod browse;
pub mod import;
pub mod init;
pub mod rescale;

/// Project-relative location of the event store.
pub const DEFAULT_DB_RELATIVE_PATH: &str = ".timescroll/events.sqlite3";
