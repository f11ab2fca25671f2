use crate::logging::LogFormat;

/// Address the daemon listens on for OpenVPN processes started with
/// `--management 127.0.0.1 7505 --management-client`.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:7505";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds between `BYTECOUNT` notifications requested from each session.
pub const DEFAULT_BYTECOUNT_INTERVAL_SECS: u64 = 5;

/// Whether sessions release the management hold on their own.
pub const DEFAULT_RELEASE_HOLD: bool = true;

/// Owned listen address used where allocation is required (e.g. serde).
pub fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_owned()
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default `BYTECOUNT` interval in seconds.
pub const fn default_bytecount_interval_secs() -> u64 {
    DEFAULT_BYTECOUNT_INTERVAL_SECS
}

/// Default hold release behaviour.
pub const fn default_release_hold() -> bool {
    DEFAULT_RELEASE_HOLD
}
