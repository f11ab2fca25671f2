//! Reference daemon supervising OpenVPN processes over their management
//! interface.
//!
//! OpenVPN processes started with `--management <addr> --management-client`
//! connect to the daemon. Each connection gets its own session which
//! subscribes to state, echo and byte count notifications, logs them, and
//! releases management holds when configured to. The daemon runs until it
//! receives a termination signal.

mod process;
mod session;
mod shutdown;
pub mod telemetry;

pub use process::{
    ConfigLoader, DaemonError, StaticConfigLoader, SystemConfigLoader, run_daemon,
    run_daemon_with,
};
pub use session::{SessionHandler, SessionSettings};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle};

pub(crate) const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");

#[cfg(test)]
mod tests;
