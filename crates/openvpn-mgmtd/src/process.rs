//! Daemon runtime: configuration, telemetry, and the accept loop.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use thiserror::Error;
use tracing::{info, warn};

use openvpn_mgmt::server::{ListenerError, MgmtListener};
use openvpn_mgmt_config::{Config, ConfigError, SocketPreparationError, load_config, prepare_socket_directory};

use crate::DAEMON_TARGET;
use crate::session::{SessionHandler, SessionSettings};
use crate::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::telemetry::{self, TelemetryError};

/// Source of the daemon configuration.
pub trait ConfigLoader {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration cannot be resolved.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader reading the process command line, environment and config file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        load_config(std::env::args_os())
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Errors that stop the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration failed to load.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The socket directory could not be prepared.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Underlying filesystem error.
        #[source]
        source: SocketPreparationError,
    },
    /// The listener failed to bind or stopped with an error.
    #[error("management listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// Waiting for a shutdown signal failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying signal error.
        #[source]
        source: ShutdownError,
    },
    /// The shutdown watcher thread could not be started.
    #[error("failed to spawn shutdown watcher: {source}")]
    Spawn {
        /// Underlying thread error.
        #[source]
        source: std::io::Error,
    },
}

/// Runs the daemon using the process command line and signal handlers.
///
/// # Errors
///
/// Returns [`DaemonError`] when start-up fails or the listener stops for any
/// reason other than a shutdown signal.
pub fn run_daemon() -> Result<(), DaemonError> {
    run_daemon_with(&SystemConfigLoader, SystemShutdownSignal)
}

/// Runs the daemon with injected collaborators.
///
/// Serves OpenVPN connections until `shutdown` fires, then closes the
/// listener and returns.
///
/// # Errors
///
/// Returns [`DaemonError`] when start-up fails or the listener stops for any
/// reason other than a shutdown request.
pub fn run_daemon_with<L, S>(loader: &L, shutdown: S) -> Result<(), DaemonError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let config = loader.load()?;
    telemetry::initialise(&config).map_err(|source| DaemonError::Telemetry { source })?;
    let address = config.listen_address();
    prepare_socket_directory(&address).map_err(|source| DaemonError::Socket { source })?;

    let listener =
        MgmtListener::bind(&address).map_err(|source| DaemonError::Listener { source })?;
    info!(
        target: DAEMON_TARGET,
        address = %address,
        release_hold = config.release_hold,
        "management daemon listening"
    );

    let (shutdown_result, shutdown_outcome) = mpsc::channel();
    let watched = listener.clone();
    thread::Builder::new()
        .name("openvpn-mgmtd-shutdown".to_owned())
        .spawn(move || {
            // The outcome must be queued before the accept loop can observe
            // the closed listener.
            let _ = shutdown_result.send(shutdown.wait());
            watched.close();
        })
        .map_err(|source| {
            listener.close();
            DaemonError::Spawn { source }
        })?;

    let handler = Arc::new(SessionHandler::new(SessionSettings::from_config(&config)));
    let Err(stopped) = listener.serve(handler);
    match (stopped, shutdown_outcome.try_recv()) {
        (ListenerError::Closed, Ok(Ok(()))) => {
            info!(target: DAEMON_TARGET, "shutdown sequence completed");
            Ok(())
        }
        (_, Ok(Err(source))) => Err(DaemonError::Shutdown { source }),
        (source, _) => {
            warn!(target: DAEMON_TARGET, error = %source, "management listener stopped");
            Err(DaemonError::Listener { source })
        }
    }
}
