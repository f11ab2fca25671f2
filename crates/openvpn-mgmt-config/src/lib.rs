//! Layered configuration for the OpenVPN management daemon.
//!
//! Values are merged from built-in defaults, a TOML configuration file, the
//! `OVPN_MGMT_*` environment variables and command-line flags, later sources
//! winning. The file is chosen with `--config-path` or
//! `OVPN_MGMT_CONFIG_PATH`.

mod defaults;
mod logging;
mod socket;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use openvpn_mgmt::MgmtAddress;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_BYTECOUNT_INTERVAL_SECS, DEFAULT_LISTEN_ADDRESS, DEFAULT_LOG_FILTER,
    DEFAULT_RELEASE_HOLD, default_bytecount_interval_secs, default_listen_address,
    default_log_filter, default_log_format, default_release_hold,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketPreparationError, prepare_socket_directory};

/// Runtime configuration for the management daemon.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "OVPN_MGMT")]
pub struct Config {
    /// Where to listen for OpenVPN: a Unix socket path or `host:port`.
    #[serde(default = "default_listen_address")]
    #[ortho_config(default = default_listen_address())]
    pub listen: String,
    /// `tracing` filter directives, e.g. `info,openvpn_mgmt=debug`.
    #[serde(default = "default_log_filter")]
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Output format of the daemon's logs.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Seconds between `BYTECOUNT` notifications; zero disables them.
    #[serde(default = "default_bytecount_interval_secs")]
    #[ortho_config(default = default_bytecount_interval_secs())]
    pub bytecount_interval_secs: u64,
    /// Release the management hold when OpenVPN announces one.
    #[serde(default = "default_release_hold")]
    #[ortho_config(default = default_release_hold())]
    pub release_hold: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_address(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
            bytecount_interval_secs: default_bytecount_interval_secs(),
            release_hold: default_release_hold(),
        }
    }
}

impl Config {
    /// The listen address, parsed by its syntax.
    #[must_use]
    pub fn listen_address(&self) -> MgmtAddress {
        MgmtAddress::parse(&self.listen)
    }

    /// Interval between `BYTECOUNT` notifications.
    #[must_use]
    pub const fn bytecount_interval(&self) -> Duration {
        Duration::from_secs(self.bytecount_interval_secs)
    }

    /// Checks values the loader cannot validate on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyListenAddress`] when no listen address is
    /// set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::EmptyListenAddress);
        }
        Ok(())
    }
}

/// Errors raised while resolving the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read or merged.
    #[error("failed to load configuration: {source}")]
    Load {
        /// Error reported by the layered loader.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The listen address is blank.
    #[error("listen address must not be empty")]
    EmptyListenAddress,
}

/// Loads and validates the configuration from the given command line.
///
/// # Errors
///
/// Returns [`ConfigError`] when a source fails to load or the merged values
/// are invalid.
pub fn load_config<I>(args: I) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = OsString>,
{
    let config = Config::load_from_iter(args).map_err(|source| ConfigError::Load { source })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn defaults_listen_on_loopback() {
        let config = Config::default();
        assert_eq!(
            config.listen_address(),
            MgmtAddress::Tcp {
                address: DEFAULT_LISTEN_ADDRESS.to_owned()
            }
        );
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.bytecount_interval(), Duration::from_secs(5));
        assert!(config.release_hold);
    }

    #[rstest]
    fn unix_listen_addresses_are_recognised() {
        let config = Config {
            listen: "/run/openvpn/mgmt.sock".to_owned(),
            ..Config::default()
        };
        assert_eq!(
            config.listen_address().unix_path().map(|path| path.as_str()),
            Some("/run/openvpn/mgmt.sock")
        );
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_listen_address_is_rejected(#[case] listen: &str) {
        let config = Config {
            listen: listen.to_owned(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyListenAddress)
        ));
    }
}
