//! Management interface addresses.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};

/// Where a management session listens or connects.
///
/// OpenVPN's own `--management` option uses the same convention: an absolute
/// path selects a Unix domain socket, anything else is a TCP `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MgmtAddress {
    /// Unix domain socket at a filesystem path.
    Unix {
        /// Path of the socket file.
        path: Utf8PathBuf,
    },
    /// TCP socket address, `host:port`.
    Tcp {
        /// Host and port, resolved when binding or connecting.
        address: String,
    },
}

impl MgmtAddress {
    /// Selects the transport from the address syntax. Never fails: errors in
    /// a TCP address surface when it is resolved.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.starts_with('/') {
            Self::Unix {
                path: Utf8PathBuf::from(text),
            }
        } else {
            Self::Tcp {
                address: text.to_owned(),
            }
        }
    }

    /// Returns the socket path when the address uses the Unix transport.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } => None,
        }
    }
}

impl fmt::Display for MgmtAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { address } => write!(formatter, "tcp://{address}"),
        }
    }
}

impl FromStr for MgmtAddress {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(input))
    }
}
