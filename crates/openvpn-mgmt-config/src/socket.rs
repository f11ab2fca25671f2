//! Filesystem preparation for Unix socket listen addresses.

use std::fs::DirBuilder;

use camino::Utf8PathBuf;
use openvpn_mgmt::MgmtAddress;
use thiserror::Error;

/// Ensures the parent directory of a Unix socket address exists with
/// owner-only permissions. TCP addresses need no preparation.
///
/// # Errors
///
/// Returns [`SocketPreparationError`] when the path has no parent or the
/// directory cannot be created.
pub fn prepare_socket_directory(address: &MgmtAddress) -> Result<(), SocketPreparationError> {
    let Some(path) = address.unix_path() else {
        return Ok(());
    };
    let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
        return Err(SocketPreparationError::MissingParent {
            path: path.to_path_buf(),
        });
    };

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    if let Err(source) = builder.create(parent.as_std_path())
        && source.kind() != std::io::ErrorKind::AlreadyExists
    {
        return Err(SocketPreparationError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        });
    }

    Ok(())
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path has no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// The socket path.
        path: Utf8PathBuf,
    },
    /// Failed to create the socket directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// The directory being created.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn tcp_addresses_need_no_preparation() {
        let address = MgmtAddress::parse("127.0.0.1:7505");
        assert!(prepare_socket_directory(&address).is_ok());
    }

    #[rstest]
    fn creates_missing_socket_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let socket = temp.path().join("run/openvpn/mgmt.sock");
        let address = MgmtAddress::parse(socket.to_str().expect("utf8 path"));

        prepare_socket_directory(&address).expect("prepare socket directory");

        let parent = socket.parent().expect("socket parent");
        assert!(parent.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(parent).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
