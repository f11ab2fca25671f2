//! Entry point for the OpenVPN management daemon.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match openvpn_mgmtd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(io::stderr(), "openvpn-mgmtd: {error}");
            ExitCode::FAILURE
        }
    }
}
