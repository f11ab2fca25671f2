//! Tests for the daemon runtime.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};

use openvpn_mgmt::server::ListenerError;
use openvpn_mgmt_config::Config;

use crate::{DaemonError, ShutdownError, ShutdownSignal, StaticConfigLoader, run_daemon_with};

/// Shutdown signal fired by the test through a channel.
struct ManualShutdown {
    trigger: Receiver<Result<(), ShutdownError>>,
}

impl ShutdownSignal for ManualShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        self.trigger.recv().unwrap_or(Ok(()))
    }
}

fn manual_shutdown() -> (Sender<Result<(), ShutdownError>>, ManualShutdown) {
    let (fire, trigger) = mpsc::channel();
    (fire, ManualShutdown { trigger })
}

#[fixture]
fn loopback_config() -> Config {
    Config {
        listen: "127.0.0.1:0".to_owned(),
        ..Config::default()
    }
}

#[rstest]
fn shutdown_signal_stops_the_daemon(loopback_config: Config) {
    let (fire, shutdown) = manual_shutdown();
    let daemon =
        thread::spawn(move || run_daemon_with(&StaticConfigLoader::new(loopback_config), shutdown));

    thread::sleep(Duration::from_millis(50));
    fire.send(Ok(())).expect("fire shutdown");

    daemon
        .join()
        .expect("join daemon")
        .expect("daemon should stop cleanly");
}

#[rstest]
fn failed_signal_installation_is_reported(loopback_config: Config) {
    let (fire, shutdown) = manual_shutdown();
    fire.send(Err(ShutdownError::Install {
        source: std::io::Error::other("no signals here"),
    }))
    .expect("queue failure");

    let error = run_daemon_with(&StaticConfigLoader::new(loopback_config), shutdown)
        .expect_err("daemon should fail");
    assert!(matches!(error, DaemonError::Shutdown { .. }));
}

#[rstest]
fn occupied_port_is_reported() {
    let occupied = TcpListener::bind("127.0.0.1:0").expect("reserve port");
    let config = Config {
        listen: occupied.local_addr().expect("local addr").to_string(),
        ..Config::default()
    };
    let (_fire, shutdown) = manual_shutdown();

    let error = run_daemon_with(&StaticConfigLoader::new(config), shutdown)
        .expect_err("bind should fail");
    assert!(matches!(
        error,
        DaemonError::Listener {
            source: ListenerError::BindTcp { .. }
        }
    ));
}

#[cfg(unix)]
#[rstest]
fn unix_socket_sessions_are_served_and_cleaned_up() {
    let temp = tempfile::tempdir().expect("temp dir");
    let socket = temp.path().join("run/mgmt.sock");
    let config = Config {
        listen: socket.to_str().expect("utf8 path").to_owned(),
        bytecount_interval_secs: 0,
        ..Config::default()
    };
    let (fire, shutdown) = manual_shutdown();
    let daemon = thread::spawn(move || run_daemon_with(&StaticConfigLoader::new(config), shutdown));

    let openvpn = connect_when_ready(&socket);
    let mut writer = openvpn.try_clone().expect("clone stream");
    let mut reader = BufReader::new(openvpn);
    let mut line = String::new();
    reader.read_line(&mut line).expect("read first command");
    assert_eq!(line, "state on\n");
    writer
        .write_all(b"SUCCESS: real-time state notification set to ON\r\n")
        .expect("reply");

    fire.send(Ok(())).expect("fire shutdown");
    daemon
        .join()
        .expect("join daemon")
        .expect("daemon should stop cleanly");
    assert!(!socket.exists(), "socket file should be removed");
}

#[cfg(unix)]
fn connect_when_ready(path: &std::path::Path) -> std::os::unix::net::UnixStream {
    for _ in 0..200 {
        if let Ok(stream) = std::os::unix::net::UnixStream::connect(path) {
            return stream;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("daemon never started listening on {}", path.display());
}
