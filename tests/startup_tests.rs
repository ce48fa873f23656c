use omcproxy::channel::{read_frame, write_frame, RemoteChannel};
use omcproxy::config::Settings;
use omcproxy::error::StartupError;
use omcproxy::proxy::{CollectingSink, OmcProxy};
use omcproxy::supervisor::{handle_file_path, read_channel_address, wait_for_handle_file};
use std::os::unix::net::UnixListener;
use std::time::{Duration, Instant};

// =============================================================================
// HANDLE FILE POLLING
// =============================================================================

#[test]
fn test_startup_wait_is_bounded_by_the_retry_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-such-handle");
    let interval = Duration::from_millis(10);
    let attempts = 20;

    let started = Instant::now();
    let error = wait_for_handle_file(&missing, attempts, interval).unwrap_err();
    let elapsed = started.elapsed();

    match error {
        StartupError::HandleFileTimeout { attempts: n, .. } => assert_eq!(n, attempts),
        other => panic!("expected a timeout, got {}", other),
    }
    // the full budget is spent, and not much more
    assert!(elapsed >= interval * attempts);
    assert!(elapsed < interval * attempts * 4);
}

#[test]
fn test_handle_file_appearing_late_still_connects() {
    let dir = tempfile::tempdir().unwrap();
    let handle = handle_file_path(dir.path(), "777");
    let socket_path = dir.path().join("omc.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    let handle_for_writer = handle.clone();
    let address = socket_path.display().to_string();
    let writer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        std::fs::write(&handle_for_writer, format!("{}\n", address)).unwrap();
    });

    wait_for_handle_file(&handle, 20, Duration::from_millis(10)).unwrap();
    let address = read_channel_address(&handle).unwrap();
    let mut channel = RemoteChannel::connect(&address).unwrap();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_frame(&mut stream).unwrap();
        assert_eq!(request, "getVersion()");
        write_frame(&mut stream, "\"OpenModelica 1.9.1\"").unwrap();
    });

    use omcproxy::channel::Channel;
    let reply = channel.send("getVersion()").unwrap();
    assert_eq!(reply, "\"OpenModelica 1.9.1\"");

    writer.join().unwrap();
    server.join().unwrap();
}

// =============================================================================
// SESSION OVER A REAL SOCKET
// =============================================================================

#[test]
fn test_proxy_session_over_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("omc.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        loop {
            let request = match read_frame(&mut stream) {
                Ok(request) => request,
                Err(_) => break,
            };
            let reply = match request.as_str() {
                "getVersion()" => "\"OpenModelica 1.9.1\"",
                "isPackage(Modelica)" => "true\n",
                "quit()" => break,
                _ => "",
            };
            if write_frame(&mut stream, reply).is_err() {
                break;
            }
        }
    });

    let channel = RemoteChannel::connect(socket_path.to_str().unwrap()).unwrap();
    let settings = Settings {
        temp_dir: dir.path().to_path_buf(),
        ..Settings::default()
    };
    let mut proxy = OmcProxy::with_channel(
        settings,
        Box::new(channel),
        Box::new(CollectingSink::default()),
    );

    assert_eq!(proxy.version().unwrap(), "OpenModelica 1.9.1");
    assert!(proxy.is_package("Modelica").unwrap());
    proxy.quit();
    server.join().unwrap();
}
