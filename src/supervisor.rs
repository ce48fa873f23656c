//! Compiler server process lifecycle
//!
//! Spawns the external compiler in interactive server mode, waits for
//! the handle file it writes once the RPC endpoint is up, and owns
//! teardown of the child process. One server per proxy instance; every
//! invocation gets a fresh session id so concurrently running proxies
//! never collide on handle files.

use crate::channel::RemoteChannel;
use crate::config::Settings;
use crate::error::StartupError;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Server-name component of handle files and the +c flag
pub const SERVER_NAME: &str = "omcproxy";

/// Retry ceiling while polling for the handle file
pub const HANDLE_FILE_RETRIES: u32 = 20;

/// Sleep between handle-file polls
pub const HANDLE_FILE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A running compiler server process
///
/// Created by [`start`], torn down by [`Server::terminate`] (or drop).
pub struct Server {
    child: Child,
    handle_file: PathBuf,
    address: String,
    reaped: bool,
}

impl Server {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn handle_file(&self) -> &Path {
        &self.handle_file
    }

    /// Channel address advertised in the handle file
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Remove the handle file, called when the connection is lost
    pub fn remove_handle_file(&self) {
        let _ = fs::remove_file(&self.handle_file);
    }

    /// Stop the child process: SIGTERM first, then kill
    pub fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        self.reaped = true;

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM);
        }

        // brief grace period before the hard kill
        std::thread::sleep(Duration::from_millis(100));

        let _ = self.child.kill();
        let _ = self.child.wait();
        self.remove_handle_file();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Launch the compiler server and connect its RPC channel
///
/// Spawn flags: `+c=<server-id>` (unique per session),
/// `+d=interactiveCorba`, `+corbaObjectReferenceFilePath=<tmpdir>` and
/// `+locale=<locale>`. Stdout and stderr are merged into a per-session
/// output file next to the handle file.
pub fn start(settings: &Settings) -> Result<(Server, RemoteChannel), StartupError> {
    let temp_dir = &settings.temp_dir;
    fs::create_dir_all(temp_dir).map_err(|source| StartupError::Spawn {
        path: temp_dir.clone(),
        source,
    })?;

    let compiler_path = resolve_compiler_path()?;
    let session_id = generate_session_id();
    let handle_file = handle_file_path(temp_dir, &session_id);
    if handle_file.exists() {
        let _ = fs::remove_file(&handle_file);
    }

    let output_path = temp_dir.join(format!(
        "openmodelica.omc.output.{}{}",
        SERVER_NAME, session_id
    ));
    let output_file = fs::File::create(&output_path).map_err(|source| StartupError::Spawn {
        path: output_path.clone(),
        source,
    })?;
    let output_clone = output_file.try_clone().map_err(|source| StartupError::Spawn {
        path: output_path,
        source,
    })?;

    let child = Command::new(&compiler_path)
        .arg(format!("+c={}{}", SERVER_NAME, session_id))
        .arg("+d=interactiveCorba")
        .arg(format!(
            "+corbaObjectReferenceFilePath={}",
            temp_dir.display()
        ))
        .arg(format!("+locale={}", settings.locale))
        .stdin(Stdio::null())
        .stdout(Stdio::from(output_file))
        .stderr(Stdio::from(output_clone))
        .spawn()
        .map_err(|source| StartupError::Spawn {
            path: compiler_path,
            source,
        })?;

    let mut server = Server {
        child,
        handle_file: handle_file.clone(),
        address: String::new(),
        reaped: false,
    };

    wait_for_handle_file(&handle_file, HANDLE_FILE_RETRIES, HANDLE_FILE_POLL_INTERVAL)?;
    server.address = read_channel_address(&handle_file)?;

    let channel =
        RemoteChannel::connect(&server.address).map_err(StartupError::Connect)?;

    Ok((server, channel))
}

/// Resolve the compiler executable from the installation root
///
/// Order: explicit OPENMODELICAHOME override, then (Linux) the running
/// executable's own install layout, then the build-time default root.
pub fn resolve_compiler_path() -> Result<PathBuf, StartupError> {
    if let Ok(home) = std::env::var("OPENMODELICAHOME") {
        if !home.is_empty() {
            return Ok(bin_path(Path::new(&home)));
        }
    }

    #[cfg(target_os = "linux")]
    if let Some(root) = sibling_install_root() {
        let candidate = bin_path(&root);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    match option_env!("OMCPROXY_DEFAULT_HOME") {
        Some(root) => Ok(bin_path(Path::new(root))),
        None => Err(StartupError::HomeNotFound),
    }
}

fn bin_path(root: &Path) -> PathBuf {
    #[cfg(windows)]
    let exe = "omc.exe";
    #[cfg(not(windows))]
    let exe = "omc";
    root.join("bin").join(exe)
}

/// Derive an install root from our own path (`<root>/bin/<exe>`)
#[cfg(target_os = "linux")]
fn sibling_install_root() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.parent()?.to_path_buf())
}

/// Unique id per invocation: process id + millisecond timestamp
pub fn generate_session_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{}{}", std::process::id(), millis)
}

/// Handle file advertised by the compiler once its endpoint is up
pub fn handle_file_path(temp_dir: &Path, session_id: &str) -> PathBuf {
    #[cfg(unix)]
    {
        temp_dir.join(format!(
            "openmodelica.{}.objid.{}{}",
            whoami::username(),
            SERVER_NAME,
            session_id
        ))
    }
    #[cfg(not(unix))]
    {
        temp_dir.join(format!("openmodelica.objid.{}{}", SERVER_NAME, session_id))
    }
}

/// Poll until the handle file exists, up to `attempts` × `interval`
pub fn wait_for_handle_file(
    path: &Path,
    attempts: u32,
    interval: Duration,
) -> Result<(), StartupError> {
    let mut ticks = 0;
    while !path.exists() {
        std::thread::sleep(interval);
        ticks += 1;
        if ticks >= attempts {
            return Err(StartupError::HandleFileTimeout {
                path: path.to_path_buf(),
                attempts,
            });
        }
    }
    Ok(())
}

/// Read the single channel-address line from the handle file
pub fn read_channel_address(path: &Path) -> Result<String, StartupError> {
    let file = fs::File::open(path).map_err(|source| StartupError::HandleFileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|source| StartupError::HandleFileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_session_ids_are_unique() {
        let a = generate_session_id();
        std::thread::sleep(Duration::from_millis(2));
        let b = generate_session_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_handle_file_name_shape() {
        let path = handle_file_path(Path::new("/tmp"), "123456");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("openmodelica."));
        assert!(name.contains("objid"));
        assert!(name.ends_with("omcproxy123456"));
    }

    #[test]
    fn test_wait_times_out_after_retry_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");
        let interval = Duration::from_millis(5);
        let attempts = 10;

        let started = Instant::now();
        let result = wait_for_handle_file(&missing, attempts, interval);
        let elapsed = started.elapsed();

        match result {
            Err(StartupError::HandleFileTimeout { attempts: n, .. }) => assert_eq!(n, attempts),
            other => panic!("expected timeout, got {:?}", other.err()),
        }
        assert!(elapsed >= interval * attempts);
        // bounded: not an unbounded wait (generous slack for slow CI)
        assert!(elapsed < interval * attempts * 4);
    }

    #[test]
    fn test_wait_returns_once_file_appears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handle");
        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            fs::write(&writer_path, "/tmp/omc.sock\n").unwrap();
        });

        wait_for_handle_file(&path, 50, Duration::from_millis(5)).unwrap();
        writer.join().unwrap();
        assert_eq!(read_channel_address(&path).unwrap(), "/tmp/omc.sock");
    }

    #[test]
    fn test_read_channel_address_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handle");
        fs::write(&path, "  /run/omc.sock  \nsecond line ignored\n").unwrap();
        assert_eq!(read_channel_address(&path).unwrap(), "/run/omc.sock");
    }

    #[test]
    fn test_resolve_uses_environment_override() {
        std::env::set_var("OPENMODELICAHOME", "/opt/om");
        let path = resolve_compiler_path().unwrap();
        assert!(path.starts_with("/opt/om"));
        assert!(path.to_string_lossy().contains("bin"));
        std::env::remove_var("OPENMODELICAHOME");
    }
}
