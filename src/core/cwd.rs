//! Best-effort working directory lookup for a running process.
//!
//! The answer can be stale by the time it is used; callers treat it as a hint.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::MuxError;

/// Home directory of the current user, `/` if it cannot be determined.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Current directory of `pid`.
#[cfg(target_os = "linux")]
pub fn probe(pid: u32, _timeout: Duration) -> Result<PathBuf, MuxError> {
    let link = format!("/proc/{}/cwd", pid);
    std::fs::read_link(&link).map_err(|e| MuxError::Probe(format!("{}: {}", link, e)))
}

/// Current directory of `pid`, asked from `lsof`.
#[cfg(target_os = "macos")]
pub fn probe(pid: u32, timeout: Duration) -> Result<PathBuf, MuxError> {
    use std::process::{Command, Stdio};
    use std::time::Instant;

    let mut child = Command::new("lsof")
        .args(["-a", "-p", &pid.to_string(), "-d", "cwd", "-Fn"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| MuxError::Probe(format!("lsof: {}", e)))?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MuxError::Probe(format!("lsof timed out after {:?}", timeout)));
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(5)),
            Err(e) => return Err(MuxError::Probe(format!("lsof: {}", e))),
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| MuxError::Probe(format!("lsof: {}", e)))?;
    parse_lsof_cwd(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| MuxError::Probe(format!("no cwd entry for pid {}", pid)))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn probe(pid: u32, _timeout: Duration) -> Result<PathBuf, MuxError> {
    Err(MuxError::Probe(format!(
        "cwd lookup unsupported on this platform (pid {})",
        pid
    )))
}

/// Extract the `n` field from `lsof -Fn` output.
#[cfg_attr(not(any(target_os = "macos", test)), allow(dead_code))]
fn parse_lsof_cwd(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .find_map(|line| line.strip_prefix('n'))
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}
