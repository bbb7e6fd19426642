//! Running external executables under a wall-clock timeout.

use deck_core::{Error, Result};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Minimum time granted to any external call.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timeout for a call that processes `slides` slides at `per_slide` each.
pub fn scaled_timeout(slides: usize, per_slide: Duration) -> Duration {
    let scaled = per_slide.saturating_mul(slides.min(u32::MAX as usize) as u32);
    scaled.max(MIN_TIMEOUT)
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// One invocation of an external executable.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    tool: String,
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ToolCommand {
    /// `tool` is the display name used in errors and logs.
    pub fn new(tool: impl Into<String>, program: impl AsRef<Path>) -> Self {
        Self {
            tool: tool.into(),
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: MIN_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run to completion, killing the process tree if the timeout elapses.
    pub fn run(&self) -> Result<ToolOutput> {
        log::debug!("Running {} {:?}", self.program.display(), self.args);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        new_process_group(&mut command);

        let mut child = command.spawn().map_err(|e| Error::ToolLaunch {
            tool: self.tool.clone(),
            reason: e.to_string(),
        })?;

        // Drain pipes on threads so a chatty child can't block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        log::warn!(
                            "{} exceeded {}s, killing process tree",
                            self.tool,
                            self.timeout.as_secs()
                        );
                        kill_tree(&mut child);
                        let _ = child.wait();
                        return Err(Error::ToolTimeout {
                            tool: self.tool.clone(),
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    kill_tree(&mut child);
                    let _ = child.wait();
                    return Err(Error::ToolLaunch {
                        tool: self.tool.clone(),
                        reason: format!("failed to wait: {}", e),
                    });
                }
            }
        };

        let output = ToolOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
        };

        if !status.success() {
            return Err(Error::ToolFailed {
                tool: self.tool.clone(),
                code: status.code().unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            });
        }

        log::debug!("{} finished in {:?}", self.tool, start.elapsed());
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn new_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn new_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: signalling a process group we created; no memory is touched.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

/// Whether `program` can be launched at all.
pub fn probe(program: &Path, version_arg: &str) -> bool {
    Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_timeout() {
        assert_eq!(scaled_timeout(3, Duration::from_secs(5)), MIN_TIMEOUT);
        assert_eq!(
            scaled_timeout(20, Duration::from_secs(5)),
            Duration::from_secs(100)
        );
        assert_eq!(scaled_timeout(0, Duration::from_secs(10)), MIN_TIMEOUT);
    }

    #[test]
    fn test_launch_failure() {
        let err = ToolCommand::new("missing", "/nonexistent/deck-tool-xyz")
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::ToolLaunch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_captures_stderr() {
        let err = ToolCommand::new("sh", "sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .run()
            .unwrap_err();
        match err {
            Error::ToolFailed { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let start = Instant::now();
        let err = ToolCommand::new("sleep", "sh")
            .args(["-c", "sleep 30"])
            .timeout(Duration::from_millis(300))
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::ToolTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_captured() {
        let out = ToolCommand::new("sh", "sh")
            .args(["-c", "echo Pages: 4"])
            .run()
            .unwrap();
        assert_eq!(out.stdout.trim(), "Pages: 4");
    }
}
