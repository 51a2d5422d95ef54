//! The real compression tool, driven as a child process.

use super::{Compressor, Invocation};
use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs the `pczip`-style executable with its `-mode/-in/-out/-impl/-threads` flags.
pub struct ExternalCompressor {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl ExternalCompressor {
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        ExternalCompressor {
            executable: executable.into(),
            timeout: None,
        }
    }

    /// Kills the call (and everything it spawned) once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-mode")
            .arg(invocation.mode.as_str())
            .arg("-in")
            .arg(invocation.input)
            .arg("-out")
            .arg(invocation.output)
            .arg("-impl")
            .arg(invocation.impl_key)
            .arg("-threads")
            .arg(invocation.threads.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if self.timeout.is_some() {
                cmd.process_group(0);
            }
        }

        cmd
    }
}

impl Compressor for ExternalCompressor {
    fn run(&mut self, invocation: &Invocation) -> Result<Duration> {
        let start = Instant::now();
        let mut child = self.command(invocation).spawn().map_err(|source| HarnessError::Spawn {
            program: self.executable.clone(),
            source,
        })?;

        let status = match self.timeout {
            None => Some(child.wait().map_err(|e| HarnessError::io(&self.executable, e))?),
            Some(limit) => {
                wait_with_timeout(&mut child, limit).map_err(|e| HarnessError::io(&self.executable, e))?
            }
        };
        let elapsed = start.elapsed();

        match status {
            Some(status) if status.success() => Ok(elapsed),
            Some(status) => Err(HarnessError::ToolFailed {
                mode: invocation.mode.as_str(),
                impl_key: invocation.impl_key.to_string(),
                threads: invocation.threads,
                code: status.code(),
            }),
            None => {
                warn!(
                    mode = invocation.mode.as_str(),
                    impl_key = invocation.impl_key,
                    threads = invocation.threads,
                    "tool timed out, process group killed"
                );
                Err(HarnessError::Timeout {
                    mode: invocation.mode.as_str(),
                    impl_key: invocation.impl_key.to_string(),
                    after: elapsed,
                })
            }
        }
    }

    fn name(&self) -> &str {
        self.executable.to_str().unwrap_or("external")
    }
}

/// Returns `None` if the child had to be killed.
fn wait_with_timeout(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                abort(child);
                return Err(e);
            }
        }
        let elapsed = start.elapsed();
        if elapsed >= limit {
            abort(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(limit - elapsed));
    }
}

/// Kills the child's process group and reaps the child.
fn abort(child: &mut Child) {
    kill_process_group(child);
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    // the child leads its own group, see `ExternalCompressor::command`
    let pgid = child.id() as libc::pid_t;
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

/// Builds the external tool before any measurement, e.g. `go build -o pczip main.go`.
pub fn build_tool(command: &[String], dir: &Path) -> Result<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| HarnessError::Config("build command is empty".into()))?;
    let rendered = command.join(" ");
    info!(command = %rendered, dir = %dir.display(), "building compression tool");

    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .status()
        .map_err(|source| HarnessError::Spawn {
            program: PathBuf::from(program),
            source,
        })?;

    if !status.success() {
        return Err(HarnessError::Build {
            command: rendered,
            code: status.code(),
        });
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::compressor::Mode;
    use std::fs;

    fn invocation<'a>(dir: &'a Path, out: &'a Path) -> Invocation<'a> {
        Invocation {
            mode: Mode::Compress,
            input: dir,
            output: out,
            impl_key: "seq",
            threads: 1,
        }
    }

    #[test]
    fn successful_exit_returns_duration() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pcz");
        let mut tool = ExternalCompressor::new("true");
        assert!(tool.run(&invocation(dir.path(), &out)).is_ok());
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pcz");
        let mut tool = ExternalCompressor::new("false").with_timeout(Some(Duration::from_secs(30)));
        let err = tool.run(&invocation(dir.path(), &out)).unwrap_err();
        assert!(matches!(err, HarnessError::ToolFailed { code: Some(1), .. }));
    }

    #[test]
    fn missing_executable_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pcz");
        let mut tool = ExternalCompressor::new(dir.path().join("no-such-tool"));
        let err = tool.run(&invocation(dir.path(), &out)).unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[test]
    fn timeout_kills_the_whole_process_group() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pcz");
        let marker = dir.path().join("grandchild-survived");
        let script = dir.path().join("slow.sh");
        fs::write(
            &script,
            format!("#!/bin/sh\n(sleep 1; touch '{}') &\nsleep 30\n", marker.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut tool = ExternalCompressor::new(&script).with_timeout(Some(Duration::from_millis(300)));
        let start = Instant::now();
        let err = tool.run(&invocation(dir.path(), &out)).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { mode: "compress", .. }));
        assert!(start.elapsed() < Duration::from_secs(10));

        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn failing_build_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_tool(&["false".to_string()], dir.path()).unwrap_err();
        assert!(matches!(err, HarnessError::Build { .. }));
        assert!(build_tool(&["true".to_string()], dir.path()).is_ok());
        assert!(matches!(build_tool(&[], dir.path()), Err(HarnessError::Config(_))));
    }
}
