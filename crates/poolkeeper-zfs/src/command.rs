//! Execution wrapper for invoking `zfs`/`zpool`.
//!
//! Shell integration stays behind [`CommandRunner`] so the engine can be
//! exercised against scripted runners or fake binaries.

use poolkeeper_core::error::{PoolkeeperError, PoolkeeperResult};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Captured result of one finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Trimmed stderr, falling back to stdout, then to the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        if !stderr.is_empty() {
            stderr.to_string()
        } else if !stdout.is_empty() {
            stdout.to_string()
        } else {
            format!("exit code {}", self.status)
        }
    }
}

/// Runs a program to completion and captures both output streams.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[&str]) -> PoolkeeperResult<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &Path, args: &[&str]) -> PoolkeeperResult<CommandOutput> {
        (**self).run(program, args)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn run(&self, program: &Path, args: &[&str]) -> PoolkeeperResult<CommandOutput> {
        (**self).run(program, args)
    }
}

/// `<basename> <args...>`, used in log prefixes and error messages.
pub fn render_command(program: &Path, args: &[&str]) -> String {
    let base = program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());
    if args.is_empty() {
        base
    } else {
        format!("{base} {}", args.join(" "))
    }
}

/// Runner backed by real subprocesses.
///
/// Both pipes are drained on their own threads and joined before `run`
/// returns. Without a timeout a hung tool blocks the caller indefinitely.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn wait(
        &self,
        program: &Path,
        mut child: Child,
        stdout_pipe: Option<ChildStdout>,
        stderr_pipe: Option<ChildStderr>,
    ) -> PoolkeeperResult<CommandOutput> {
        let stdout_handle = spawn_output_reader(stdout_pipe);
        let stderr_handle = spawn_output_reader(stderr_pipe);

        let exit_status = match self.timeout {
            None => child.wait()?,
            Some(timeout) => match wait_with_timeout(&mut child, timeout)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PoolkeeperError::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("{} timed out after {:?}", program.display(), timeout),
                    )));
                }
            },
        };

        let stdout = stdout_handle
            .join()
            .map_err(|_| reader_panicked("stdout"))??;
        let stderr = stderr_handle
            .join()
            .map_err(|_| reader_panicked("stderr"))??;

        Ok(CommandOutput {
            stdout,
            stderr,
            status: exit_status.code().unwrap_or(-1),
        })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[&str]) -> PoolkeeperResult<CommandOutput> {
        let mut command = Command::new(program);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command.spawn()?;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        self.wait(program, child, stdout_pipe, stderr_pipe)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    while start.elapsed() <= timeout {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        thread::sleep(Duration::from_millis(25));
    }
    Ok(None)
}

fn reader_panicked(stream: &str) -> PoolkeeperError {
    PoolkeeperError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("{stream} reader thread panicked"),
    ))
}

fn spawn_output_reader<R>(pipe: Option<R>) -> thread::JoinHandle<PoolkeeperResult<String>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || -> PoolkeeperResult<String> {
        if let Some(mut reader) = pipe {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        } else {
            Ok(String::new())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn render_uses_basename() {
        let program = PathBuf::from("/usr/sbin/zfs");
        assert_eq!(
            render_command(&program, &["get", "-H", "-o", "value", "name", "tank"]),
            "zfs get -H -o value name tank"
        );
        assert_eq!(render_command(&program, &[]), "zfs");
    }

    #[test]
    fn diagnostic_prefers_stderr() {
        let out = CommandOutput {
            stdout: "ignored\n".into(),
            stderr: "cannot open 'tank/x': dataset does not exist\n".into(),
            status: 1,
        };
        assert_eq!(
            out.diagnostic(),
            "cannot open 'tank/x': dataset does not exist"
        );

        let silent = CommandOutput {
            status: 2,
            ..CommandOutput::default()
        };
        assert_eq!(silent.diagnostic(), "exit code 2");
        assert!(!silent.success());
    }
}
