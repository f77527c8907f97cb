//! Shell command execution with a wall-clock timeout.

use crate::error::{ForchError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs a shell command line. Implementations must return within roughly
/// `timeout`; a spawn failure is an `Err`, a non-zero exit is not.
pub trait ProcessExecutor: Send + Sync {
    fn run(
        &self,
        command: &str,
        workdir: &Path,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<ProcessOutput>;
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shell {
    /// `cmd /c <command>`
    Cmd,
    /// `<shell> -c <command>`, non-login.
    Posix(PathBuf),
}

impl Shell {
    /// `cmd` on Windows, otherwise `$SHELL` falling back to `/bin/sh`.
    pub fn detect() -> Self {
        if cfg!(windows) {
            return Shell::Cmd;
        }
        let shell = std::env::var_os("SHELL")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/bin/sh"));
        Shell::Posix(shell)
    }

    fn command(&self, line: &str) -> Command {
        match self {
            Shell::Cmd => {
                let mut cmd = Command::new("cmd");
                cmd.args(["/c", line]);
                cmd
            }
            Shell::Posix(shell) => {
                let mut cmd = Command::new(shell);
                cmd.args(["-c", line]);
                cmd
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ShellExecutor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: Shell,
}

impl ShellExecutor {
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(Shell::detect())
    }
}

impl ProcessExecutor for ShellExecutor {
    /// Reads stdout/stderr on dedicated threads so a chatty command cannot
    /// fill the pipe and deadlock, and waits on a third thread so the
    /// timeout is a plain `recv_timeout`. The deadline also bounds draining
    /// the pipes: a background child of the shell keeps them open after the
    /// shell itself has exited.
    fn run(
        &self,
        command: &str,
        workdir: &Path,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<ProcessOutput> {
        let mut cmd = self.shell.command(command);
        cmd.current_dir(workdir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let deadline = Instant::now() + timeout;
        let mut child = cmd.spawn().map_err(|e| ForchError::SpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
        let child_pid = child.id();

        let (done_tx, done_rx) = mpsc::channel();
        let stdout = spawn_reader(child.stdout.take(), done_tx.clone());
        let stderr = spawn_reader(child.stderr.take(), done_tx);

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(child.wait());
        });

        let status = match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(result) => Some(result?),
            Err(_) => None,
        };
        let mut open_streams = 2;
        let drained = status.is_some() && wait_for_readers(&done_rx, &mut open_streams, deadline);

        if !drained {
            kill_process_group(child_pid);
            tracing::warn!(command, pid = child_pid, ?timeout, "command timed out");
            wait_for_readers(&done_rx, &mut open_streams, Instant::now() + KILL_GRACE);
            return Ok(ProcessOutput {
                exit_code: None,
                stdout: snapshot(&stdout),
                stderr: snapshot(&stderr),
                timed_out: true,
            });
        }

        Ok(ProcessOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout: snapshot(&stdout),
            stderr: snapshot(&stderr),
            timed_out: false,
        })
    }
}

/// How long to keep collecting output after a timed-out command is killed.
const KILL_GRACE: Duration = Duration::from_millis(500);

type Captured = Arc<Mutex<Vec<u8>>>;

/// Copy `handle` into a shared buffer chunk by chunk, so a timed-out run can
/// still report what was printed. Signals `done` at EOF.
fn spawn_reader<R: Read + Send + 'static>(handle: Option<R>, done: mpsc::Sender<()>) -> Captured {
    let buf: Captured = Arc::default();
    let sink = Arc::clone(&buf);
    std::thread::spawn(move || {
        if let Some(mut r) = handle {
            let mut chunk = [0u8; 8192];
            loop {
                match r.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .extend_from_slice(&chunk[..n]),
                }
            }
        }
        let _ = done.send(());
    });
    buf
}

/// `true` once every open reader hits EOF before `deadline`.
fn wait_for_readers(done: &mpsc::Receiver<()>, open: &mut usize, deadline: Instant) -> bool {
    while *open > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if done.recv_timeout(remaining).is_err() {
            return false;
        }
        *open -= 1;
    }
    true
}

fn snapshot(buf: &Captured) -> String {
    let bytes = buf.lock().unwrap_or_else(|e| e.into_inner());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Terminate a process and everything it started. Best-effort; errors are
/// ignored.
fn kill_process_group(pid: u32) {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("taskkill");
        c.args(["/F", "/T", "/PID", &pid.to_string()]);
        c
    } else {
        let mut c = Command::new("kill");
        c.args(["-9", "--", &format!("-{pid}")]);
        c
    };
    let _ = cmd.stdout(Stdio::null()).stderr(Stdio::null()).status();
}

/// Snapshot of the current process environment, taken once and handed to
/// every command of a verification pass.
pub fn capture_env() -> Vec<(String, String)> {
    std::env::vars().collect()
}
