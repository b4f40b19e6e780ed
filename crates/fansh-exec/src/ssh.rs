//! Remote command execution through an external remote-shell binary

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::console::ConsoleSink;
use crate::error::ExecError;
use crate::group::{self, ProcessGroup};
use crate::options::{CommandTemplate, OptionSet, build_argv};
use crate::result::ExecutionResult;
use crate::traits::HostExecutor;

/// Default remote-shell program
pub const DEFAULT_PROGRAM: &str = "ssh";

/// How long an interrupted process group gets to exit before it is killed
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(10);

/// Executes the command template on a host by spawning the remote shell
///
/// Output of the child is forwarded line by line: stdout through the
/// normal sink, stderr through the error sink, both labeled with the
/// hostname.
pub struct SshExecutor {
    /// Remote-shell binary
    program: String,
    /// Shared connection options
    options: OptionSet,
    /// Shared command template
    command: CommandTemplate,
    /// Sink for stdout lines
    out: ConsoleSink,
    /// Sink for stderr lines and failure reports
    err: ConsoleSink,
    /// Grace period between interrupt and kill on cancellation
    interrupt_grace: Duration,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("program", &self.program)
            .field("options", &self.options)
            .field("command", &self.command)
            .field("interrupt_grace", &self.interrupt_grace)
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create a new executor using the default `ssh` program
    pub fn new(
        options: OptionSet,
        command: CommandTemplate,
        out: ConsoleSink,
        err: ConsoleSink,
    ) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            options,
            command,
            out,
            err,
            interrupt_grace: DEFAULT_INTERRUPT_GRACE,
        }
    }

    /// Use a different remote-shell program
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the grace period after interrupting a cancelled host
    #[must_use]
    pub fn with_interrupt_grace(mut self, grace: Duration) -> Self {
        self.interrupt_grace = grace;
        self
    }

    /// Remote-shell program in use
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the subprocess for `hostname`
    fn command_for(&self, hostname: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(build_argv(&self.options, hostname, &self.command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        group::isolate(&mut cmd);
        cmd
    }

    /// Forward both output streams until each reaches end-of-stream
    async fn drain(&self, child: &mut Child, hostname: &str) {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(
            forward_lines(stdout, &self.out, hostname),
            forward_lines(stderr, &self.err, hostname),
        );
    }

    /// Interrupt the group, then kill the whole group if the grace period runs out
    async fn interrupt(&self, child: &mut Child, group: ProcessGroup, hostname: &str) {
        if let Err(e) = group.interrupt() {
            warn!(host = %hostname, error = %e, "failed to interrupt process group");
            let _ = child.start_kill();
        }

        match timeout(self.interrupt_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(host = %hostname, ?status, "interrupted child exited"),
            Ok(Err(e)) => warn!(host = %hostname, error = %e, "failed to reap interrupted child"),
            Err(_) => {
                warn!(
                    host = %hostname,
                    grace = ?self.interrupt_grace,
                    "child ignored interrupt, killing process group"
                );
                if let Err(e) = group.kill() {
                    warn!(host = %hostname, error = %e, "failed to kill process group");
                    let _ = child.start_kill();
                }
                let _ = child.wait().await;
            }
        }
    }

    /// Map the wait result to an outcome, reporting failures inline
    fn classify(
        &self,
        hostname: &str,
        status: std::io::Result<ExitStatus>,
        duration: Duration,
    ) -> ExecutionResult {
        let error = match status {
            Ok(status) if status.success() => {
                debug!(host = %hostname, ?duration, "command succeeded");
                return ExecutionResult::success(hostname, duration);
            }
            Ok(status) => match status.code() {
                Some(code) => ExecError::NonZeroExit { code },
                None => ExecError::KilledBySignal,
            },
            Err(e) => ExecError::from(e),
        };

        debug!(host = %hostname, error = %error, ?duration, "command failed");
        self.err.emit(hostname, &format!("{}: {error}", self.program));
        ExecutionResult::failure(hostname, error, duration)
    }
}

#[async_trait]
impl HostExecutor for SshExecutor {
    #[instrument(skip(self, cancel), level = "debug")]
    async fn run(&self, hostname: &str, cancel: &CancellationToken) -> ExecutionResult {
        let start = Instant::now();

        debug!(program = %self.program, "spawning remote shell");

        let mut child = match self.command_for(hostname).spawn() {
            Ok(child) => child,
            Err(e) => {
                let error = ExecError::SpawnError(e.to_string());
                self.err.emit(hostname, &error.to_string());
                return ExecutionResult::failure(hostname, error, start.elapsed());
            }
        };
        let group = ProcessGroup::of(&child);

        // Both streams must hit EOF before the child is reaped.
        let drained = tokio::select! {
            () = self.drain(&mut child, hostname) => true,
            () = cancel.cancelled() => false,
        };

        if drained {
            tokio::select! {
                status = child.wait() => {
                    return self.classify(hostname, status, start.elapsed());
                }
                () = cancel.cancelled() => {}
            }
        }

        warn!(host = %hostname, "run cancelled, interrupting remote shell");
        self.interrupt(&mut child, group, hostname).await;
        self.err
            .emit(hostname, &format!("{}: {}", self.program, ExecError::Cancelled));
        ExecutionResult::failure(hostname, ExecError::Cancelled, start.elapsed())
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Forward `reader` to `sink` one line at a time
///
/// Lines are decoded lossily so binary output never stalls the drain.
async fn forward_lines<R>(reader: Option<R>, sink: &ConsoleSink, hostname: &str)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                sink.emit(hostname, &String::from_utf8_lossy(&buf));
            }
            Err(e) => {
                debug!(host = %hostname, error = %e, "output stream closed with error");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::{Path, PathBuf};

    use crossterm::style::Color;

    use crate::console::{Console, MemoryWriter, StreamClass};
    use crate::options::OptionSet;

    /// Stand-in for the remote shell: drops host and preamble, runs the command locally
    fn fake_shell(command: &[&str]) -> (SshExecutor, MemoryWriter, MemoryWriter) {
        fake_shell_script("shift 5; \"$@\"", command)
    }

    /// Like [`fake_shell`] with a custom wrapper script around the command
    fn fake_shell_script(
        script: &str,
        command: &[&str],
    ) -> (SshExecutor, MemoryWriter, MemoryWriter) {
        let out = MemoryWriter::new();
        let err = MemoryWriter::new();
        let console = Console::new(out.clone(), err.clone(), false);

        let options = OptionSet::from_args(["-c", script, "fake-ssh"]);
        let executor = SshExecutor::new(
            options,
            CommandTemplate::new(command.iter().copied()),
            console.sink(StreamClass::Normal, Some(Color::Green)),
            console.sink(StreamClass::Error, Some(Color::Red)),
        )
        .with_program("sh")
        .with_interrupt_grace(Duration::from_secs(2));

        (executor, out, err)
    }

    #[tokio::test]
    async fn test_run_success_forwards_stdout() {
        let (executor, out, err) = fake_shell(&["echo", "hi"]);
        let result = executor.run("web-1", &CancellationToken::new()).await;

        assert!(result.is_success());
        assert_eq!(result.hostname, "web-1");
        assert_eq!(out.lines(), vec!["web-1: hi"]);
        assert!(err.contents().is_empty());
    }

    #[tokio::test]
    async fn test_run_forwards_stderr_to_error_sink() {
        let (executor, out, err) = fake_shell(&["sh", "-c", "echo oops >&2"]);
        let result = executor.run("web-1", &CancellationToken::new()).await;

        assert!(result.is_success());
        assert!(out.contents().is_empty());
        assert_eq!(err.lines(), vec!["web-1: oops"]);
    }

    #[tokio::test]
    async fn test_run_non_zero_exit() {
        let (executor, _out, err) = fake_shell(&["sh", "-c", "exit 42"]);
        let result = executor.run("db-1", &CancellationToken::new()).await;

        assert_eq!(result.error(), Some(&ExecError::NonZeroExit { code: 42 }));
        assert_eq!(err.lines(), vec!["db-1: sh: exit status 42"]);
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let (executor, _out, _err) = fake_shell(&["definitely-not-a-real-binary-fansh"]);
        let result = executor.run("db-1", &CancellationToken::new()).await;

        assert_eq!(result.error(), Some(&ExecError::NonZeroExit { code: 127 }));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let (executor, _out, err) = fake_shell(&["true"]);
        let executor = executor.with_program("/nonexistent/fansh-remote-shell");
        let result = executor.run("bad-host", &CancellationToken::new()).await;

        assert!(matches!(result.error(), Some(ExecError::SpawnError(_))));
        let lines = err.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bad-host: failed to spawn process"));
    }

    #[tokio::test]
    async fn test_output_order_preserved() {
        let (executor, out, _err) = fake_shell(&["sh", "-c", "for i in 1 2 3 4 5; do echo $i; done"]);
        let result = executor.run("web-1", &CancellationToken::new()).await;

        assert!(result.is_success());
        assert_eq!(
            out.lines(),
            vec!["web-1: 1", "web-1: 2", "web-1: 3", "web-1: 4", "web-1: 5"]
        );
    }

    #[tokio::test]
    async fn test_cancel_interrupts_process_group() {
        let (executor, _out, err) = fake_shell(&["sh", "-c", "sleep 1000; sleep 1000"]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let result = timeout(Duration::from_secs(5), executor.run("web-1", &cancel))
            .await
            .expect("cancelled run should finish");

        assert_eq!(result.error(), Some(&ExecError::Cancelled));
        assert!(err.lines().contains(&"web-1: sh: interrupted".to_string()));
    }

    /// Command whose grandchild writes its pid to `$0` and then sleeps
    #[cfg(unix)]
    const GRANDCHILD_SCRIPT: &str =
        "sh -c 'echo $$ > \"$0\"; exec sleep 1000' \"$0\"; true";

    #[cfg(unix)]
    fn pid_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("fansh-{name}-{}.pid", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[cfg(unix)]
    async fn wait_for_pid(path: &Path) -> libc::pid_t {
        for _ in 0..200 {
            let pid = std::fs::read_to_string(path)
                .ok()
                .and_then(|s| s.trim().parse().ok());
            if let Some(pid) = pid {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("grandchild never wrote {}", path.display());
    }

    /// Whether `pid` has exited; zombies count as exited
    #[cfg(unix)]
    async fn process_gone(pid: libc::pid_t) -> bool {
        for _ in 0..200 {
            // SAFETY: signal 0 only checks that the process exists
            if unsafe { libc::kill(pid, 0) } != 0 {
                return true;
            }
            let zombie = std::fs::read_to_string(format!("/proc/{pid}/stat"))
                .ok()
                .and_then(|stat| {
                    stat.rsplit_once(')')
                        .map(|(_, rest)| rest.trim_start().starts_with('Z'))
                })
                .unwrap_or(false);
            if zombie {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }

    #[cfg(unix)]
    async fn cancel_after_pid(
        executor: &SshExecutor,
        pid_path: &Path,
    ) -> (ExecutionResult, libc::pid_t) {
        let cancel = CancellationToken::new();
        let run = executor.run("web-1", &cancel);
        tokio::pin!(run);

        let pid = tokio::select! {
            pid = wait_for_pid(pid_path) => pid,
            result = &mut run => panic!("run finished before cancel: {result:?}"),
        };
        cancel.cancel();

        let result = timeout(Duration::from_secs(10), run)
            .await
            .expect("cancelled run should finish");
        (result, pid)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_interrupt_reaches_grandchild() {
        let path = pid_file("interrupt");
        let path_arg = path.to_string_lossy().into_owned();
        let (executor, _out, _err) =
            fake_shell(&["sh", "-c", GRANDCHILD_SCRIPT, path_arg.as_str()]);
        // long grace: only the interrupt may end the grandchild here
        let executor = executor.with_interrupt_grace(Duration::from_secs(30));

        let (result, pid) = cancel_after_pid(&executor, &path).await;

        assert_eq!(result.error(), Some(&ExecError::Cancelled));
        assert!(process_gone(pid).await, "grandchild {pid} survived the interrupt");
        let _ = std::fs::remove_file(&path);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_grace_expiry_kills_whole_group() {
        let path = pid_file("kill");
        let path_arg = path.to_string_lossy().into_owned();
        // every process in the group ignores SIGINT
        let (executor, _out, _err) = fake_shell_script(
            "trap '' INT; shift 5; \"$@\"",
            &["sh", "-c", GRANDCHILD_SCRIPT, path_arg.as_str()],
        );
        let executor = executor.with_interrupt_grace(Duration::from_millis(300));

        let (result, pid) = cancel_after_pid(&executor, &path).await;

        assert_eq!(result.error(), Some(&ExecError::Cancelled));
        assert!(process_gone(pid).await, "grandchild {pid} survived the kill");
        let _ = std::fs::remove_file(&path);
    }
}
