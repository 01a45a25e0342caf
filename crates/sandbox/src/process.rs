use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use nimbus_config::ExecutorSettings;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader,
};
use tokio::process::{Child, Command};

use crate::error::SandboxError;
use crate::executor::{IsolatedExecutor, RunOutcome};
use crate::protocol::{ChildReport, InvocationEnvelope, MetadataReport};
use crate::{METADATA_FLAG, SYNC_FLAG};

/// Time allowed for the stderr reader to reach EOF after the worker exits.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Launches the worker program once per request.
///
/// The command line is `<program> <args...> <file> [flag]`. Each worker runs
/// in its own process group so a timeout takes down anything it forked.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    stderr_tail_bytes: usize,
    max_output_bytes: usize,
}

/// What a finished worker left behind.
struct Finished {
    status: ExitStatus,
    /// `None` when the first line ran past `max_output_bytes`.
    first_line: Option<String>,
    stderr: String,
}

impl ProcessExecutor {
    /// Executor for `program` with no extra arguments.
    pub fn new(program: impl Into<String>) -> Self {
        let defaults = ExecutorSettings::default();
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            stderr_tail_bytes: defaults.stderr_tail_bytes,
            max_output_bytes: defaults.max_output_bytes,
        }
    }

    /// Executor configured from the `executor` settings section.
    pub fn from_settings(settings: &ExecutorSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
            env: settings.env.clone(),
            stderr_tail_bytes: settings.stderr_tail_bytes,
            max_output_bytes: settings.max_output_bytes,
        }
    }

    /// Arguments placed before the function file.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add one environment variable for the worker.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Bytes of stderr kept for error messages.
    pub fn with_stderr_tail(mut self, bytes: usize) -> Self {
        self.stderr_tail_bytes = bytes;
        self
    }

    /// Longest report line accepted from stdout.
    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Program this executor launches.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, file: &Path, flag: Option<&str>, stdin: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(file)
            .envs(&self.env)
            .stdin(if stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(flag) = flag {
            cmd.arg(flag);
        }
        if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    /// Spawn, feed `input`, read the first stdout line and wait, all under
    /// `timeout`.
    async fn drive(
        &self,
        mut cmd: Command,
        input: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<Finished, SandboxError> {
        let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let pid = child.id();
        tracing::trace!(program = %self.program, ?pid, "worker spawned");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tail_bytes = self.stderr_tail_bytes;
        let max_output = self.max_output_bytes;
        let mut stderr_task = tokio::spawn(async move {
            match stderr {
                Some(reader) => read_tail(reader, tail_bytes).await,
                None => String::new(),
            }
        });

        let work = async {
            let feed = async {
                if let (Some(mut pipe), Some(bytes)) = (stdin, input) {
                    match pipe.write_all(&bytes).await {
                        Ok(()) => {}
                        // The worker may exit without reading its input.
                        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                        Err(e) => return Err(e),
                    }
                    pipe.shutdown().await.ok();
                }
                Ok(())
            };
            let read = async {
                let Some(out) = stdout else {
                    return Ok(Some(String::new()));
                };
                let mut reader = BufReader::new(out);
                let Some(line) = read_bounded_line(&mut reader, max_output).await? else {
                    return Ok(None);
                };
                tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
                Ok::<_, std::io::Error>(Some(line))
            };
            let ((), line) = tokio::try_join!(feed, read)?;
            if line.is_none() {
                tracing::warn!(program = %self.program, ?pid, max_output, "worker report too large, killing process group");
                kill(&mut child, pid).await;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, line))
        };
        let result = tokio::time::timeout(timeout, work).await;

        match result {
            Ok(Ok((status, first_line))) => {
                let stderr = match tokio::time::timeout(STDERR_GRACE, &mut stderr_task).await {
                    Ok(joined) => joined.unwrap_or_default(),
                    Err(_) => {
                        // A forked descendant still holds stderr open.
                        stderr_task.abort();
                        String::new()
                    }
                };
                Ok(Finished {
                    status,
                    first_line,
                    stderr,
                })
            }
            Ok(Err(e)) => {
                kill(&mut child, pid).await;
                stderr_task.abort();
                Err(SandboxError::Io(e))
            }
            Err(_) => {
                tracing::warn!(program = %self.program, ?pid, ?timeout, "worker timed out, killing process group");
                kill(&mut child, pid).await;
                stderr_task.abort();
                Err(SandboxError::Timeout { after: timeout })
            }
        }
    }
}

/// Kill the worker's process group, then the worker itself, and reap it.
async fn kill(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            tracing::debug!(pid, error = %e, "killpg failed");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "kill after timeout failed");
    }
}

/// Read one line of at most `limit` bytes, newline excluded.
///
/// Returns `None` once the line runs past `limit`; at most `limit + 1` bytes
/// are buffered.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limit: usize,
) -> std::io::Result<Option<String>> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut line = Vec::new();
    reader.take(cap).read_until(b'\n', &mut line).await?;
    let content = line.strip_suffix(b"\n").map_or(line.len(), <[u8]>::len);
    if content > limit {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Read `reader` to EOF keeping only the last `limit` bytes.
async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> String {
    let mut tail = Vec::new();
    let mut buf = [0_u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > limit {
                    let excess = tail.len() - limit;
                    tail.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).trim().to_owned()
}

#[async_trait]
impl IsolatedExecutor for ProcessExecutor {
    async fn extract_metadata(
        &self,
        file: &Path,
        timeout: Duration,
    ) -> Result<MetadataReport, SandboxError> {
        let finished = self
            .drive(self.command(file, Some(METADATA_FLAG), false), None, timeout)
            .await?;
        if !finished.status.success() {
            return Err(SandboxError::Exited {
                code: finished.status.code(),
                stderr: finished.stderr,
            });
        }
        let Some(line) = finished.first_line else {
            return Err(SandboxError::InvalidOutput {
                detail: format!("metadata line exceeds {} bytes", self.max_output_bytes),
                stderr: finished.stderr,
            });
        };
        MetadataReport::parse(&line).map_err(|e| SandboxError::InvalidOutput {
            detail: e.to_string(),
            stderr: finished.stderr,
        })
    }

    async fn sync_dependencies(&self, file: &Path, timeout: Duration) -> Result<(), SandboxError> {
        let finished = self
            .drive(self.command(file, Some(SYNC_FLAG), false), None, timeout)
            .await?;
        if finished.status.success() {
            Ok(())
        } else {
            Err(SandboxError::Exited {
                code: finished.status.code(),
                stderr: finished.stderr,
            })
        }
    }

    async fn run(
        &self,
        file: &Path,
        envelope: &InvocationEnvelope,
        timeout: Duration,
    ) -> Result<RunOutcome, SandboxError> {
        let input = envelope.to_line()?;
        let finished = match self
            .drive(self.command(file, None, true), Some(input), timeout)
            .await
        {
            Ok(finished) => finished,
            Err(SandboxError::Timeout { after }) => return Ok(RunOutcome::TimedOut { after }),
            Err(SandboxError::Io(e)) => {
                return Ok(RunOutcome::Crashed {
                    exit_code: None,
                    stderr: format!("worker io: {e}"),
                });
            }
            Err(other) => return Err(other),
        };

        let Some(line) = finished.first_line else {
            return Ok(RunOutcome::OversizedOutput {
                limit: self.max_output_bytes,
            });
        };
        if !finished.status.success() {
            return Ok(RunOutcome::Crashed {
                exit_code: finished.status.code(),
                stderr: finished.stderr,
            });
        }
        Ok(match ChildReport::parse(&line) {
            Ok(report) => RunOutcome::Reported(report),
            Err(e) => RunOutcome::InvalidOutput {
                detail: e.to_string(),
                stderr: finished.stderr,
            },
        })
    }
}
