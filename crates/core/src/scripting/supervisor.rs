//! Process supervisor for inline script steps.
//!
//! [`ScriptAction::run`] drives one invocation end to end: parse the script,
//! write it to disk, build the environment, spawn the interpreter, stream its
//! output line by line, and race all of that against the caller's
//! cancellation token. Exactly one [`Outcome`] comes out.
//!
//! Both output streams are drained by their own task and both must reach
//! end-of-stream before the exit status is read, so trailing lines are never
//! lost. On cancellation the in-flight execution future is dropped: the drain
//! tasks are aborted, the child is killed (`kill_on_drop`), and the script
//! file is released by its guard.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::environment::{build_environment, EnvPolicy, WorkerVars};
use super::materialize::materialize;
use super::sink::{GatedSink, LineSink};
use super::spec::{parse_script, HostOs, ScriptDefaults};
use crate::error::ScriptError;
use crate::outcome::{Outcome, CANCELED_REASON};
use crate::parameter::Parameter;

/// Longest line forwarded to the sink (1 MiB). Longer output without a
/// newline is split into chunks of this size.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Everything one invocation needs besides the sink and the cancel token.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub parameters: Vec<Parameter>,
    pub worker: WorkerVars,
    /// Directory the temporary script file is created in.
    pub basedir: PathBuf,
    /// Working directory of the child. Inherited from the worker when `None`.
    pub working_dir: Option<PathBuf>,
    /// Snapshot of the host environment the child inherits from.
    pub host_env: Vec<(String, String)>,
    /// Directory appended to the child's `PATH`. Defaults to the directory
    /// of the running worker executable.
    pub worker_dir: Option<PathBuf>,
}

impl StepRequest {
    /// Request with the current process environment and no worker variables.
    pub fn new(parameters: Vec<Parameter>, basedir: impl Into<PathBuf>) -> Self {
        Self {
            parameters,
            worker: WorkerVars::default(),
            basedir: basedir.into(),
            working_dir: None,
            host_env: host_environment(),
            worker_dir: None,
        }
    }
}

/// Runs inline script steps.
#[derive(Debug, Clone)]
pub struct ScriptAction {
    defaults: ScriptDefaults,
    policy: EnvPolicy,
    host: HostOs,
}

impl Default for ScriptAction {
    fn default() -> Self {
        Self::new(ScriptDefaults::default(), EnvPolicy::default(), HostOs::current())
    }
}

impl ScriptAction {
    pub fn new(defaults: ScriptDefaults, policy: EnvPolicy, host: HostOs) -> Self {
        Self {
            defaults,
            policy,
            host,
        }
    }

    /// Execute one script step until it finishes or `cancel` fires.
    ///
    /// Every failure is reported through the returned [`Outcome`] and as a
    /// final line on `sink`. No line reaches `sink` after this returns.
    pub async fn run(
        &self,
        request: StepRequest,
        sink: Arc<dyn LineSink>,
        cancel: CancellationToken,
    ) -> Outcome {
        let gate = Arc::new(GatedSink::new(sink));
        let mut execution = Box::pin(self.execute(request, Arc::clone(&gate) as Arc<dyn LineSink>));

        let finished = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = &mut execution => Some(outcome),
        };

        let outcome = match finished {
            Some(outcome) => outcome,
            None => {
                drop(execution);
                tracing::error!("Script execution canceled");
                gate.close_with(CANCELED_REASON);
                Outcome::canceled()
            }
        };
        gate.close();

        tracing::info!(status = %outcome.status, reason = %outcome.reason, "Script step finished");
        outcome
    }

    async fn execute(&self, request: StepRequest, sink: Arc<dyn LineSink>) -> Outcome {
        match self.try_execute(request, &sink).await {
            Ok(()) => Outcome::success(),
            Err(err) => {
                sink.send_line(&err.to_string());
                err.into()
            }
        }
    }

    async fn try_execute(
        &self,
        request: StepRequest,
        sink: &Arc<dyn LineSink>,
    ) -> Result<(), ScriptError> {
        let spec = parse_script(&request.parameters, self.host, &self.defaults)?;
        // Released on every return path below, after the child is gone.
        let script = materialize(&spec, &request.basedir)?;

        let worker_dir = match request.worker_dir {
            Some(dir) => dir,
            None => current_worker_dir()?,
        };
        tracing::debug!(worker_dir = %worker_dir.display(), "Worker binary path");

        let env = build_environment(
            &request.host_env,
            &request.parameters,
            &request.worker,
            &self.policy,
            &worker_dir,
        );

        tracing::info!(
            interpreter = script.interpreter(),
            args = %script.args().join(" "),
            "Running script",
        );

        let mut cmd = Command::new(script.interpreter());
        cmd.args(script.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        env.apply_to(&mut cmd);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            tracing::warn!(interpreter = script.interpreter(), error = %e, "Cannot start script");
            ScriptError::Spawn(e)
        })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            tracing::warn!("Cannot get script output pipes");
            return Err(ScriptError::Pipe);
        };

        let mut drains = JoinSet::new();
        drains.spawn(drain_lines(stdout, Arc::clone(sink)));
        drains.spawn(drain_lines(stderr, Arc::clone(sink)));
        while let Some(joined) = drains.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Output drain task failed");
            }
        }

        let status = child.wait().await.map_err(|e| {
            tracing::warn!(error = %e, "Cannot wait for script");
            ScriptError::Wait(e)
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(ScriptError::ProcessExit(status.to_string()))
        }
    }
}

/// Forward each `\n`-terminated line of `reader` to `sink` until EOF.
///
/// Invalid UTF-8 is replaced rather than ending the stream; a final
/// unterminated line is still forwarded. Lines are capped at
/// [`MAX_LINE_BYTES`]; the remainder arrives as further lines.
async fn drain_lines<R>(reader: R, sink: Arc<dyn LineSink>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await;
        match read {
            Ok(0) => break,
            Ok(_) => sink.send_line(&String::from_utf8_lossy(strip_line_ending(&buf))),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read script output");
                break;
            }
        }
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Directory holding the running worker executable.
fn current_worker_dir() -> Result<PathBuf, ScriptError> {
    let exe = std::env::current_exe().map_err(|e| {
        tracing::warn!(error = %e, "Cannot get worker path");
        ScriptError::WorkerPath(e)
    })?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        ScriptError::WorkerPath(std::io::Error::other("worker executable has no parent directory"))
    })
}

/// Lossy snapshot of the current process environment.
pub fn host_environment() -> Vec<(String, String)> {
    std::env::vars_os()
        .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
