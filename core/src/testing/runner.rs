use std::{
    ffi::{OsStr, OsString},
    fmt, io,
    os::fd::OwnedFd,
    path::{Component, Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use nix::{
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::unix::pipe,
    process::Command,
};

use super::result::*;

/// A program plus its argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

    /// `argv[0]` is the program. Returns `None` for an empty argv.
    pub fn from_argv<S: AsRef<OsStr>>(argv: &[S]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(args.iter().map(|a| a.as_ref().to_owned())))
    }

    /// `launcher... program args...`
    pub fn wrapped_by(&self, launcher: &Invocation) -> Self {
        let mut args = launcher.args.clone();
        args.push(self.program.clone().into_os_string());
        args.extend(self.args.iter().cloned());
        Self {
            program: launcher.program.clone(),
            args,
        }
    }

    /// Anchors a relative program path like `./subject` at `dir`.
    ///
    /// Bare names (`make`, `valgrind`) are left alone so that `PATH` lookup still applies.
    pub fn resolve_in(&self, dir: impl AsRef<Path>) -> Self {
        let is_bare_name = matches!(
            self.program.components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        );
        if self.program.is_absolute() || is_bare_name {
            return self.clone();
        }
        Self {
            program: fsutil::normalize_path(dir.as_ref().join(&self.program)),
            args: self.args.clone(),
        }
    }

    /// File name of the program, e.g. `nodemngr` for `./build/nodemngr`.
    pub fn program_name(&self) -> Option<&str> {
        self.program.file_name()?.to_str()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}: {1}")]
    Io(&'static str, #[source] io::Error),
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    current_dir: Option<PathBuf>,
    time_limit: Option<Duration>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(8);

    pub fn new() -> Self {
        Self {
            current_dir: None,
            time_limit: Some(Self::DEFAULT_TIME_LIMIT),
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// `None` waits for the child however long it takes.
    pub fn time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    /// Runs `inv` with `input` on stdin and stdout/stderr captured through one pipe.
    ///
    /// A non-zero exit or a crash is a normal completion. Only failing to start
    /// the process (or to set up its pipes) is an error. When the time limit
    /// expires the child is killed and reaped before this returns, and whatever
    /// it printed so far is dropped.
    pub async fn run(&self, inv: &Invocation, input: &[u8]) -> Result<RunOutcome, RunnerError> {
        let (reader, writer) =
            io::pipe().map_err(|e| RunnerError::Io("Failed to create output pipe", e))?;
        let writer_for_stderr = writer
            .try_clone()
            .map_err(|e| RunnerError::Io("Failed to duplicate output pipe", e))?;
        let mut output_rx = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
            .map_err(|e| RunnerError::Io("Failed to register output pipe", e))?;

        let start_at = tokio::time::Instant::now();
        let mut proc = {
            let mut cmd = Command::new(&inv.program);
            cmd.args(&inv.args)
                .stdin(Stdio::piped())
                .stdout(writer)
                .stderr(writer_for_stderr)
                .process_group(0)
                .kill_on_drop(true);
            if let Some(dir) = &self.current_dir {
                cmd.current_dir(dir);
            }
            let proc = cmd.spawn().map_err(|e| RunnerError::Spawn {
                program: inv.to_string(),
                source: e,
            })?;
            // `cmd` owns our copies of the write end; it must go before reading,
            // otherwise the reader never sees EOF.
            drop(cmd);
            proc
        };
        // The child leads its own group, so its pid is also the group id.
        let pgid = proc.id().map(|pid| Pid::from_raw(pid as i32));

        let mut stdin = proc
            .stdin
            .take()
            .ok_or_else(|| RunnerError::Io("Failed to open stdin", io::ErrorKind::Other.into()))?;

        let mut output = Vec::new();
        let res = {
            let feed_stdin = async move {
                // The subject may exit without draining its input.
                if let Err(e) = stdin.write_all(input).await {
                    log::debug!("Input was not fully consumed: {}", e);
                }
                drop(stdin); // NOTE: closing stdin delivers EOF to the subject
            };
            let communicate = async {
                let ((), read_res, wait_res) = tokio::join!(
                    feed_stdin,
                    output_rx.read_to_end(&mut output),
                    proc.wait()
                );
                read_res.map_err(|e| RunnerError::Io("Failed to read subprocess output", e))?;
                wait_res.map_err(|e| RunnerError::Io("Failed to wait for subprocess", e))
            };
            match self.time_limit {
                Some(limit) => tokio::time::timeout(limit, communicate).await.ok(),
                None => Some(communicate.await),
            }
        };

        let elapsed = start_at.elapsed();

        match res {
            None => {
                kill_process_group(pgid);
                proc.kill()
                    .await
                    .unwrap_or_else(|e| log::warn!("Failed to kill timed-out process: {:#}", e));
                log::debug!("'{}' timed out after {}ms", inv, elapsed.as_millis());
                Ok(RunOutcome::TimedOut { elapsed })
            }
            Some(Err(e)) => {
                kill_process_group(pgid);
                let _ = proc.kill().await;
                Err(e)
            }
            Some(Ok(status)) => Ok(RunOutcome::Completed(ExecutionResult {
                output,
                exit: status.into(),
                elapsed,
            })),
        }
    }
}

/// Kills everything the child forked. Only valid while the child is not yet reaped.
fn kill_process_group(pgid: Option<Pid>) {
    let Some(pgid) = pgid else {
        return
    };
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        log::debug!("killpg({}) failed: {}", pgid, e);
    }
}
