use async_trait::async_trait;

use crate::testing::{BuildOutcome, Invocation, ProcessRunner, RunOutcome};

/// The opaque build step. Build once before testing, clean once at the end.
#[async_trait]
pub trait BuildSystem: Send + Sync {
    async fn build(&self) -> BuildOutcome;

    /// Failures here never change the score; implementations only log.
    async fn clean(&self);
}

#[derive(Debug, Clone)]
pub struct CommandBuildSystem {
    build: Invocation,
    clean: Option<Invocation>,
    warning_marker: Vec<u8>,
    runner: ProcessRunner,
}

impl CommandBuildSystem {
    pub const DEFAULT_WARNING_MARKER: &str = " warning: ";

    pub fn new(build: Invocation) -> Self {
        Self {
            build,
            clean: None,
            warning_marker: Self::DEFAULT_WARNING_MARKER.into(),
            runner: ProcessRunner::new().time_limit(None),
        }
    }

    pub fn clean_command(mut self, clean: Option<Invocation>) -> Self {
        self.clean = clean;
        self
    }

    pub fn warning_marker(mut self, marker: impl Into<Vec<u8>>) -> Self {
        self.warning_marker = marker.into();
        self
    }

    pub fn runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }
}

#[async_trait]
impl BuildSystem for CommandBuildSystem {
    async fn build(&self) -> BuildOutcome {
        log::info!("Building: {}", self.build);
        match self.runner.run(&self.build, b"").await {
            Ok(RunOutcome::Completed(res)) => {
                log::debug!("Build output:\n{}", res.output_lossy());
                let outcome =
                    BuildOutcome::classify(res.success(), &res.output, &self.warning_marker);
                if !outcome.is_success() {
                    log::error!(
                        "Build failed ({:?}):\n{}",
                        res.exit,
                        res.output_lossy().trim_end()
                    );
                }
                outcome
            }
            Ok(RunOutcome::TimedOut { elapsed }) => {
                log::error!("Build timed out after {}ms", elapsed.as_millis());
                BuildOutcome::Failed
            }
            Err(e) => {
                log::error!("Build could not run: {:#}", e);
                BuildOutcome::Failed
            }
        }
    }

    async fn clean(&self) {
        let Some(clean) = &self.clean else {
            return
        };
        log::info!("Cleaning: {}", clean);
        match self.runner.run(clean, b"").await {
            Ok(RunOutcome::Completed(res)) if !res.success() => {
                log::warn!("Clean command exited with {:?}", res.exit)
            }
            Ok(_) => (),
            Err(e) => log::warn!("Clean command could not run: {:#}", e),
        }
    }
}

/// Kills processes left behind by the subject.
#[async_trait]
pub trait ProcessSweeper: Send + Sync {
    async fn sweep(&self, process_name: &str);
}

/// `killall <name>`, best effort.
#[derive(Debug, Clone, Default)]
pub struct KillallSweeper {
    runner: ProcessRunner,
}

impl KillallSweeper {
    pub const PROGRAM: &str = "killall";

    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessSweeper for KillallSweeper {
    async fn sweep(&self, process_name: &str) {
        let inv = Invocation::new(Self::PROGRAM).arg(process_name);
        match self.runner.run(&inv, b"").await {
            // killall exits non-zero when nothing matched, which is the usual case.
            Ok(RunOutcome::Completed(res)) => {
                log::debug!("{} exited with {:?}", inv, res.exit)
            }
            Ok(RunOutcome::TimedOut { .. }) => log::warn!("'{}' did not finish", inv),
            Err(e) => log::debug!("Process sweep skipped: {:#}", e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn clean_build() {
        let b = CommandBuildSystem::new(sh("echo 'cc -o app app.c'"));
        assert_eq!(b.build().await, BuildOutcome::SucceededClean);
    }

    #[tokio::test]
    async fn warnings_are_detected_on_either_stream() {
        let b = CommandBuildSystem::new(sh("echo 'app.c:3:5: warning: unused variable' >&2"));
        assert_eq!(b.build().await, BuildOutcome::SucceededWithWarnings);
    }

    #[tokio::test]
    async fn failing_or_missing_build_command() {
        let b = CommandBuildSystem::new(sh("echo 'app.c:1: error: nope'; exit 2"));
        assert_eq!(b.build().await, BuildOutcome::Failed);

        let b = CommandBuildSystem::new(Invocation::new("/nonexistent/make"));
        assert_eq!(b.build().await, BuildOutcome::Failed);
    }

    #[tokio::test]
    async fn clean_runs_the_clean_command() {
        let dir = tempfile::tempdir().unwrap();
        let b = CommandBuildSystem::new(Invocation::new("true"))
            .clean_command(Some(sh("touch cleaned")))
            .runner(ProcessRunner::new().current_dir(dir.path()));
        b.clean().await;
        assert!(dir.path().join("cleaned").is_file());
    }

    #[tokio::test]
    async fn sweeping_nothing_is_harmless() {
        KillallSweeper::new()
            .sweep("grader-no-such-process-name")
            .await;
    }
}
