pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;
use error::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::build::{BuildSystem, CommandBuildSystem, KillallSweeper, ProcessSweeper};
use crate::config::Config;
use crate::report::{ScoreAggregator, ScoreReport};
use crate::style;
use crate::testing::{
    BuildOutcome, FailReason, FsTestcase, Invocation, Judgement, LeakDetector, LeakVerdict,
    Oracle, OracleError, OracleMode, ProcessRunner, RunOutcome, RunnerError, TestOutcome,
    Testcase, Verdict,
};

/// `Init → Building → (BuildFailed | Testing) → Reporting`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum RunPhase {
    Init,
    Building,
    BuildFailed,
    Testing,
    Reporting,
}

/// Problems with the test setup rather than with the subject.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("Cannot load input: {0}")]
    Input(#[source] fsutil::Error),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub build: BuildOutcome,
    pub outcomes: Vec<TestOutcome>,
    pub report: ScoreReport,
    /// Every phase the run went through, in order.
    pub phases: Vec<RunPhase>,
}

struct CaseReport {
    outcome: TestOutcome,
    /// (expected, actual) when the output did not match the reference.
    mismatch: Option<(Vec<u8>, Vec<u8>)>,
}

impl From<TestOutcome> for CaseReport {
    fn from(outcome: TestOutcome) -> Self {
        Self {
            outcome,
            mismatch: None,
        }
    }
}

pub struct Harness<B = CommandBuildSystem, S = KillallSweeper> {
    build_system: B,
    sweeper: S,
    subject: Invocation,
    runner: ProcessRunner,
    oracle: Oracle,
    leak_detector: Option<LeakDetector>,
    input_dir: PathBuf,
    sweep_process_name: Option<String>,
    show_progress: bool,
}

impl Harness {
    /// Paths in `cfg` are taken relative to `workdir`, which is also where every command runs.
    pub fn from_config(cfg: &Config, workdir: impl AsRef<Path>, mode: OracleMode) -> Result<Self> {
        let workdir = workdir.as_ref();
        let subject = cfg
            .test
            .subject_invocation()
            .context("`test.subject` is empty")?
            .resolve_in(workdir);
        let build = cfg
            .build
            .build_invocation()
            .context("`build.command` is empty")?;

        let build_system = CommandBuildSystem::new(build)
            .clean_command(cfg.build.clean_invocation())
            .warning_marker(cfg.build.warning_marker.as_bytes())
            .runner(ProcessRunner::new().current_dir(workdir).time_limit(None));

        // Recording a reference is not grading, so there is nothing to add a bonus to.
        let leak_detector = match (cfg.leak_check.enabled, mode) {
            (true, OracleMode::Compare) => {
                let launcher = cfg
                    .leak_check
                    .launcher_invocation()
                    .context("`leak_check.launcher` is empty")?;
                Some(
                    LeakDetector::new(launcher)
                        .marker(cfg.leak_check.marker.as_bytes())
                        .runner(
                            ProcessRunner::new()
                                .current_dir(workdir)
                                .time_limit(cfg.leak_check.time_limit()),
                        ),
                )
            }
            _ => None,
        };

        Ok(Self {
            build_system,
            sweeper: KillallSweeper::new(),
            subject,
            runner: ProcessRunner::new()
                .current_dir(workdir)
                .time_limit(Some(cfg.test.time_limit())),
            oracle: Oracle::new(workdir.join(&cfg.test.reference_dir), mode),
            leak_detector,
            input_dir: workdir.join(&cfg.test.input_dir),
            sweep_process_name: cfg.sweep_process_name(),
            show_progress: false,
        })
    }
}

impl<B, S> Harness<B, S>
where
    B: BuildSystem,
    S: ProcessSweeper,
{
    pub fn with_build_system<B2: BuildSystem>(self, build_system: B2) -> Harness<B2, S> {
        Harness {
            build_system,
            sweeper: self.sweeper,
            subject: self.subject,
            runner: self.runner,
            oracle: self.oracle,
            leak_detector: self.leak_detector,
            input_dir: self.input_dir,
            sweep_process_name: self.sweep_process_name,
            show_progress: self.show_progress,
        }
    }

    pub fn with_sweeper<S2: ProcessSweeper>(self, sweeper: S2) -> Harness<B, S2> {
        Harness {
            build_system: self.build_system,
            sweeper,
            subject: self.subject,
            runner: self.runner,
            oracle: self.oracle,
            leak_detector: self.leak_detector,
            input_dir: self.input_dir,
            sweep_process_name: self.sweep_process_name,
            show_progress: self.show_progress,
        }
    }

    pub fn show_progress(mut self, yes: bool) -> Self {
        self.show_progress = yes;
        self
    }

    pub async fn run(&self) -> RunSummary {
        self.run_and_report(|_| Ok(())).await
    }

    /// Runs every phase and hands the finished report to `emit` before cleaning up.
    ///
    /// Never fails: per-testcase problems are scored, and a failing `emit`
    /// is logged. Cleanup runs whatever happened before it.
    pub async fn run_and_report<F>(&self, emit: F) -> RunSummary
    where
        F: FnOnce(&ScoreReport) -> Result<()>,
    {
        let mut phases = vec![RunPhase::Init];
        let mut enter = |phase: RunPhase| {
            log::debug!("Phase: {}", phase);
            phases.push(phase);
        };
        let mut aggregator = ScoreAggregator::new();
        let mut outcomes = Vec::new();

        enter(RunPhase::Building);
        let build = self.build_system.build().await;
        aggregator.record_build(build);
        log::info!("Build: {} (score {})", build, build.score());

        if build.is_success() {
            enter(RunPhase::Testing);
            outcomes = self.run_all_testcases(&mut aggregator).await;
        } else {
            enter(RunPhase::BuildFailed);
        }

        enter(RunPhase::Reporting);
        let report = aggregator.finalize();
        if let Err(e) = emit(&report) {
            log::error!("Failed to emit report: {:#}", e);
        }

        self.cleanup().await;

        RunSummary {
            build,
            outcomes,
            report,
            phases,
        }
    }

    async fn run_all_testcases(&self, aggregator: &mut ScoreAggregator) -> Vec<TestOutcome> {
        let testcases = match FsTestcase::enumerate(&self.input_dir) {
            Ok(testcases) => testcases,
            Err(e) => {
                log::error!("Cannot list testcases: {:#}", e);
                return Vec::new();
            }
        };
        if testcases.is_empty() {
            log::warn!(
                "No testcases found in {}",
                self.input_dir.to_string_lossy()
            );
        }

        log::info!("Running: {} ({} mode)", self.subject, self.oracle.mode());

        let mut results = Vec::with_capacity(testcases.len());
        let mut mismatches = Vec::new();
        for t in &testcases {
            let bar = self.new_spinner(t.name());
            let CaseReport { outcome, mismatch } = self.execute_testcase(t).await;
            bar.finish_with_message(
                format!(
                    "Testcase {} ... {} [{}ms]",
                    t.name(),
                    style::verdict_icon(outcome.verdict),
                    outcome.execution_time.as_millis(),
                )
                .cyan()
                .to_string(),
            );
            aggregator.record_outcome(&outcome);
            if let Some(m) = mismatch {
                mismatches.push((outcome.name.clone(), m));
            }
            results.push(outcome);
        }

        for (name, (expected, actual)) in &mismatches {
            style::print_mismatch_detail(name, expected, actual);
        }
        if self.oracle.mode() == OracleMode::Compare {
            style::print_test_result_summary(&results);
        }
        results
    }

    fn new_spinner(&self, testcase_name: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap();
        let bar = ProgressBar::new_spinner()
            .with_style(style)
            .with_message(format!("Testcase {} ...", testcase_name));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }

    /// Runs one testcase through runner, oracle and (on a pass) the leak detector.
    pub async fn run_testcase<T: Testcase>(&self, testcase: &T) -> TestOutcome {
        self.execute_testcase(testcase).await.outcome
    }

    async fn execute_testcase<T: Testcase>(&self, testcase: &T) -> CaseReport {
        let name = testcase.name();
        match self.try_execute_testcase(testcase).await {
            Ok(report) => report,
            Err(e) => {
                log::error!(
                    "[{}] Harness error, scored 0 but not a wrong answer: {:#}",
                    name,
                    e
                );
                TestOutcome::failed(
                    name,
                    FailReason::Infrastructure(format!("{:#}", e)),
                    Duration::ZERO,
                )
                .into()
            }
        }
    }

    async fn try_execute_testcase<T: Testcase>(
        &self,
        testcase: &T,
    ) -> std::result::Result<CaseReport, CaseError> {
        let name = testcase.name();
        let input = testcase.input().map_err(CaseError::Input)?;

        let res = match self.runner.run(&self.subject, &input).await? {
            RunOutcome::TimedOut { elapsed } => {
                log::warn!(
                    "[{}] Timed out after {}ms. Check for end-of-input (EOF) handling or an infinite loop",
                    name,
                    elapsed.as_millis()
                );
                return Ok(TestOutcome::failed(name, FailReason::TimedOut, elapsed).into());
            }
            RunOutcome::Completed(res) => res,
        };
        log::debug!("[{}] Output:\n{}", name, res.output_lossy());

        if let Some(signal) = res.killed_by_signal() {
            log::warn!("[{}] Subject was killed by signal {}", name, signal);
            // A crash is still recorded as-is: whatever it printed becomes the reference.
            if self.oracle.mode() == OracleMode::Compare {
                return Ok(
                    TestOutcome::failed(name, FailReason::Crashed { signal }, res.elapsed).into(),
                );
            }
        }
        if !res.success() {
            log::info!("[{}] Subject exited with {:?}", name, res.exit);
        }

        match self.oracle.judge(name, &res.output)? {
            Judgement::Mismatch { expected } => {
                return Ok(CaseReport {
                    outcome: TestOutcome::failed(name, FailReason::WrongOutput, res.elapsed),
                    mismatch: Some((expected, res.output)),
                });
            }
            Judgement::Recorded => {
                log::info!(
                    "[{}] Recorded reference ({} bytes)",
                    name,
                    res.output.len()
                );
                return Ok(TestOutcome {
                    name: name.to_owned(),
                    verdict: Verdict::Recorded,
                    leak: None,
                    fail_reason: None,
                    execution_time: res.elapsed,
                }
                .into());
            }
            Judgement::Match => (),
        }

        let leak = match &self.leak_detector {
            Some(detector) => Some(detector.check(&self.subject, &input).await),
            None => None,
        };
        match leak {
            Some(LeakVerdict::LeakDetected) => log::warn!("[{}] Memory leak reported", name),
            Some(LeakVerdict::Inconclusive) => {
                log::warn!("[{}] Leak check was inconclusive; no bonus", name)
            }
            _ => (),
        }

        Ok(TestOutcome {
            name: name.to_owned(),
            verdict: leak.map_or(Verdict::Pass, |l| Verdict::Pass.with_leak_verdict(l)),
            leak,
            fail_reason: None,
            execution_time: res.elapsed,
        }
        .into())
    }

    async fn cleanup(&self) {
        self.build_system.clean().await;
        if let Some(name) = &self.sweep_process_name {
            self.sweeper.sweep(name).await;
        }
    }
}
