use super::{
    result::{contains_subslice, LeakVerdict, RunOutcome},
    runner::{Invocation, ProcessRunner},
};

/// Re-runs a subject under a memory checker and looks for its leak report.
#[derive(Debug, Clone)]
pub struct LeakDetector {
    launcher: Invocation,
    marker: Vec<u8>,
    runner: ProcessRunner,
}

impl LeakDetector {
    pub const DEFAULT_MARKER: &str = "LEAK SUMMARY";

    pub fn new(launcher: Invocation) -> Self {
        Self {
            launcher,
            marker: Self::DEFAULT_MARKER.into(),
            runner: ProcessRunner::new().time_limit(None),
        }
    }

    pub fn marker(mut self, marker: impl Into<Vec<u8>>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Runner for the instrumented process. Unbounded by default.
    pub fn runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Presence of the marker is the whole signal; leak sizes are not parsed.
    pub fn classify(&self, instrumented_output: &[u8]) -> LeakVerdict {
        if contains_subslice(instrumented_output, &self.marker) {
            LeakVerdict::LeakDetected
        } else {
            LeakVerdict::Clean
        }
    }

    pub async fn check(&self, subject: &Invocation, input: &[u8]) -> LeakVerdict {
        let inv = subject.wrapped_by(&self.launcher);
        log::debug!("Leak check: {}", inv);

        match self.runner.run(&inv, input).await {
            Ok(RunOutcome::Completed(res)) => {
                log::debug!("Instrumented output:\n{}", res.output_lossy());
                self.classify(&res.output)
            }
            Ok(RunOutcome::TimedOut { elapsed }) => {
                log::warn!(
                    "Leak check timed out after {}ms; result is inconclusive",
                    elapsed.as_millis()
                );
                LeakVerdict::Inconclusive
            }
            Err(e) => {
                log::error!("Leak check could not run: {:#}", e);
                LeakVerdict::Inconclusive
            }
        }
    }
}
