use std::{borrow::Cow, os::unix::process::ExitStatusExt, process::ExitStatus, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitKind {
    Code(i32),
    Signal(i32),
}

impl From<ExitStatus> for ExitKind {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitKind::Code(code),
            (None, Some(sig)) => ExitKind::Signal(sig),
            (None, None) => ExitKind::Code(-1),
        }
    }
}

/// What a finished process left behind. Produced exactly once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// stdout and stderr, in the order the child wrote them.
    pub output: Vec<u8>,
    pub exit: ExitKind,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit == ExitKind::Code(0)
    }

    pub fn killed_by_signal(&self) -> Option<i32> {
        match self.exit {
            ExitKind::Signal(sig) => Some(sig),
            ExitKind::Code(_) => None,
        }
    }

    pub fn output_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(ExecutionResult),
    /// The child was killed at the deadline. Partial output is discarded.
    TimedOut { elapsed: Duration },
}

impl RunOutcome {
    pub fn completed(self) -> Option<ExecutionResult> {
        match self {
            RunOutcome::Completed(res) => Some(res),
            RunOutcome::TimedOut { .. } => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, RunOutcome::TimedOut { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            RunOutcome::Completed(res) => res.elapsed,
            RunOutcome::TimedOut { elapsed } => *elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Verdict {
    #[strum(serialize = "--")]
    NotRun,
    #[strum(serialize = "NG")]
    Fail,
    #[strum(serialize = "OK")]
    Pass,
    #[strum(serialize = "OK+")]
    PassClean,
    /// Output was saved as the new reference; nothing was graded.
    #[strum(serialize = "REC")]
    Recorded,
}

impl Verdict {
    /// `None` when nothing was graded: the testcase never ran, or its output was only recorded.
    pub fn score(self) -> Option<u8> {
        use Verdict::*;
        match self {
            NotRun | Recorded => None,
            Fail => Some(0),
            Pass => Some(1),
            PassClean => Some(2),
        }
    }

    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass | Verdict::PassClean)
    }

    /// Only a clean leak check promotes; anything else leaves the verdict as is.
    pub fn with_leak_verdict(self, leak: LeakVerdict) -> Self {
        match (self, leak) {
            (Verdict::Pass, LeakVerdict::Clean) => Verdict::PassClean,
            (v, _) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum LeakVerdict {
    Clean,
    LeakDetected,
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum BuildOutcome {
    Failed,
    SucceededWithWarnings,
    SucceededClean,
}

impl BuildOutcome {
    pub fn classify(exit_success: bool, output: &[u8], warning_marker: &[u8]) -> Self {
        if !exit_success {
            BuildOutcome::Failed
        } else if contains_subslice(output, warning_marker) {
            BuildOutcome::SucceededWithWarnings
        } else {
            BuildOutcome::SucceededClean
        }
    }

    pub fn score(self) -> u8 {
        use BuildOutcome::*;
        match self {
            Failed => 0,
            SucceededWithWarnings => 1,
            SucceededClean => 2,
        }
    }

    pub fn is_success(self) -> bool {
        self != BuildOutcome::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    WrongOutput,
    TimedOut,
    Crashed { signal: i32 },
    /// Broken test setup (missing reference, spawn failure, ...), not a subject failure.
    Infrastructure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub name: String,
    pub verdict: Verdict,
    pub leak: Option<LeakVerdict>,
    pub fail_reason: Option<FailReason>,
    pub execution_time: Duration,
}

impl TestOutcome {
    pub fn failed(name: impl Into<String>, reason: FailReason, execution_time: Duration) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Fail,
            leak: None,
            fail_reason: Some(reason),
            execution_time,
        }
    }

    pub fn is_infrastructure_error(&self) -> bool {
        matches!(self.fail_reason, Some(FailReason::Infrastructure(_)))
    }
}

pub(crate) fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verdict_scores() {
        assert_eq!(Verdict::NotRun.score(), None);
        assert_eq!(Verdict::Fail.score(), Some(0));
        assert_eq!(Verdict::Pass.score(), Some(1));
        assert_eq!(Verdict::PassClean.score(), Some(2));
        assert_eq!(Verdict::Recorded.score(), None);
        assert!(!Verdict::Recorded.is_pass());
    }

    #[test]
    fn only_clean_leak_check_promotes_pass() {
        assert_eq!(
            Verdict::Pass.with_leak_verdict(LeakVerdict::Clean),
            Verdict::PassClean
        );
        assert_eq!(
            Verdict::Pass.with_leak_verdict(LeakVerdict::LeakDetected),
            Verdict::Pass
        );
        assert_eq!(
            Verdict::Pass.with_leak_verdict(LeakVerdict::Inconclusive),
            Verdict::Pass
        );
        assert_eq!(
            Verdict::Fail.with_leak_verdict(LeakVerdict::Clean),
            Verdict::Fail
        );
    }

    #[test]
    fn build_outcome_classification() {
        let marker = b" warning: ";
        assert_eq!(
            BuildOutcome::classify(false, b"", marker),
            BuildOutcome::Failed
        );
        assert_eq!(
            BuildOutcome::classify(false, b"main.c:3: warning: unused", marker),
            BuildOutcome::Failed
        );
        assert_eq!(
            BuildOutcome::classify(true, b"main.c:3:5: warning: unused variable", marker),
            BuildOutcome::SucceededWithWarnings
        );
        assert_eq!(
            BuildOutcome::classify(true, b"cc -o main main.c\n", marker),
            BuildOutcome::SucceededClean
        );
        assert_eq!(BuildOutcome::SucceededClean.score(), 2);
        assert_eq!(BuildOutcome::SucceededWithWarnings.score(), 1);
        assert_eq!(BuildOutcome::Failed.score(), 0);
    }

    #[test]
    fn subslice_search() {
        assert!(contains_subslice(b"==12== LEAK SUMMARY:", b"LEAK SUMMARY"));
        assert!(!contains_subslice(b"LEAK SUMMAR", b"LEAK SUMMARY"));
        assert!(contains_subslice(b"anything", b""));
    }
}
