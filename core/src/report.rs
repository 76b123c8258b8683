use std::collections::BTreeMap;

use serde::Serialize;

use crate::testing::{BuildOutcome, TestOutcome};

/// Report key of the build phase.
pub const COMPILES_KEY: &str = "compiles";

/// Snapshot of all scores of one run, serialized as a flat JSON object.
///
/// A testcase that was never attempted has no entry. That is different from
/// an entry with score `0`, which means it ran and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScoreReport {
    scores: BTreeMap<String, u8>,
}

impl ScoreReport {
    pub fn get(&self, key: &str) -> Option<u8> {
        self.scores.get(key).copied()
    }

    pub fn compiles(&self) -> u8 {
        self.get(COMPILES_KEY).unwrap_or(0)
    }

    pub fn as_map(&self) -> &BTreeMap<String, u8> {
        &self.scores
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoreAggregator {
    build: Option<BuildOutcome>,
    tests: BTreeMap<String, u8>,
}

impl ScoreAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_build(&mut self, outcome: BuildOutcome) {
        self.build = Some(outcome);
    }

    pub fn record(&mut self, key: impl Into<String>, score: u8) {
        let key = key.into();
        if key == COMPILES_KEY {
            log::warn!(
                "Testcase named '{}' collides with the build entry; its score is dropped",
                COMPILES_KEY
            );
            return;
        }
        if let Some(prev) = self.tests.insert(key.clone(), score) {
            log::warn!("Score of '{}' recorded twice ({} -> {})", key, prev, score);
        }
    }

    /// Verdicts without a score (never ran, or only recorded) leave no entry.
    pub fn record_outcome(&mut self, outcome: &TestOutcome) {
        if let Some(score) = outcome.verdict.score() {
            self.record(&outcome.name, score);
        }
    }

    pub fn num_tests(&self) -> usize {
        self.tests.len()
    }

    /// The build entry is always present. A build that was never recorded counts as failed.
    pub fn finalize(&self) -> ScoreReport {
        let mut scores = self.tests.clone();
        let build = self.build.unwrap_or(BuildOutcome::Failed);
        scores.insert(COMPILES_KEY.to_owned(), build.score());
        ScoreReport { scores }
    }
}
