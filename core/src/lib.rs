pub mod action;
pub mod build;
pub mod config;
pub mod report;
pub mod style;
pub mod testing;

pub use crate::action::{Harness, RunPhase, RunSummary};
pub use crate::config::Config;
pub use crate::report::{ScoreAggregator, ScoreReport, COMPILES_KEY};
