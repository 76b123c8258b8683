use std::path::PathBuf;

use grader_core::{testing::OracleMode, Config, Harness};

use crate::util;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Save the subject's output as the new reference instead of grading it
    #[arg(long)]
    pub record: bool,

    /// Config file (default: nearest grader.toml, else built-in defaults)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory to run in (default: current dir)
    #[arg(short = 'C', long)]
    pub dir: Option<PathBuf>,

    /// Skip the memory-leak pass (passing tests score 1 at most)
    #[arg(long)]
    pub no_leak_check: bool,

    /// Override `test.timeout_ms`
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn exec(args: &Args, _global_args: &GlobalArgs) -> SubcmdResult {
    let workdir = util::working_dir(args.dir.as_deref());
    let mut cfg = Config::load(&workdir, args.config.as_deref())?;
    if args.no_leak_check {
        cfg.leak_check.enabled = false;
    }
    if let Some(ms) = args.timeout_ms {
        cfg.test.timeout_ms = ms;
    }
    cfg.validate()?;

    let mode = if args.record {
        OracleMode::Record
    } else {
        OracleMode::Compare
    };
    let harness = Harness::from_config(&cfg, &workdir, mode)?.show_progress(true);

    // The report is printed whatever happens during the run.
    harness
        .run_and_report(|report| {
            println!("{}", report.to_json()?);
            if let Some(path) = &args.output {
                fsutil::write_json_with_mkdir(path, report)?;
            }
            Ok(())
        })
        .await;
    Ok(())
}
