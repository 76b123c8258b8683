pub mod config;
pub mod init;
pub mod run;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Show debug logs, including the subject's output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    #[command(alias("r"))]
    Run(run::Args),

    Init(init::Args),

    Config(config::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Run(args) => run::exec(args, self).await,
            Init(args) => init::exec(args, self),
            Config(args) => config::exec(args, self),
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use clap::{CommandFactory, Parser};

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        GlobalArgs::command().debug_assert();
    }

    #[test]
    fn run_args() {
        let args = GlobalArgs::try_parse_from([
            "grader",
            "run",
            "--record",
            "-C",
            "work",
            "--timeout-ms",
            "500",
            "--no-leak-check",
            "-o",
            "report.json",
            "-v",
        ])
        .unwrap();
        assert!(args.verbose);
        let Subcommand::Run(run) = args.subcmd else {
            panic!("expected run subcommand")
        };
        assert!(run.record);
        assert!(run.no_leak_check);
        assert_eq!(run.dir.as_deref(), Some(Path::new("work")));
        assert_eq!(run.timeout_ms, Some(500));
        assert_eq!(run.output.as_deref(), Some(Path::new("report.json")));
        assert_eq!(run.config, None);
    }

    #[test]
    fn run_defaults_to_compare_mode() {
        let args = GlobalArgs::try_parse_from(["grader", "r"]).unwrap();
        let Subcommand::Run(run) = args.subcmd else {
            panic!("expected run subcommand")
        };
        assert!(!run.record);
        assert!(!run.no_leak_check);
    }
}
