use std::path::PathBuf;

use grader_core::Config;

use crate::util;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short = 'C', long)]
    pub dir: Option<PathBuf>,
}

/// Prints where the configuration came from and what it resolves to.
pub fn exec(args: &Args, _global_args: &GlobalArgs) -> SubcmdResult {
    let workdir = util::working_dir(args.dir.as_deref());
    let cfg = Config::load(&workdir, args.config.as_deref())?;
    let source = cfg
        .source_config_file
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<builtin>".to_owned());
    println!("# source: {}", source);
    print!("{}", cfg.to_toml()?);
    Ok(())
}
