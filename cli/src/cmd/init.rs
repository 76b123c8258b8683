use anyhow::ensure;
use grader_core::{print_success, Config};
use std::path::PathBuf;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    dir: PathBuf,

    /// Overwrite an existing grader.toml
    #[arg(short, long)]
    force: bool,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let path = args.dir.join(Config::FILENAME);
    ensure!(
        args.force || !path.exists(),
        "'{}' already exists (use --force to overwrite)",
        path.to_string_lossy()
    );
    fsutil::write_with_mkdir(&path, Config::example_toml())?;
    print_success!(
        "Successfully wrote example config. (path: {})",
        path.to_string_lossy()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::*;

    #[test]
    fn writes_example_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_string_lossy().into_owned();
        let global = GlobalArgs::try_parse_from(["grader", "init", &dir_arg]).unwrap();
        let super::super::Subcommand::Init(args) = &global.subcmd else {
            panic!("expected init subcommand")
        };

        exec(args, &global).unwrap();
        let written = fsutil::read_to_string(dir.path().join(Config::FILENAME)).unwrap();
        assert_eq!(written, Config::example_toml());

        assert!(exec(args, &global).is_err());
    }
}
