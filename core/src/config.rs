use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::{ensure, Context as _};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};

use crate::testing::Invocation;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub leak_check: LeakCheckConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    pub command: Vec<String>,
    pub clean_command: Vec<String>,
    pub warning_marker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TestConfig {
    pub subject: Vec<String>,
    pub input_dir: PathBuf,
    pub reference_dir: PathBuf,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LeakCheckConfig {
    pub enabled: bool,
    pub launcher: Vec<String>,
    pub marker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    pub sweep: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["make".to_owned()],
            clean_command: vec!["make".to_owned(), "clean".to_owned()],
            warning_marker: " warning: ".to_owned(),
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            subject: vec!["./nodemngr".to_owned()],
            input_dir: "inputs".into(),
            reference_dir: "outputs".into(),
            timeout_ms: 8000,
        }
    }
}

impl Default for LeakCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            launcher: vec!["valgrind".to_owned(), "--leak-check=full".to_owned()],
            marker: "LEAK SUMMARY".to_owned(),
            timeout_ms: None,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            process_name: None,
            sweep: true,
        }
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "grader.toml";

    pub fn example_toml() -> String {
        let file = Asset::get(Self::FILENAME).unwrap();
        std::str::from_utf8(file.data.as_ref()).unwrap().to_owned()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml(&self) -> StdResult<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> Option<PathBuf> {
        cur_dir
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
    }

    /// Loads `explicit` if given, else the nearest `grader.toml`, else the built-in defaults.
    pub fn load(cur_dir: impl AsRef<Path>, explicit: Option<&Path>) -> anyhow::Result<Self> {
        let cfg = match explicit {
            Some(path) => Self::from_toml_file(path.to_owned())?,
            None => match Self::find_file_in_ancestors(&cur_dir) {
                Some(path) => Self::from_toml_file(path)?,
                None => {
                    log::info!(
                        "No '{}' found from {:?}; using built-in defaults",
                        Self::FILENAME,
                        cur_dir.as_ref()
                    );
                    Self::default()
                }
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.build.command.is_empty(), "`build.command` is empty");
        ensure!(
            !self.build.warning_marker.is_empty(),
            "`build.warning_marker` is empty"
        );
        ensure!(!self.test.subject.is_empty(), "`test.subject` is empty");
        ensure!(self.test.timeout_ms > 0, "`test.timeout_ms` must be positive");
        if self.leak_check.enabled {
            ensure!(
                !self.leak_check.launcher.is_empty(),
                "`leak_check.launcher` is empty"
            );
            ensure!(
                !self.leak_check.marker.is_empty(),
                "`leak_check.marker` is empty"
            );
            ensure!(
                self.leak_check.timeout_ms != Some(0),
                "`leak_check.timeout_ms` must be positive"
            );
        }
        Ok(())
    }
}

impl BuildConfig {
    pub fn build_invocation(&self) -> Option<Invocation> {
        Invocation::from_argv(self.command.as_slice())
    }

    /// `None` when no clean command is configured.
    pub fn clean_invocation(&self) -> Option<Invocation> {
        Invocation::from_argv(self.clean_command.as_slice())
    }
}

impl TestConfig {
    pub fn subject_invocation(&self) -> Option<Invocation> {
        Invocation::from_argv(self.subject.as_slice())
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LeakCheckConfig {
    pub fn launcher_invocation(&self) -> Option<Invocation> {
        Invocation::from_argv(self.launcher.as_slice())
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Name swept at the end of the run: explicit setting, else the subject's file name.
    pub fn sweep_process_name(&self) -> Option<String> {
        if !self.cleanup.sweep {
            return None;
        }
        self.cleanup.process_name.clone().or_else(|| {
            self.test
                .subject_invocation()?
                .program_name()
                .map(str::to_owned)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn example_toml_should_be_parsable() {
        let toml = Config::example_toml();
        let cfg = dbg!(Config::from_toml(&toml)).unwrap();

        let Config {
            source_config_file,
            build,
            test,
            leak_check,
            cleanup,
        } = cfg.clone();

        assert_eq!(source_config_file, None);
        assert_eq!(build.command, vec!["make"]);
        assert_eq!(build.clean_command, vec!["make", "clean"]);
        assert_eq!(build.warning_marker, " warning: ");
        assert_eq!(test.subject, vec!["./nodemngr"]);
        assert_eq!(test.input_dir, Path::new("inputs"));
        assert_eq!(test.reference_dir, Path::new("outputs"));
        assert_eq!(test.time_limit(), Duration::from_secs(8));
        assert_eq!(leak_check.marker, "LEAK SUMMARY");
        assert_eq!(leak_check.time_limit(), None);
        assert_eq!(cleanup.process_name, None);

        assert_eq!(cfg, Config::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg = Config::from_toml(
            r#"
            [test]
            subject = ["./build/app", "--quiet"]
            timeout_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.build, BuildConfig::default());
        assert_eq!(cfg.test.input_dir, Path::new("inputs"));
        assert_eq!(cfg.test.time_limit(), Duration::from_millis(500));
        assert_eq!(cfg.sweep_process_name().as_deref(), Some("app"));
    }

    #[test]
    fn sweep_can_be_disabled_or_renamed() {
        let mut cfg = Config::default();
        assert_eq!(cfg.sweep_process_name().as_deref(), Some("nodemngr"));
        cfg.cleanup.process_name = Some("other".to_owned());
        assert_eq!(cfg.sweep_process_name().as_deref(), Some("other"));
        cfg.cleanup.sweep = false;
        assert_eq!(cfg.sweep_process_name(), None);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut cfg = Config::default();
        cfg.test.subject.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.test.timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.leak_check.launcher.clear();
        assert!(cfg.validate().is_err());
        cfg.leak_check.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_finds_file_in_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        fsutil::mkdir_all(&nested).unwrap();
        fsutil::write(
            dir.path().join(Config::FILENAME),
            "[test]\nsubject = [\"./x\"]\n",
        )
        .unwrap();

        let cfg = Config::load(&nested, None).unwrap();
        assert_eq!(cfg.test.subject, vec!["./x"]);
        assert_eq!(
            cfg.source_config_file,
            Some(dir.path().join(Config::FILENAME))
        );
    }

    #[test]
    fn to_toml_round_trips() {
        let cfg = Config::default();
        let s = cfg.to_toml().unwrap();
        assert_eq!(Config::from_toml(&s).unwrap(), cfg);
    }
}
