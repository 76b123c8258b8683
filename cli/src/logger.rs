use std::io::Write as _;

use colored::Colorize;
use grader_core::style::ColorTheme;

/// Logs go to stderr so that stdout carries nothing but the report.
/// `RUST_LOG` overrides the level chosen here.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                format!("[{}]", level).color(level.color()).bold(),
                record.args()
            )
        })
        .init();
}
