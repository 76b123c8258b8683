use std::collections::BTreeMap;

use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::testing::{FailReason, TestOutcome, Verdict};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    std::env::var("COLORTERM").map_or(false, |v| matches!(v.as_str(), "truecolor" | "24bit"))
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        match self {
            log::Level::Error => Color::Red,
            log::Level::Warn => Color::Yellow,
            log::Level::Info => Color::Green,
            log::Level::Debug | log::Level::Trace => Color::BrightBlack,
        }
    }
}

impl ColorTheme for Verdict {
    fn color(&self) -> Color {
        use Verdict::*;
        if !self::is_truecolor_supported() {
            return match self {
                PassClean => Color::Green,
                Pass => Color::Cyan,
                Fail => Color::Red,
                NotRun => Color::BrightBlack,
                Recorded => Color::Blue,
            };
        }

        match self {
            PassClean => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            Pass => Color::TrueColor {
                r: 40,
                g: 140,
                b: 190,
            },
            Fail => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
            NotRun => Color::TrueColor {
                r: 110,
                g: 110,
                b: 110,
            },
            Recorded => Color::TrueColor {
                r: 90,
                g: 90,
                b: 200,
            },
        }
    }
}

pub fn verdict_icon(verdict: Verdict) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {:<3} ", verdict.to_string())
        .on_color(verdict.color())
        .bold()
        .color(fg)
}

/// One-word label for why a testcase failed.
pub fn fail_reason_label(reason: &FailReason) -> String {
    match reason {
        FailReason::WrongOutput => "wrong output".to_owned(),
        FailReason::TimedOut => "timed out".to_owned(),
        FailReason::Crashed { signal } => format!("crashed (signal {})", signal),
        FailReason::Infrastructure(_) => "harness error".to_owned(),
    }
}

pub fn print_test_result_summary(results: &[TestOutcome]) {
    let bar = "-".repeat(5);
    eprint!("{} ", bar);

    let count: BTreeMap<String, usize> = results
        .iter()
        .filter_map(|r| r.fail_reason.as_ref())
        .fold(BTreeMap::new(), |mut count, reason| {
            *count.entry(fail_reason_label(reason)).or_default() += 1;
            count
        });

    let num_total_test = results.len();
    let num_clean = results
        .iter()
        .filter(|r| r.verdict == Verdict::PassClean)
        .count();
    let num_passed = results.iter().filter(|r| r.verdict.is_pass()).count();
    let num_failed = num_total_test - num_passed;

    if num_total_test == 0 {
        eprint!("{}", "No testcases ran".bright_black());
    } else if num_failed == 0 {
        let msg = format!(
            "All {} tests passed ({} leak-free)",
            num_total_test, num_clean
        );
        eprint!("{}", msg.green());
    } else {
        let summary_msg = if num_passed > 0 {
            format!("{}/{} tests failed", num_failed, num_total_test)
        } else {
            format!("All {} tests failed", num_total_test)
        };

        let detail_msg = count
            .iter()
            .map(|(label, &cnt)| {
                format!(
                    "{}{}{}",
                    label.red(),
                    " x".dimmed(),
                    cnt.to_string().bold().bright_white(),
                )
            })
            .collect::<Vec<String>>()
            .join(", ");

        eprint!("{} ({})", summary_msg.bright_red(), detail_msg);
    }

    eprintln!(" {}", bar);
}

/// Shows expected and actual output one above the other, marking
/// trailing whitespace and a missing final newline.
pub fn print_mismatch_detail(testcase_name: &str, expected: &[u8], actual: &[u8]) {
    let expected = String::from_utf8_lossy(expected);
    let actual = String::from_utf8_lossy(actual);
    let expected_lines: Vec<_> = expected.lines().collect();
    let actual_lines: Vec<_> = actual.lines().collect();

    let (cols, _) = terminal::size().unwrap_or((40, 40));
    let cols = (cols as usize).max(20);

    const BOLD_LINE: &str = "━";
    const THIN_LINE: &str = "─";

    let bold_bar = BOLD_LINE.repeat(cols).blue().bold();

    eprintln!(
        "\n{}: {}\n{}",
        testcase_name.color(Color::BrightYellow).bold(),
        self::verdict_icon(Verdict::Fail),
        bold_bar,
    );

    fn print_sub_title(s: &str, cols: usize) {
        eprintln!(
            "{}{}",
            s.cyan().bold(),
            THIN_LINE
                .repeat(cols.saturating_sub(s.len() + 1))
                .bright_black(),
        )
    }

    fn print_lines(lines: &[&str], entire_str: &str) {
        if lines.is_empty() {
            eprintln!("{}", "<EMPTY>".magenta().dimmed());
            return;
        }
        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim_end();
            eprint!("{}", trimmed);

            let num_trailling_whitespace = line.len() - trimmed.len();
            if num_trailling_whitespace > 0 {
                eprint!(
                    "{}{}",
                    " ".repeat(num_trailling_whitespace).on_red(),
                    "(Trailling whitespace)".bright_red().bold()
                );
            }

            let is_last_line = i + 1 == lines.len();
            if is_last_line && !entire_str.ends_with('\n') {
                eprint!("{}", " Missing new line ".on_yellow().black().bold());
            }

            eprintln!();
        }
    }

    print_sub_title("[expected]", cols);
    print_lines(&expected_lines, &expected);

    print_sub_title("[actual]", cols);
    print_lines(&actual_lines, &actual);

    eprintln!("{}", bold_bar);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verdict_icon_pads_label() {
        assert_eq!(&*verdict_icon(Verdict::Fail), " NG  ");
        assert_eq!(&*verdict_icon(Verdict::Recorded), " REC ");
        assert_eq!(&*verdict_icon(Verdict::PassClean), " OK+ ");
    }

    #[test]
    fn fail_reason_labels() {
        assert_eq!(fail_reason_label(&FailReason::TimedOut), "timed out");
        assert_eq!(
            fail_reason_label(&FailReason::Crashed { signal: 11 }),
            "crashed (signal 11)"
        );
        assert_eq!(log::Level::Trace.color(), log::Level::Debug.color());
    }
}
