//! Regenerates every `<dir>/*.json` config and diffs the result against the
//! checked-in `.sol` file next to it.
//!
//! ```text
//! cargo run -p dev-test-runner -- [demos-dir] [--json]
//! ```
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use template_json::Config;

static TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").expect("trailing whitespace pattern is valid"));

/// regenerate the demo configs and diff them against the expected Solidity
#[derive(Parser, Debug)]
struct Args {
    /// directory holding `<name>.json` configs and their `<name>.sol` outputs
    #[arg(default_value = "demos")]
    dir: PathBuf,

    /// print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Pass,
    Mismatch,
    Error,
}

#[derive(Debug, Serialize)]
struct CaseReport {
    config: String,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

fn main() {
    let args = Args::parse();

    let reports = match run_dir(&args.dir) {
        Ok(reports) => reports,
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            std::process::exit(2);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(out) => println!("{out}"),
            Err(error) => eprintln!("{} {error}", "error:".red().bold()),
        }
    } else {
        for report in &reports {
            let label = match report.status {
                Status::Pass => "PASS".green(),
                Status::Mismatch => "DIFF".yellow(),
                Status::Error => "FAIL".red(),
            };
            println!("{label} {}", report.config);
            if let Some(detail) = &report.detail {
                println!("{detail}");
            }
        }
    }

    let failed = reports.iter().filter(|r| !matches!(r.status, Status::Pass)).count();
    eprintln!("{} passed, {failed} failed", reports.len() - failed);
    if failed > 0 {
        std::process::exit(1);
    }
}

fn run_dir(dir: &Path) -> Result<Vec<CaseReport>, String> {
    let pattern = format!("{}/*.json", dir.display());
    let entries = glob::glob(&pattern).map_err(|error| format!("bad pattern `{pattern}`: {error}"))?;
    let mut configs = entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| format!("failed to list {}: {error}", dir.display()))?;
    if configs.is_empty() {
        return Err(format!("no configs match `{pattern}`"));
    }
    configs.sort();
    Ok(configs.iter().map(|path| run_case(path)).collect())
}

fn run_case(path: &Path) -> CaseReport {
    let config = path.display().to_string();
    let error = |detail: String| CaseReport { config: config.clone(), status: Status::Error, detail: Some(detail) };

    let generated = match Config::load(path) {
        Ok(cfg) => match template_json::generate(&cfg) {
            Ok(src) => src,
            Err(err) => return error(err.report()),
        },
        Err(err) => return error(format!("{err}")),
    };
    let expected_path = path.with_extension("sol");
    let expected = match std::fs::read_to_string(&expected_path) {
        Ok(src) => src,
        Err(err) => return error(format!("{}: {err}", expected_path.display())),
    };

    match first_difference(&normalize(&expected), &normalize(&generated)) {
        None => CaseReport { config, status: Status::Pass, detail: None },
        Some(detail) => CaseReport { config, status: Status::Mismatch, detail: Some(detail) },
    }
}

/// Line endings and trailing whitespace are not significant.
fn normalize(src: &str) -> String {
    let src = src.replace("\r\n", "\n");
    TRAILING_WS.replace_all(src.trim_end(), "").into_owned()
}

fn first_difference(expected: &str, actual: &str) -> Option<String> {
    let mut expected_lines = expected.lines();
    let mut actual_lines = actual.lines();
    let mut line = 1;
    loop {
        match (expected_lines.next(), actual_lines.next()) {
            (None, None) => return None,
            (e, a) if e == a => line += 1,
            (e, a) => {
                return Some(format!(
                    "  line {line}\n  - {}\n  + {}",
                    e.unwrap_or("<end of file>"),
                    a.unwrap_or("<end of file>"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demos_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).parent().unwrap().join("demos")
    }

    #[test]
    fn args_default_to_demos() {
        let args = Args::try_parse_from(["dev-test-runner"]).unwrap();
        assert_eq!(args.dir, PathBuf::from("demos"));
        assert!(!args.json);

        let args = Args::try_parse_from(["dev-test-runner", "other", "--json"]).unwrap();
        assert_eq!(args.dir, PathBuf::from("other"));
        assert!(args.json);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Args::try_parse_from(["dev-test-runner", "--jsn"]).is_err());
        assert!(Args::try_parse_from(["dev-test-runner", "a", "b"]).is_err());
    }

    #[test]
    fn checked_in_demos_pass() {
        let reports = run_dir(&demos_dir()).unwrap();
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert!(matches!(report.status, Status::Pass), "{report:?}");
        }
        assert!(reports[0].config.ends_with("grid.json"));
        assert!(reports[1].config.ends_with("order.json"));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let err = run_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.contains("no configs match"), "{err}");
    }

    #[test]
    fn differences_name_the_line() {
        assert_eq!(first_difference("a\nb", "a\nb"), None);
        assert_eq!(
            first_difference("a\nb", "a\nc").as_deref(),
            Some("  line 2\n  - b\n  + c"),
        );
        assert_eq!(normalize("x  \r\ny\t\n\n"), "x\ny");
    }
}
