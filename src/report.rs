use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::diagnostic::{Category, Location, Report};

fn relative_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl Summary {
    pub fn new(files: usize, reports: &[Report]) -> Self {
        Self {
            files,
            errors: reports.iter().filter(|r| r.is_error()).count(),
            warnings: reports
                .iter()
                .filter(|r| r.category == Category::Warning)
                .count(),
        }
    }
}

/// `path:line:col: category[code]: message`, one per line, paths relative
/// to `root`. Columns are shown 1-based.
pub fn render_human(reports: &[Report], summary: Summary, root: &Path) -> String {
    let mut out = String::new();
    for r in reports {
        let path = relative_path(&r.file, root);
        let _ = match &r.location {
            Location::Range {
                start_line,
                start_col,
                ..
            } => writeln!(
                out,
                "{path}:{start_line}:{}: {}[{}]: {}",
                start_col + 1,
                r.category,
                r.code,
                r.message
            ),
            Location::Node(_) => {
                writeln!(out, "{path}: {}[{}]: {}", r.category, r.code, r.message)
            }
        };
    }
    let _ = writeln!(
        out,
        "Checked {}: {}, {}",
        plural(summary.files, "file"),
        plural(summary.errors, "error"),
        plural(summary.warnings, "warning")
    );
    out
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    summary: Summary,
    reports: &'a [Report],
}

pub fn render_json(reports: &[Report], summary: Summary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonOutput { summary, reports })
}
