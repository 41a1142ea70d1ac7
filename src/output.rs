//! Result printing and report persistence.
//!
//! The scan engine hands over one outcome per host; everything user-facing
//! happens here.

use crate::api::AnalyzeReport;
use crate::config::{DetailLevel, Verbosity};
use crate::grade;

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Expand the `{hostname}` and `{date}` tokens of a filename template.
pub fn render_filename(template: &str, hostname: &str, when: DateTime<Local>) -> String {
    template
        .replace("{hostname}", hostname)
        .replace("{date}", &when.format("%Y%m%d%H%M%S").to_string())
        .trim()
        .to_string()
}

/// Write a completed report to the path the template describes.
///
/// A template naming a directory (existing, or ending in a separator) gets a
/// `<hostname>-<timestamp>.json` file inside it. Parent directories are
/// created as needed.
pub fn save_report(
    template: &str,
    hostname: &str,
    report: &AnalyzeReport,
) -> Result<PathBuf, OutputError> {
    let now = Local::now();
    let rendered = render_filename(template, hostname, now);

    let mut path = PathBuf::from(&rendered);
    if Path::new(&rendered).is_dir() || rendered.ends_with(MAIN_SEPARATOR) || rendered.ends_with('/')
    {
        fs::create_dir_all(&path)?;
        path.push(format!("{hostname}-{}.json", now.format("%Y%m%d%H%M%S")));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let serialised = serde_json::to_string_pretty(report)?;
    fs::write(&path, serialised)?;
    Ok(path)
}

/// Print one successful result to stdout.
pub fn print_result(
    verbosity: Verbosity,
    detail_level: DetailLevel,
    hostname: &str,
    report: &AnalyzeReport,
) {
    if verbosity < Verbosity::Standard {
        return;
    }

    println!("{} ({})", hostname, grade::summarize(report));

    if detail_level != DetailLevel::Score {
        match serde_json::to_string_pretty(report) {
            Ok(body) => println!("{body}"),
            Err(e) => tracing::error!("Unable to render report for {hostname}: {e}"),
        }
    }
}
