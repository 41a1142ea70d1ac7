//! Grade ranking and host-level summary.

use crate::api::AnalyzeReport;

/// Possible grades, ordered worst to best.
pub const GRADES: [&str; 8] = ["T", "F", "E", "D", "C", "B", "A", "A+"];

/// Ordinal rank of a grade letter; `None` for anything outside the table.
pub fn rank_of(letter: &str) -> Option<usize> {
    GRADES.iter().position(|g| *g == letter)
}

/// Grade letter for an ordinal rank.
pub fn letter_of(rank: usize) -> Option<&'static str> {
    GRADES.get(rank).copied()
}

/// Reduce a completed report to a single display summary.
///
/// Only endpoints the service marked `Ready` count. One distinct grade gives
/// that letter; several give a `best - worst` range; none gives an empty
/// string.
pub fn summarize(report: &AnalyzeReport) -> String {
    let mut best: Option<usize> = None;
    let mut worst: Option<usize> = None;

    for endpoint in report.endpoints() {
        if !endpoint.is_ready() {
            continue;
        }
        let Some(rank) = endpoint.grade.as_deref().and_then(rank_of) else {
            continue;
        };
        best = Some(best.map_or(rank, |b| b.max(rank)));
        worst = Some(worst.map_or(rank, |w| w.min(rank)));
    }

    match (best, worst) {
        (Some(b), Some(w)) if b == w => GRADES[b].to_string(),
        (Some(b), Some(w)) => format!("{} - {}", GRADES[b], GRADES[w]),
        _ => String::new(),
    }
}
