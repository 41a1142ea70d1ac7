//! Scan configuration shared by the core engine.
//!
//! The CLI layer builds one `ScanConfig` per run; the engine treats it as
//! read-only. The run-time parallelism budget lives in the scanner, not here.

use clap::ValueEnum;

/// Caching strategy for the remote analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheMode {
    /// Let the service decide whether a cached report is acceptable.
    Optimised,
    /// Always accept a cached report if one is available.
    Always,
    /// Force a fresh assessment.
    Never,
}

/// Level of detail requested from the service and shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DetailLevel {
    /// Only the aggregate score.
    Score,
    /// Endpoint summaries.
    Normal,
    /// Full endpoint detail once the assessment completes.
    Detailed,
}

/// Output verbosity, ordered from silent to raw-response logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Verbosity {
    None,
    Errors,
    Standard,
    Detailed,
    Responses,
}

impl Verbosity {
    /// Directive for the tracing env-filter.
    pub fn log_filter(self) -> &'static str {
        match self {
            Verbosity::None => "off",
            Verbosity::Errors => "error",
            Verbosity::Standard => "info",
            Verbosity::Detailed => "debug",
            Verbosity::Responses => "trace",
        }
    }
}

/// Per-run settings consumed by the scan engine.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub cache_mode: CacheMode,
    /// Maximum acceptable cached report age in hours; 0 lets the server decide.
    pub max_age: u32,
    pub detail_level: DetailLevel,
    /// Publish results on the service's public boards.
    pub publish: bool,
    /// Proceed even when the certificate does not match the hostname.
    pub ignore_mismatch: bool,
    /// Polls permitted per overload cycle.
    pub max_tries: u32,
    /// Fixed pause between polls, in seconds.
    pub pause_secs: u64,
    /// Scale the poll pause from the service's reported ETA.
    pub adaptive_delay: bool,
    /// Initial parallelism budget; may shrink during the run, never below 1.
    pub max_parallel: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::Optimised,
            max_age: 23,
            detail_level: DetailLevel::Normal,
            publish: false,
            ignore_mismatch: false,
            max_tries: 60,
            pause_secs: 4,
            adaptive_delay: true,
            max_parallel: 1,
        }
    }
}
