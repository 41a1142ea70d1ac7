//! Per-host scan engine.
//!
//! Drives repeated polls of the analysis endpoint for one hostname until the
//! service reaches a terminal state or the retry budget runs out. All
//! failure paths resolve to a [`ScanStatus`]; nothing escapes as an error.

use crate::api::{build_query, AnalyzeReport, AnalyzeTransport, ApiResponse, TransportError};
use crate::config::ScanConfig;
use crate::scanner::{pacing, ParallelBudget};

use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;
use std::time::{Duration, Instant};

/// Upper bound on overload cycles for one host. Each rate-limit observation
/// and each exhausted poll cycle consumes one, so a host under sustained
/// overload gives up instead of polling forever.
pub const MAX_OVERLOAD_RETRIES: u32 = 9;

/// Message the service returns for a hostname it cannot resolve.
const UNRESOLVABLE_MESSAGE: &str = "Unable to resolve domain name";

/// Terminal state of one host's scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// Assessment finished with at least one usable endpoint.
    Success,
    /// Retry budget exhausted, or the transport timed out.
    Timeout,
    /// Unexpected HTTP status or a network-level failure.
    WebError,
    /// Service throttled this client (HTTP 429).
    RateLimited,
    /// Service reported general overload (HTTP 529).
    Overloaded,
    /// Service is in a maintenance window (HTTP 503).
    Maintenance,
    /// Body was not a parseable report.
    ResponseError,
    /// Service-side assessment error.
    ServiceError,
    /// Service could not resolve the hostname.
    InvalidHostname,
    /// Assessment finished but no endpoint was reachable over HTTPS.
    HostError,
}

impl ScanStatus {
    pub fn is_success(self) -> bool {
        self == ScanStatus::Success
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanStatus::Success => "Success",
            ScanStatus::Timeout => "Timeout",
            ScanStatus::WebError => "WebError",
            ScanStatus::RateLimited => "RateLimited",
            ScanStatus::Overloaded => "Overloaded",
            ScanStatus::Maintenance => "Maintenance",
            ScanStatus::ResponseError => "ResponseError",
            ScanStatus::ServiceError => "ServiceError",
            ScanStatus::InvalidHostname => "InvalidHostname",
            ScanStatus::HostError => "HostError",
        };
        f.write_str(name)
    }
}

/// Terminal result of one host's scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub hostname: String,
    pub status: ScanStatus,
    /// Parsed report; present only when the service gave a definitive answer.
    pub report: Option<AnalyzeReport>,
    /// Total requests issued across all overload cycles.
    pub tries: u32,
    pub start_time: DateTime<Utc>,
    pub runtime: Duration,
}

/// What one request/response round trip resolved to.
enum AttemptOutcome {
    Terminal {
        status: ScanStatus,
        report: Option<AnalyzeReport>,
    },
    InProgress(AnalyzeReport),
    RateLimited,
}

/// Classify a single round trip. Pure; the driver loop owns all counters.
fn classify(result: Result<ApiResponse, TransportError>) -> AttemptOutcome {
    let response = match result {
        Ok(response) => response,
        Err(TransportError::Timeout) => {
            return AttemptOutcome::Terminal {
                status: ScanStatus::Timeout,
                report: None,
            }
        }
        Err(TransportError::Network(_)) => {
            return AttemptOutcome::Terminal {
                status: ScanStatus::WebError,
                report: None,
            }
        }
    };

    if !response.is_success() {
        let status = match response.status {
            429 => return AttemptOutcome::RateLimited,
            503 => ScanStatus::Maintenance,
            529 => ScanStatus::Overloaded,
            _ => ScanStatus::WebError,
        };
        return AttemptOutcome::Terminal {
            status,
            report: None,
        };
    }

    let report: AnalyzeReport = match serde_json::from_str(&response.body) {
        Ok(report) => report,
        Err(_) => {
            return AttemptOutcome::Terminal {
                status: ScanStatus::ResponseError,
                report: None,
            }
        }
    };

    if report.is_error() {
        let status = if report.status_message.as_deref() == Some(UNRESOLVABLE_MESSAGE) {
            ScanStatus::InvalidHostname
        } else {
            ScanStatus::ServiceError
        };
        return AttemptOutcome::Terminal {
            status,
            report: Some(report),
        };
    }

    if report.is_ready() {
        // READY means the assessment finished, not that it worked: a host
        // that answers ping but has no HTTPS endpoint still reaches READY.
        let status = if report.endpoints().iter().any(|e| e.is_ready()) {
            ScanStatus::Success
        } else {
            ScanStatus::HostError
        };
        return AttemptOutcome::Terminal {
            status,
            report: Some(report),
        };
    }

    AttemptOutcome::InProgress(report)
}

/// Run the scan for one hostname to completion.
///
/// Shrinks `budget` at most once, on the first rate-limit observation.
pub async fn scan_host(
    config: &ScanConfig,
    hostname: &str,
    transport: &dyn AnalyzeTransport,
    budget: &ParallelBudget,
) -> ScanOutcome {
    let start_time = Utc::now();
    let timer = Instant::now();

    tracing::info!("Scanning: {hostname}");

    let mut tries: u32 = 0;
    let mut polls_this_cycle: u32 = 0;
    let mut overload_cycles: u32 = 0;
    let mut rate_limited_last = false;
    let mut budget_shrunk = false;

    loop {
        // Cache-mode parameters like startNew must only go out once per
        // host, so only the very first request is marked as first.
        let url = build_query(config, hostname, tries == 0);
        tries += 1;

        tracing::debug!("Requesting: {url}");
        let result = transport.fetch(&url).await;
        if let Ok(response) = &result {
            tracing::trace!("Raw response for {hostname}: {}", response.body);
        }

        match classify(result) {
            AttemptOutcome::Terminal { status, report } => {
                if !status.is_success() {
                    tracing::error!("Error: {status} whilst processing {hostname}");
                }
                return ScanOutcome {
                    hostname: hostname.to_string(),
                    status,
                    report,
                    tries,
                    start_time,
                    runtime: timer.elapsed(),
                };
            }
            AttemptOutcome::RateLimited => {
                rate_limited_last = true;

                if !budget_shrunk {
                    if budget.shrink() {
                        tracing::info!(
                            "Rate limited; reducing parallel scans to {}",
                            budget.current()
                        );
                    }
                    budget_shrunk = true;
                }

                overload_cycles += 1;
                if overload_cycles >= MAX_OVERLOAD_RETRIES {
                    break;
                }

                // Other workers may be throttled at the same moment; a
                // random backoff desynchronizes the retries.
                let backoff = Duration::from_millis(rand::thread_rng().gen_range(1000..10000));
                tracing::debug!("Rate limited; pausing {hostname} for {backoff:?}");
                tokio::time::sleep(backoff).await;
            }
            AttemptOutcome::InProgress(report) => {
                rate_limited_last = false;

                polls_this_cycle += 1;
                if polls_this_cycle >= config.max_tries {
                    overload_cycles += 1;
                    polls_this_cycle = 0;
                    if overload_cycles >= MAX_OVERLOAD_RETRIES {
                        break;
                    }
                    continue;
                }

                let pause = pacing::next_pause(config, Some(&report));
                tracing::debug!("Pausing {hostname} for {pause:?}");
                tokio::time::sleep(pause).await;
            }
        }
    }

    let status = if rate_limited_last {
        ScanStatus::RateLimited
    } else {
        ScanStatus::Timeout
    };
    tracing::error!("Error: {status} whilst processing {hostname}");

    ScanOutcome {
        hostname: hostname.to_string(),
        status,
        report: None,
        tries,
        start_time,
        runtime: timer.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{http_status, in_progress, ok, ready_with_grade, ScriptedTransport};
    use crate::grade;

    async fn run_scripted(
        config: ScanConfig,
        responses: Vec<Result<ApiResponse, TransportError>>,
        budget: &ParallelBudget,
    ) -> (ScanOutcome, ScriptedTransport) {
        let transport = ScriptedTransport::new();
        transport.script("example.com", responses);
        let outcome = scan_host(&config, "example.com", &transport, budget).await;
        (outcome, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_three_attempts() {
        let budget = ParallelBudget::new(1);
        let (outcome, _) = run_scripted(
            ScanConfig::default(),
            vec![in_progress(10), in_progress(5), ready_with_grade("B")],
            &budget,
        ).await;

        assert_eq!(outcome.status, ScanStatus::Success);
        assert_eq!(outcome.tries, 3);
        let report = outcome.report.expect("success carries a report");
        assert_eq!(grade::summarize(&report), "B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_without_usable_endpoint_is_host_error() {
        let budget = ParallelBudget::new(1);
        let (outcome, _) = run_scripted(
            ScanConfig::default(),
            vec![ok(
                r#"{"status":"READY","endpoints":[{"statusMessage":"Unable to connect to the server"}]}"#,
            )],
            &budget,
        ).await;
        assert_eq!(outcome.status, ScanStatus::HostError);
        assert!(outcome.report.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_error_statuses() {
        let budget = ParallelBudget::new(1);
        let (outcome, _) = run_scripted(
            ScanConfig::default(),
            vec![ok(
                r#"{"status":"ERROR","statusMessage":"Unable to resolve domain name"}"#,
            )],
            &budget,
        ).await;
        assert_eq!(outcome.status, ScanStatus::InvalidHostname);

        let (outcome, _) = run_scripted(
            ScanConfig::default(),
            vec![ok(r#"{"status":"ERROR","statusMessage":"Certificate not valid"}"#)],
            &budget,
        ).await;
        assert_eq!(outcome.status, ScanStatus::ServiceError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_status_classification() {
        let cases = [
            (503, ScanStatus::Maintenance),
            (529, ScanStatus::Overloaded),
            (500, ScanStatus::WebError),
            (404, ScanStatus::WebError),
        ];
        for (code, expected) in cases {
            let budget = ParallelBudget::new(1);
            let (outcome, _) =
                run_scripted(ScanConfig::default(), vec![http_status(code)], &budget).await;
            assert_eq!(outcome.status, expected, "http {code}");
            assert_eq!(outcome.tries, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures() {
        let budget = ParallelBudget::new(1);
        let (outcome, _) = run_scripted(
            ScanConfig::default(),
            vec![Err(TransportError::Timeout)],
            &budget,
        ).await;
        assert_eq!(outcome.status, ScanStatus::Timeout);

        let (outcome, _) = run_scripted(
            ScanConfig::default(),
            vec![Err(TransportError::Network("connection refused".into()))],
            &budget,
        ).await;
        assert_eq!(outcome.status, ScanStatus::WebError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_body_is_response_error() {
        let budget = ParallelBudget::new(1);
        let (outcome, _) = run_scripted(
            ScanConfig::default(),
            vec![ok("<html>not json</html>")],
            &budget,
        ).await;
        assert_eq!(outcome.status, ScanStatus::ResponseError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_rate_limit_gives_up_bounded() {
        let budget = ParallelBudget::new(3);
        let (outcome, transport) =
            run_scripted(ScanConfig::default(), vec![http_status(429)], &budget).await;

        assert_eq!(outcome.status, ScanStatus::RateLimited);
        assert_eq!(outcome.tries, MAX_OVERLOAD_RETRIES);
        assert_eq!(transport.requests_made() as u32, MAX_OVERLOAD_RETRIES);
        // Shrunk exactly once despite nine observations.
        assert_eq!(budget.current(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_never_drops_below_one() {
        let budget = ParallelBudget::new(1);
        let (outcome, _) = run_scripted(
            ScanConfig::default(),
            vec![http_status(429), ready_with_grade("A")],
            &budget,
        ).await;
        assert_eq!(outcome.status, ScanStatus::Success);
        assert_eq!(budget.current(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_polls_do_not_consume_tries() {
        // One 429 then success: the poll budget is untouched by the 429.
        let config = ScanConfig {
            max_tries: 1,
            ..ScanConfig::default()
        };
        let budget = ParallelBudget::new(2);
        let (outcome, _) = run_scripted(
            config,
            vec![http_status(429), ready_with_grade("A")],
            &budget,
        ).await;
        assert_eq!(outcome.status, ScanStatus::Success);
        assert_eq!(outcome.tries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_budget_exhaustion_is_timeout() {
        let config = ScanConfig {
            max_tries: 2,
            pause_secs: 1,
            adaptive_delay: false,
            ..ScanConfig::default()
        };
        let budget = ParallelBudget::new(1);
        let (outcome, transport) = run_scripted(config, vec![in_progress(10)], &budget).await;

        assert_eq!(outcome.status, ScanStatus::Timeout);
        // max_tries polls per cycle, MAX_OVERLOAD_RETRIES cycles.
        assert_eq!(outcome.tries, 2 * MAX_OVERLOAD_RETRIES);
        assert_eq!(transport.requests_made() as u32, outcome.tries);
    }
}
