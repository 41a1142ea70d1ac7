//! Poll pacing between requests for one host.

use crate::api::AnalyzeReport;
use crate::config::ScanConfig;
use std::time::Duration;

/// No endpoint reported an ETA; assume the assessment is far from done.
const ETA_SENTINEL: i64 = 99;

/// ETAs below this are too optimistic to trust; fall back to the fixed pause
/// rather than hammering a service that thinks it is nearly finished.
const MIN_USABLE_ETA: i64 = 3;

/// Milliseconds of wait per second of reported ETA. The service's estimates
/// run long, so slightly undershooting beats oversleeping.
const ETA_SCALE_MS: i64 = 700;

/// Compute the delay before the next poll.
pub fn next_pause(config: &ScanConfig, report: Option<&AnalyzeReport>) -> Duration {
    let fixed = Duration::from_secs(config.pause_secs);

    if !config.adaptive_delay {
        return fixed;
    }
    let Some(report) = report else {
        return fixed;
    };
    if report.endpoints.is_none() {
        return fixed;
    }

    let min_eta = report
        .endpoints()
        .iter()
        .filter_map(|e| e.eta)
        .fold(ETA_SENTINEL, i64::min);

    if min_eta < MIN_USABLE_ETA {
        return fixed;
    }

    Duration::from_millis((min_eta * ETA_SCALE_MS) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with_etas(etas: &[Option<i64>]) -> AnalyzeReport {
        let endpoints: Vec<String> = etas
            .iter()
            .map(|eta| match eta {
                Some(v) => format!(r#"{{"statusMessage":"In progress","eta":{v}}}"#),
                None => r#"{"statusMessage":"In progress"}"#.to_string(),
            })
            .collect();
        serde_json::from_str(&format!(
            r#"{{"status":"IN_PROGRESS","endpoints":[{}]}}"#,
            endpoints.join(",")
        ))
        .unwrap()
    }

    #[test]
    fn test_fixed_when_adaptive_disabled() {
        let cfg = ScanConfig {
            adaptive_delay: false,
            pause_secs: 4,
            ..ScanConfig::default()
        };
        let report = report_with_etas(&[Some(50)]);
        assert_eq!(next_pause(&cfg, Some(&report)), Duration::from_millis(4000));
        assert_eq!(next_pause(&cfg, None), Duration::from_millis(4000));
    }

    #[test]
    fn test_low_eta_falls_back_to_fixed() {
        let cfg = ScanConfig::default();
        let report = report_with_etas(&[Some(2), Some(40)]);
        assert_eq!(next_pause(&cfg, Some(&report)), Duration::from_millis(4000));
    }

    #[test]
    fn test_eta_scales_sublinearly() {
        let cfg = ScanConfig::default();
        let report = report_with_etas(&[Some(10), Some(25)]);
        assert_eq!(next_pause(&cfg, Some(&report)), Duration::from_millis(7000));
    }

    #[test]
    fn test_missing_etas_use_sentinel() {
        let cfg = ScanConfig::default();
        let report = report_with_etas(&[None, None]);
        assert_eq!(
            next_pause(&cfg, Some(&report)),
            Duration::from_millis(99 * 700)
        );
    }

    #[test]
    fn test_no_endpoints_field_uses_fixed() {
        let cfg = ScanConfig::default();
        let report: AnalyzeReport = serde_json::from_str(r#"{"status":"DNS"}"#).unwrap();
        assert_eq!(next_pause(&cfg, Some(&report)), Duration::from_millis(4000));
    }
}
