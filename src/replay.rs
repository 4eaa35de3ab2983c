//! Offline replay of recorded request traces.
//!
//! A trace is JSON lines, one request per line:
//!
//! ```text
//! {"at_ms": 0, "endpoint": "classify", "identity": "10.0.0.1"}
//! {"at_ms": 250, "endpoint": "classify", "identity": "10.0.0.1"}
//! ```
//!
//! `at_ms` is an offset from the start of the trace and must not decrease.
//! Each request is admitted against a [`ManualClock`] positioned at its offset,
//! and one JSON decision line is written per request.

use std::io::{BufRead, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::admission::{ClockSource, DenyReason, EndpointPolicyRouter, ManualClock};
use crate::error::{GatekeeperError, Result};

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraceRecord {
    /// Milliseconds since the start of the trace
    pub at_ms: u64,
    /// Endpoint the request targeted
    pub endpoint: String,
    /// Client identity
    pub identity: String,
}

/// The decision reached for one replayed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayOutcome {
    pub at_ms: u64,
    pub endpoint: String,
    pub identity: String,
    pub allowed: bool,
    pub remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

/// Totals for a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub admitted: usize,
    pub denied: usize,
}

/// Replay every request in `input` through `router`, writing outcomes to `output`.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn replay<R: BufRead, W: Write>(
    router: &EndpointPolicyRouter,
    clock: &ManualClock,
    input: R,
    mut output: W,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    let mut last_at_ms = 0;

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: TraceRecord =
            serde_json::from_str(trimmed).map_err(|e| GatekeeperError::Trace {
                line: line_no,
                reason: e.to_string(),
            })?;

        if record.at_ms < last_at_ms {
            return Err(GatekeeperError::Trace {
                line: line_no,
                reason: format!(
                    "at_ms {} is earlier than the previous request at {}",
                    record.at_ms, last_at_ms
                ),
            });
        }
        last_at_ms = record.at_ms;

        clock.set(Duration::from_millis(record.at_ms));
        let decision = router.admit(&record.endpoint, &record.identity, clock.now());

        if decision.allowed {
            summary.admitted += 1;
        } else {
            summary.denied += 1;
        }

        let outcome = ReplayOutcome {
            at_ms: record.at_ms,
            endpoint: record.endpoint,
            identity: record.identity,
            allowed: decision.allowed,
            remaining: decision.remaining,
            retry_after_ms: decision.retry_after.map(|d| d.as_millis() as u64),
            reason: decision.reason,
        };
        debug!(line = line_no, allowed = outcome.allowed, "Replayed request");

        serde_json::to_writer(&mut output, &outcome)?;
        writeln!(output)?;
    }

    output.flush()?;
    info!(
        admitted = summary.admitted,
        denied = summary.denied,
        "Replay complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::EndpointPolicy;

    fn router() -> EndpointPolicyRouter {
        EndpointPolicyRouter::permissive().with_endpoint(
            "generate-reply",
            EndpointPolicy::new(2, 60).with_blocks(60, 300),
        )
    }

    fn run(trace: &str) -> Result<(ReplaySummary, Vec<serde_json::Value>)> {
        let mut out = Vec::new();
        let summary = replay(&router(), &ManualClock::new(), trace.as_bytes(), &mut out)?;
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        Ok((summary, lines))
    }

    #[test]
    fn test_replay_blocking_scenario() {
        let trace = r#"
# two admits, an overflow, then a probe while blocked
{"at_ms": 0, "endpoint": "generate-reply", "identity": "A"}
{"at_ms": 10000, "endpoint": "generate-reply", "identity": "A"}
{"at_ms": 20000, "endpoint": "generate-reply", "identity": "A"}
{"at_ms": 65000, "endpoint": "generate-reply", "identity": "A"}
{"at_ms": 65000, "endpoint": "health", "identity": "A"}
"#;
        let (summary, lines) = run(trace).unwrap();

        assert_eq!(summary, ReplaySummary { admitted: 3, denied: 2 });
        assert_eq!(lines[1]["remaining"], 0);
        assert_eq!(lines[2]["allowed"], false);
        assert_eq!(lines[2]["retry_after_ms"], 60000);
        assert_eq!(lines[2]["reason"], "quota_exceeded");
        assert_eq!(lines[3]["retry_after_ms"], 15000);
        assert_eq!(lines[3]["reason"], "blocked");
        assert_eq!(lines[4]["allowed"], true);
        assert!(lines[4].get("reason").is_none());
    }

    #[test]
    fn test_replay_rejects_time_travel() {
        let trace = r#"{"at_ms": 500, "endpoint": "x", "identity": "A"}
{"at_ms": 100, "endpoint": "x", "identity": "A"}"#;

        match run(trace) {
            Err(GatekeeperError::Trace { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected trace error, got {:?}", other.map(|(s, _)| s)),
        }
    }

    #[test]
    fn test_replay_rejects_malformed_line() {
        let trace = "{\"at_ms\": 0, \"endpoint\": \"x\"}\n";
        assert!(matches!(run(trace), Err(GatekeeperError::Trace { line: 1, .. })));
    }
}
