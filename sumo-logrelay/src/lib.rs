//! Streams a running workload's logs as a sequence of discrete events,
//! following a pod from "not scheduled yet" through tailing to its
//! terminal phase.
//!
//! `relay` is a generator function in the `async-stream` idiom: it returns
//! a plain `futures::Stream` rather than holding a connection open itself,
//! so the HTTP surface can adapt it straight into an SSE response and drop
//! it the moment the client disconnects.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use sumo_orchestrator::OrchestratorPort;

const TAIL_LINES: i64 = 1000;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POD_WAIT: Duration = Duration::from_secs(2);
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// One SSE payload. Serializes untagged, so each variant produces exactly
/// the JSON shape its fields describe.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LogEvent {
    Message { message: String },
    Pod { pod: String, phase: Option<String>, message: String },
    Status { status: String, message: String },
    Error { error: String },
}

fn is_terminal_phase(phase: Option<&str>) -> bool {
    matches!(phase, Some("Succeeded") | Some("Failed"))
}

fn emit_new_lines(full_log: &str, already_delivered: usize) -> (Vec<String>, usize) {
    let lines: Vec<&str> = full_log.split('\n').collect();
    let start = already_delivered.min(lines.len());
    let fresh = lines[start..]
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.to_string())
        .collect();
    (fresh, lines.len())
}

/// `FIND_POD -> WAIT_POD -> TAILING -> COLLECT_FINAL -> DONE`. See the
/// module docs; this is the generator driving that state machine.
pub fn relay(port: Arc<dyn OrchestratorPort>, namespace: String, workload_name: String) -> impl Stream<Item = LogEvent> {
    async_stream::stream! {
        if !port.is_available() {
            yield LogEvent::Error { error: "orchestrator unavailable".to_string() };
            return;
        }

        let selector = format!("job-name={workload_name}");

        // FIND_POD
        let mut pods = match port.list_pods(&namespace, &selector).await {
            Ok(p) => p,
            Err(e) => {
                yield LogEvent::Error { error: e.to_string() };
                return;
            }
        };

        if pods.is_empty() {
            // WAIT_POD
            yield LogEvent::Message { message: "No pod found yet. Waiting...".to_string() };
            tokio::time::sleep(POD_WAIT).await;
            pods = match port.list_pods(&namespace, &selector).await {
                Ok(p) => p,
                Err(e) => {
                    yield LogEvent::Error { error: e.to_string() };
                    return;
                }
            };
            if pods.is_empty() {
                yield LogEvent::Error { error: "pod not found".to_string() };
                return;
            }
        }

        let pod_name = pods[0].name.clone();
        yield LogEvent::Pod {
            pod: pod_name.clone(),
            phase: pods[0].phase.clone(),
            message: "Starting log stream...".to_string(),
        };

        // TAILING
        let mut delivered = 0usize;
        let mut consecutive_errors = 0u32;

        loop {
            match port.read_pod_log(&namespace, &pod_name, Some(TAIL_LINES)).await {
                Ok(logs) => {
                    consecutive_errors = 0;
                    let (fresh, new_delivered) = emit_new_lines(&logs, delivered);
                    delivered = new_delivered;
                    for message in fresh {
                        yield LogEvent::Message { message };
                    }

                    match port.list_pods(&namespace, &selector).await {
                        Ok(refreshed) if refreshed.is_empty() => {
                            yield LogEvent::Message { message: "Pod has terminated".to_string() };
                            return;
                        }
                        Ok(refreshed) => {
                            let phase = refreshed[0].phase.clone();
                            if is_terminal_phase(phase.as_deref()) {
                                // COLLECT_FINAL
                                if let Ok(final_logs) = port.read_pod_log(&namespace, &pod_name, None).await {
                                    let (fresh, _) = emit_new_lines(&final_logs, delivered);
                                    for message in fresh {
                                        yield LogEvent::Message { message };
                                    }
                                }
                                let status = phase.unwrap_or_default();
                                yield LogEvent::Status {
                                    message: format!("Job {}", status.to_lowercase()),
                                    status,
                                };
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(namespace = %namespace, pod = %pod_name, error = %e, "logrelay: could not re-list pod during tailing");
                        }
                    }

                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        yield LogEvent::Error { error: format!("too many errors: {e}") };
                        return;
                    }
                    tokio::time::sleep(POD_WAIT).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_dropped_and_offset_tracks_total_line_count() {
        let (fresh, delivered) = emit_new_lines("a\n\nb\n", 0);
        assert_eq!(fresh, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(delivered, 4);
    }

    #[test]
    fn only_lines_past_the_previous_offset_are_emitted() {
        let (fresh, delivered) = emit_new_lines("a\nb\nc\n", 2);
        assert_eq!(fresh, vec!["c".to_string()]);
        assert_eq!(delivered, 4);
    }

    #[test]
    fn offset_past_the_log_length_emits_nothing() {
        let (fresh, delivered) = emit_new_lines("a\n", 10);
        assert!(fresh.is_empty());
        assert_eq!(delivered, 2);
    }

    #[test]
    fn terminal_phase_matching() {
        assert!(is_terminal_phase(Some("Succeeded")));
        assert!(is_terminal_phase(Some("Failed")));
        assert!(!is_terminal_phase(Some("Running")));
        assert!(!is_terminal_phase(None));
    }

    #[tokio::test]
    async fn pod_not_found_emits_a_single_error_event_and_closes() {
        use futures::StreamExt;
        use sumo_orchestrator::fake::FakeOrchestrator;

        let port = Arc::new(FakeOrchestrator::new());
        let events: Vec<LogEvent> = relay(port, "acme".to_string(), "sim-12345678".to_string()).collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LogEvent::Message { .. }));
        assert!(matches!(events[1], LogEvent::Error { .. }));
    }
}
