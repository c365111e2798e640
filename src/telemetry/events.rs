//! Tagged source events for recorded or bridged monitoring streams.
//!
//! A recorded session is a JSONL file with one [`SourceEvent`] per line. The
//! presenter applies each event through the same entry points a live source
//! would call.

#![allow(missing_docs)]

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::core::errors::{NetpanelError, Result};
use crate::telemetry::samples::{ConnectivitySample, ProcessSample, UsageSample};

/// One inbound event: a sample from one of the three streams or a control action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceEvent {
    Usage(UsageSample),
    Connectivity {
        #[serde(default)]
        sample: Option<ConnectivitySample>,
    },
    Processes {
        #[serde(default)]
        rows: Vec<ProcessSample>,
    },
    Visibility {
        visible: bool,
    },
    Reset,
}

/// Requests the presenter forwards to the monitoring source without interpreting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRequest {
    RefreshPublicIp,
}

/// Parse a JSONL event stream. Blank lines and `#` comments are skipped.
///
/// Fails on the first malformed line, reporting its 1-based line number.
pub fn read_events(reader: impl BufRead) -> Result<Vec<SourceEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| NetpanelError::Io {
            path: "<event stream>".into(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|e| NetpanelError::Serialization {
            context: "source event",
            details: format!("line {}: {e}", idx + 1),
        })?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_stream() {
        let raw = r#"
# hidden start
{"kind":"visibility","visible":false}
{"kind":"usage","upload_bytes_per_sec":2048,"link_up":true}
{"kind":"connectivity"}
{"kind":"connectivity","sample":{"reachable":true,"latency_ms":12.5}}
{"kind":"processes","rows":[{"pid":1,"name":"curl","download_bytes_per_sec":10}]}
{"kind":"reset"}
"#;
        let events = read_events(raw.as_bytes()).unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(events[0], SourceEvent::Visibility { visible: false });
        assert!(matches!(&events[1], SourceEvent::Usage(s) if s.upload_bytes_per_sec == 2048));
        assert_eq!(events[2], SourceEvent::Connectivity { sample: None });
        assert!(matches!(&events[4], SourceEvent::Processes { rows } if rows.len() == 1));
        assert_eq!(events[5], SourceEvent::Reset);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let raw = "{\"kind\":\"reset\"}\n{\"kind\":\"bogus\"}\n";
        let err = read_events(raw.as_bytes()).unwrap_err();
        assert_eq!(err.code(), "NP-2101");
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
