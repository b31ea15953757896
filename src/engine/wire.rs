//! Wire records and the record parser
//!
//! One record per line, encoded as JSON with a `type` tag. Parsing is pure
//! and total: the same text always yields the same result. A line that
//! fails structural validation is reported by the caller through the
//! diagnostic side channel and never halts the pipeline.

use serde::{Deserialize, Serialize};

/// Which side of the backend process produced a line record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// The unit decoded from the experiment stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireRecord {
    /// One line of process output
    Line(LineRecord),
    /// Terminal summary, emitted at most once, always last
    Summary(SummaryRecord),
}

/// A single line of process output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    /// Output stream the line came from
    pub stream: StreamKind,
    /// Wall-clock timestamp string (ISO-8601, kept verbatim)
    pub timestamp: String,
    /// Unprocessed text
    #[serde(default)]
    pub raw: String,
    /// Display text; may equal `raw`, may be absent
    #[serde(default)]
    pub plain: String,
}

impl LineRecord {
    /// Display text for this line: `plain` when present, `raw` otherwise
    pub fn text(&self) -> &str {
        if self.plain.is_empty() {
            &self.raw
        } else {
            &self.plain
        }
    }
}

/// Terminal summary for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Wall-clock timestamp string (ISO-8601, kept verbatim)
    pub timestamp: String,
    /// Process exit code; zero means success
    pub exit_code: i32,
    /// Total run duration in seconds
    pub duration_seconds: f64,
}

/// Parse one text line into a [`WireRecord`]
pub fn parse_record(line: &str) -> serde_json::Result<WireRecord> {
    serde_json::from_str(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_record() {
        let record = parse_record(
            r#"{"type":"line","stream":"stdout","timestamp":"2024-05-01T10:00:00","raw":"hello","plain":"hello"}"#,
        )
        .unwrap();

        match record {
            WireRecord::Line(line) => {
                assert_eq!(line.stream, StreamKind::Stdout);
                assert_eq!(line.text(), "hello");
            }
            other => panic!("expected line record, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_summary_record() {
        let record = parse_record(
            r#"{"type":"summary","timestamp":"2024-05-01T10:00:05","exit_code":0,"duration_seconds":5.25}"#,
        )
        .unwrap();

        match record {
            WireRecord::Summary(summary) => {
                assert_eq!(summary.exit_code, 0);
                assert!((summary.duration_seconds - 5.25).abs() < f64::EPSILON);
            }
            other => panic!("expected summary record, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_text_fields_default_to_empty() {
        let record = parse_record(
            r#"{"type":"line","stream":"stderr","timestamp":"2024-05-01T10:00:00"}"#,
        )
        .unwrap();

        match record {
            WireRecord::Line(line) => {
                assert_eq!(line.text(), "");
                assert_eq!(line.stream, StreamKind::Stderr);
            }
            other => panic!("expected line record, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_falls_back_to_raw() {
        let record = parse_record(
            r#"{"type":"line","stream":"stdout","timestamp":"T","raw":"only raw"}"#,
        )
        .unwrap();
        match record {
            WireRecord::Line(line) => assert_eq!(line.text(), "only raw"),
            other => panic!("expected line record, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_is_total_on_garbage() {
        assert!(parse_record("not-json").is_err());
        assert!(parse_record(r#"{"type":"mystery"}"#).is_err());
        // Same input, same failure: parsing is pure.
        let a = parse_record("not-json").unwrap_err().to_string();
        let b = parse_record("not-json").unwrap_err().to_string();
        assert_eq!(a, b);
    }
}
