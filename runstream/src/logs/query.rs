//! Query parameters for `GET v1/runs/{id}/logs`.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;

/// Throwaway base the query is serialized against; only its query is kept.
const QUERY_BASE: &str = "http://localhost/";

/// Options for a log request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// Prefix each printed line with its timestamp.
    pub timestamps: bool,
    /// Only the last N lines; `None` for all.
    pub tail_lines: Option<u64>,
    /// Only lines at or after this cursor (RFC3339 with nanoseconds).
    pub since: Option<String>,
    /// Keep the stream open for new lines.
    pub follow: bool,
}

impl LogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Negative values mean "all lines".
    pub fn with_tail_lines(mut self, tail_lines: i64) -> Self {
        self.tail_lines = u64::try_from(tail_lines).ok();
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(format_cursor(since));
        self
    }

    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Query string for the request. Following always requests timestamps,
    /// since they carry the resume cursor.
    pub fn to_query_string(&self) -> String {
        let Ok(mut url) = Url::parse(QUERY_BASE) else {
            return String::new();
        };
        {
            let mut pairs = url.query_pairs_mut();
            if self.follow || self.timestamps {
                pairs.append_pair("timestamps", "true");
            }
            if let Some(n) = self.tail_lines {
                pairs.append_pair("tailLines", &n.to_string());
            }
            if let Some(ref since) = self.since {
                pairs.append_pair("since", since);
            }
            if self.follow {
                pairs.append_pair("follow", "true");
            }
        }
        url.query().unwrap_or_default().to_string()
    }

    /// Path of the log request for `run_id`.
    pub fn path(&self, run_id: i64) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            format!("v1/runs/{}/logs", run_id)
        } else {
            format!("v1/runs/{}/logs?{}", run_id, query)
        }
    }

    /// The query for a reconnect that resumes at `cursor`.
    pub(crate) fn resume_from(&self, cursor: &str) -> Self {
        Self {
            since: Some(cursor.to_string()),
            tail_lines: None,
            ..self.clone()
        }
    }
}

/// Format a timestamp the way log cursors are written.
pub fn format_cursor(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
