/// Matchday Hub - Logger
/// JSONL event stream (one file per UTC day) next to the tracing output

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// Like `log`, but a failed write only ends up in tracing.
    pub fn log_or_warn<T: Serialize>(&self, event: &T) {
        if let Err(e) = self.log(event) {
            tracing::warn!("JSONL write to {:?} failed: {}", self.log_dir, e);
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ───────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct UpstreamStatusEvent {
    pub ts:          String,
    pub event:       &'static str,   // "UPSTREAM_STATUS"
    pub call:        String,         // "event_list" | "summary" | "live_stats" | ...
    pub url:         String,
    pub ok:          bool,
    pub status_code: Option<u16>,
    pub message:     String,
}

#[derive(Serialize, Debug)]
pub struct AggregationCycleEvent {
    pub ts:                 String,
    pub event:              &'static str,   // "AGGREGATION_CYCLE"
    pub events_in:          usize,          // after the includeUpcoming filter
    pub events_out:         usize,          // after competition/status filters
    pub batches:            usize,
    pub calls_issued:       usize,
    pub calls_skipped:      usize,          // short-circuited, no usable id
    pub calls_failed:       usize,
    pub live_stats_enabled: bool,
    pub duration_ms:        u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_event() {
        let dir = std::env::temp_dir().join(format!("matchday-logger-{}", std::process::id()));
        let logger = EventLogger::new(&dir);
        assert_eq!(logger.log_dir(), dir.as_path());

        for ok in [true, false] {
            logger.log(&UpstreamStatusEvent {
                ts: now_iso(),
                event: "UPSTREAM_STATUS",
                call: "summary".to_string(),
                url: "http://localhost/match/1/summary".to_string(),
                ok,
                status_code: if ok { Some(200) } else { None },
                message: "test".to_string(),
            }).unwrap();
        }

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let raw = fs::read_to_string(dir.join(format!("{date}.jsonl"))).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "UPSTREAM_STATUS");
        assert_eq!(first["ok"], true);

        fs::remove_dir_all(&dir).ok();
    }
}
