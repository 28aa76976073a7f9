//! Owl Esports logger
//! JSONL audit stream: refresh cycles and predictions

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// Like `log`, but a failed write only shows up in debug output.
    pub fn log_quiet<T: Serialize>(&self, event: &T) {
        if let Err(e) = self.log(event) {
            tracing::debug!("audit log write failed: {e}");
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ────────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct RefreshCompletedEvent {
    pub ts:              String,
    pub event:           &'static str,   // "REFRESH_COMPLETED"
    pub heroes:          usize,
    pub counter_sources: usize,          // heroes whose counters page loaded
    pub failed_heroes:   Vec<String>,
    pub side_winrates:   usize,
    pub elapsed_ms:      u64,
}

#[derive(Serialize, Debug)]
pub struct RefreshFailedEvent {
    pub ts:      String,
    pub event:   &'static str,           // "REFRESH_FAILED"
    pub message: String,
}

#[derive(Serialize, Debug)]
pub struct PredictionEvent {
    pub ts:            String,
    pub event:         &'static str,     // "PREDICTION"
    pub source:        &'static str,     // "names" | "match_url"
    pub radiant:       Vec<String>,
    pub dire:          Vec<String>,
    pub radiant_score: f64,
    pub dire_score:    f64,
    pub match_id:      Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let logger = EventLogger::new(dir.path());

        for msg in ["first", "second"] {
            logger
                .log(&RefreshFailedEvent {
                    ts: now_iso(),
                    event: "REFRESH_FAILED",
                    message: msg.to_string(),
                })
                .unwrap();
        }

        let mut body = String::new();
        for entry in fs::read_dir(dir.path()).unwrap() {
            body.push_str(&fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        let lines: Vec<serde_json::Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "REFRESH_FAILED");
        assert_eq!(lines[1]["message"], "second");
    }
}
