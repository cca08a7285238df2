//! Run summary for the console and as a JSON report

use crate::core::remap::{CacheStats, RemapSettings};
use crate::core::stats::{KindCounts, RunSummary};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

/// Everything worth keeping about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tool version
    pub version: String,
    pub elapsed_secs: f64,
    /// Files handed to the batch
    pub files: usize,
    pub fallback: bool,
    pub step_size: u64,
    pub steps: u64,
    pub summary: RunSummary,
    pub cache: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remap_log: Option<String>,
}

impl RunReport {
    pub fn new(
        files: usize,
        settings: RemapSettings,
        fallback: bool,
        summary: RunSummary,
        cache: CacheStats,
        elapsed: Duration,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            elapsed_secs: elapsed.as_secs_f64(),
            files,
            fallback,
            step_size: settings.step_size(),
            steps: settings.steps(),
            summary,
            cache,
            remap_log: None,
        }
    }

    pub fn with_remap_log(mut self, path: &Path) -> Self {
        self.remap_log = Some(path.display().to_string());
        self
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        crate::core::io::write_atomic(path.as_ref(), |w| {
            w.write_all(json.as_bytes())?;
            writeln!(w)
        })?;
        log::info!("Wrote run report to {}", path.as_ref().display());
        Ok(())
    }
}

fn kind_block(out: &mut String, plural: &str, counts: &KindCounts) {
    let _ = writeln!(out, "Total {}: {}", plural, counts.total);
    let _ = writeln!(out, "Lifted {}: {}", plural, counts.lifted);
    let _ = writeln!(out, "Remapped {}: {}", plural, counts.remapped);
    let _ = writeln!(out, "Rejected {}: {}", plural, counts.rejected);
    let _ = writeln!(out, "Unmapped {}: {}", plural, counts.unmapped);
    let _ = writeln!(out, "Fallback-searched {}: {}", plural, counts.fallback);
}

/// Aggregate counts for the console; never per-record detail
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let seg = summary.segment_files;
    if seg.succeeded + seg.failed > 0 {
        let _ = writeln!(out, "Segment files: {} processed, {} failed.", seg.succeeded, seg.failed);
    }
    let probe = summary.probe_files;
    if probe.succeeded + probe.failed > 0 {
        let _ = writeln!(out, "Probe files: {} processed, {} failed.", probe.succeeded, probe.failed);
    }
    if summary.skipped_files > 0 {
        let _ = writeln!(out, "Unknown file type: {} skipped.", summary.skipped_files);
    }
    kind_block(&mut out, "segments", &summary.segments);
    kind_block(&mut out, "probes", &summary.probes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stats::{FileCounts, RecordKind, RunStatistics};
    use tempfile::tempdir;

    #[test]
    fn test_format_summary() {
        let stats = RunStatistics::new();
        stats.file_succeeded(
            RecordKind::Segment,
            &KindCounts {
                total: 10,
                lifted: 7,
                remapped: 1,
                rejected: 1,
                unmapped: 1,
                fallback: 2,
            },
        );
        let text = format_summary(&stats.summary());
        assert!(text.starts_with("Segment files: 1 processed, 0 failed.\n"));
        assert!(!text.contains("Probe files"));
        assert!(text.contains("Lifted segments: 7\n"));
        assert!(text.contains("Remapped segments: 1\n"));
        assert!(text.contains("Fallback-searched segments: 2\n"));
        assert!(text.contains("Total probes: 0\n"));
    }

    #[test]
    fn test_json_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        let summary = RunSummary {
            probe_files: FileCounts {
                succeeded: 2,
                failed: 1,
            },
            ..Default::default()
        };
        let report = RunReport::new(
            3,
            RemapSettings::default(),
            true,
            summary,
            CacheStats::default(),
            Duration::from_millis(1500),
        )
        .with_remap_log(Path::new("logs/remapped.log"));
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["files"], 3);
        assert_eq!(value["steps"], 25);
        assert_eq!(value["summary"]["probe_files"]["failed"], 1);
        assert_eq!(value["summary"]["segments"]["fallback"], 0);
        assert_eq!(value["remap_log"], "logs/remapped.log");
        assert_eq!(value["elapsed_secs"], 1.5);
    }
}
