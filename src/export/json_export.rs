//! JSON export of reports and summaries.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use serde::Serialize;

/// Report wrapped with export metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportExport<'a, T: Serialize> {
    /// Export timestamp (RFC 3339)
    pub exported_at: String,
    /// Export version for compatibility
    pub version: &'static str,
    pub report: &'a T,
}

impl<'a, T: Serialize> ReportExport<'a, T> {
    fn now(report: &'a T) -> Self {
        Self {
            exported_at: Local::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            report,
        }
    }
}

/// Export a report to `exports/<prefix>_YYYYMMDD_HHMMSS.json`
///
/// Creates the exports directory if it doesn't exist and returns the path.
pub fn export_report_json<T: Serialize>(report: &T, prefix: &str) -> Result<PathBuf> {
    let dir = PathBuf::from("exports");
    std::fs::create_dir_all(&dir)?;

    let timestamp = Local::now();
    let path = dir.join(format!("{}_{}.json", prefix, timestamp.format("%Y%m%d_%H%M%S")));
    export_report_json_to(report, &path)?;
    Ok(path)
}

/// Export a report to a specific file
pub fn export_report_json_to<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &ReportExport::now(report))?;
    log::info!("JSON report exported: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pk::{assess_risk, ToxicityThresholds};

    #[test]
    fn test_report_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.json");
        let report = assess_risk(&[50.0, 150.0], &[0.0, 1.0], &ToxicityThresholds::default()).unwrap();

        export_report_json_to(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["exported_at"].is_string());
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["report"]["max_plasma_uM"], 150.0);
        assert_eq!(value["report"]["flag_caution"], true);
    }
}
