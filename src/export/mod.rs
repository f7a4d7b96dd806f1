//! Export of simulation results.
//!
//! Trajectories go to CSV, summaries and reports to JSON. Without an explicit
//! path, files land in `exports/` with a timestamped name.

mod csv_export;
mod json_export;

pub use csv_export::{export_trajectory_csv, TrajectoryCsv};
pub use json_export::{export_report_json, export_report_json_to, ReportExport};
