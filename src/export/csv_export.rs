//! CSV export of sampled trajectories.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};
use chrono::Local;

use crate::numerics::Trajectory;

/// Row writer with a `t_h` column followed by the state fields
pub struct TrajectoryCsv {
    writer: csv::Writer<File>,
    width: usize,
    rows: usize,
    path: PathBuf,
}

impl TrajectoryCsv {
    /// Create `exports/<prefix>_YYYYMMDD_HHMMSS.csv`
    ///
    /// Creates the exports directory if it doesn't exist.
    pub fn new(prefix: &str, names: &[String]) -> Result<Self> {
        let dir = PathBuf::from("exports");
        std::fs::create_dir_all(&dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.csv", prefix, timestamp));
        Self::create(path, names)
    }

    /// Create the file at `path` and write the header
    pub fn create<P: AsRef<Path>>(path: P, names: &[String]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);

        let mut header = Vec::with_capacity(names.len() + 1);
        header.push("t_h");
        header.extend(names.iter().map(String::as_str));
        writer.write_record(&header)?;

        log::info!("CSV export started: {}", path.display());

        Ok(Self {
            writer,
            width: names.len(),
            rows: 0,
            path,
        })
    }

    /// Append one sample
    pub fn record(&mut self, t_h: f64, state: &[f64]) -> Result<()> {
        ensure!(
            state.len() == self.width,
            "state has {} fields but the header has {}",
            state.len(),
            self.width
        );
        let mut row = Vec::with_capacity(self.width + 1);
        row.push(t_h.to_string());
        row.extend(state.iter().map(|v| v.to_string()));
        self.writer.write_record(&row)?;
        self.rows += 1;
        Ok(())
    }

    /// Append every sample of a trajectory
    pub fn record_all(&mut self, trajectory: &Trajectory) -> Result<()> {
        for (t, state) in trajectory.t.iter().zip(&trajectory.states) {
            self.record(*t, state)?;
        }
        Ok(())
    }

    /// Finish writing and return the output path
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        log::info!("CSV export completed: {} ({} rows)", self.path.display(), self.rows);
        Ok(self.path)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Write a whole trajectory to `path`, or to a timestamped file in `exports/`
pub fn export_trajectory_csv(trajectory: &Trajectory, prefix: &str, path: Option<&Path>) -> Result<PathBuf> {
    let mut exporter = match path {
        Some(p) => TrajectoryCsv::create(p, &trajectory.names)?,
        None => TrajectoryCsv::new(prefix, &trajectory.names)?,
    };
    exporter.record_all(trajectory)?;
    exporter.finish()
}
