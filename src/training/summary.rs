//! Per-epoch loss rows appended to `<summary_dir>/<name>.csv`.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::neural::policy::TrainStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub epoch: u64,
    pub buffer_len: usize,
    pub value_mse: f64,
    pub policy_ce: f64,
    pub loss: f64,
    pub timestamp: String,
}

impl SummaryRow {
    pub fn new(epoch: u64, buffer_len: usize, stats: &TrainStats) -> Self {
        Self {
            epoch,
            buffer_len,
            value_mse: stats.value_mse,
            policy_ce: stats.policy_ce,
            loss: stats.loss,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub struct SummaryWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl SummaryWriter {
    /// Open the run's summary file for appending, writing the header if it is new.
    pub fn open(summary_dir: &Path, name: &str) -> Result<Self, csv::Error> {
        fs::create_dir_all(summary_dir)?;
        let path = summary_dir.join(format!("{}.csv", name));
        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, row: &SummaryRow) -> Result<(), csv::Error> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Read every row of a summary file.
pub fn read_summary(path: &Path) -> Result<Vec<SummaryRow>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    reader.deserialize().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(loss: f64) -> TrainStats {
        TrainStats {
            value_mse: loss / 2.0,
            policy_ce: loss / 2.0,
            loss,
        }
    }

    #[test]
    fn test_rows_are_appended_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = SummaryWriter::open(dir.path(), "run").unwrap();
            writer.write(&SummaryRow::new(1, 10, &stats(2.0))).unwrap();
        }
        let mut writer = SummaryWriter::open(dir.path(), "run").unwrap();
        writer.write(&SummaryRow::new(2, 20, &stats(1.0))).unwrap();

        let rows = read_summary(writer.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].epoch, 1);
        assert_eq!(rows[1].buffer_len, 20);
        assert_eq!(rows[1].loss, 1.0);

        let text = fs::read_to_string(writer.path()).unwrap();
        assert_eq!(text.matches("value_mse").count(), 1);
    }
}
