//! JSON-lines collector.
//!
//! Every record is one JSON object per line, tagged with `record` and a UTC
//! timestamp:
//!
//! ```text
//! {"record":"run_started","run_id":1700000000000,"at":"...","description":"...","parameters":{...}}
//! {"record":"outcome","run_id":...,"at":"...","outcome":{...}}
//! {"record":"iteration","run_id":...,"at":"...","iteration":1,"stats":{...}}
//! {"record":"run_ended","run_id":...,"at":"..."}
//! ```

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{CollectorError, DataCollector, RunId, RunParameters};
use crate::client::types::Outcome;
use crate::engine::stats::IterationStatistics;

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    RunStarted {
        run_id: RunId,
        at: DateTime<Utc>,
        description: &'a str,
        parameters: &'a RunParameters,
    },
    Outcome {
        run_id: RunId,
        at: DateTime<Utc>,
        outcome: &'a Outcome,
    },
    Iteration {
        run_id: RunId,
        at: DateTime<Utc>,
        iteration: u64,
        stats: &'a IterationStatistics,
    },
    RunEnded {
        run_id: RunId,
        at: DateTime<Utc>,
    },
}

/// Appends run records to a JSON-lines file.
#[derive(Debug)]
pub struct JsonlCollector {
    path: PathBuf,
    writer: BufWriter<File>,
    run_id: Option<RunId>,
}

impl JsonlCollector {
    /// Open (or create) `path` for appending.
    pub fn open(path: &Path) -> Result<Self, CollectorError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Collecting run data into {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            run_id: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, record: &Record<'_>) -> Result<(), CollectorError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn active_run(&self) -> Result<RunId, CollectorError> {
        self.run_id.ok_or(CollectorError::NoActiveRun)
    }
}

impl DataCollector for JsonlCollector {
    fn start_run(&mut self, parameters: &RunParameters, description: &str) -> Result<RunId, CollectorError> {
        let run_id = Utc::now().timestamp_millis().max(0) as RunId;
        self.run_id = Some(run_id);
        self.write(&Record::RunStarted { run_id, at: Utc::now(), description, parameters })?;
        self.writer.flush()?;
        Ok(run_id)
    }

    fn record_events(&mut self, outcome: &Outcome) -> Result<(), CollectorError> {
        let run_id = self.active_run()?;
        self.write(&Record::Outcome { run_id, at: Utc::now(), outcome })
    }

    fn record_iteration_stats(
        &mut self,
        run_id: RunId,
        iteration: u64,
        stats: &IterationStatistics,
    ) -> Result<(), CollectorError> {
        self.write(&Record::Iteration { run_id, at: Utc::now(), iteration, stats })?;
        self.writer.flush()?;
        Ok(())
    }

    fn end_run(&mut self) -> Result<(), CollectorError> {
        let run_id = self.active_run()?;
        self.write(&Record::RunEnded { run_id, at: Utc::now() })?;
        self.writer.flush()?;
        self.run_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writes_one_record_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs").join("run.jsonl");
        let mut collector = JsonlCollector::open(&path).unwrap();

        let parameters = RunParameters {
            start_time: Utc::now(),
            network_size: 2,
            batch_size: 1,
            iterations: 1,
            blocks_per_iteration: 10,
            block_time: 5,
            seed: 3,
            profiles: vec!["honest".to_string()],
            actions: vec!["ringshub_Trust".to_string()],
        };
        let run_id = collector.start_run(&parameters, "jsonl test").unwrap();
        collector.record_iteration_stats(run_id, 1, &IterationStatistics::new(1, 10)).unwrap();
        collector.end_run().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["record"], "run_started");
        assert_eq!(lines[1]["record"], "iteration");
        assert_eq!(lines[2]["record"], "run_ended");
    }

    #[test]
    fn test_outcome_before_start_is_rejected() {
        let dir = tempdir().unwrap();
        let mut collector = JsonlCollector::open(&dir.path().join("run.jsonl")).unwrap();
        assert!(matches!(collector.end_run(), Err(CollectorError::NoActiveRun)));
    }
}
