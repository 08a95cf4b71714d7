//! Persistence contract for driver jobs and fueling records.
//!
//! The workflow never owns storage: it reads a full job, mutates a local
//! copy and writes the full job back (last-write-wins). Two
//! implementations are provided — an in-memory store for tests and the
//! demo, and a whole-file JSON store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TankflowError;
use crate::workflow::{DriverJob, FuelingRecord, JobStatus, OrderType};

/// External job source and sinks. `update_job` is assumed atomic per
/// call; there is no partial-update protocol.
pub trait JobStore {
    /// All internal jobs not yet delivered, newest first.
    fn pending_internal_jobs(&self) -> Result<Vec<DriverJob>, TankflowError>;

    /// Fetch one job by id.
    fn job(&self, job_id: &str) -> Result<DriverJob, TankflowError>;

    /// Replace the stored record for `job_id` with `job`.
    fn update_job(&mut self, job_id: &str, job: &DriverJob) -> Result<(), TankflowError>;

    /// Append one fueling record for `job_id`. Records are never mutated.
    fn add_fueling_record(
        &mut self,
        job_id: &str,
        record: &FuelingRecord,
    ) -> Result<(), TankflowError>;

    /// Fueling records appended so far for `job_id`, in append order.
    fn fueling_records(&self, job_id: &str) -> Result<Vec<FuelingRecord>, TankflowError>;
}

fn sort_pending(jobs: &mut Vec<DriverJob>) {
    jobs.retain(|j| j.order_type == OrderType::Internal && j.status != JobStatus::Delivered);
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: HashMap<String, DriverJob>,
    fueling: HashMap<String, Vec<FuelingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a job. Creation itself is out of workflow scope, so this is
    /// the only way records enter the store.
    pub fn insert_job(&mut self, job: DriverJob) {
        self.jobs.insert(job.id.clone(), job);
    }
}

impl JobStore for MemoryStore {
    fn pending_internal_jobs(&self) -> Result<Vec<DriverJob>, TankflowError> {
        let mut jobs: Vec<DriverJob> = self.jobs.values().cloned().collect();
        sort_pending(&mut jobs);
        Ok(jobs)
    }

    fn job(&self, job_id: &str) -> Result<DriverJob, TankflowError> {
        self.jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| TankflowError::JobNotFound(job_id.to_string()))
    }

    fn update_job(&mut self, job_id: &str, job: &DriverJob) -> Result<(), TankflowError> {
        if !self.jobs.contains_key(job_id) {
            return Err(TankflowError::JobNotFound(job_id.to_string()));
        }
        self.jobs.insert(job_id.to_string(), job.clone());
        Ok(())
    }

    fn add_fueling_record(
        &mut self,
        job_id: &str,
        record: &FuelingRecord,
    ) -> Result<(), TankflowError> {
        if !self.jobs.contains_key(job_id) {
            return Err(TankflowError::JobNotFound(job_id.to_string()));
        }
        self.fueling
            .entry(job_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn fueling_records(&self, job_id: &str) -> Result<Vec<FuelingRecord>, TankflowError> {
        Ok(self.fueling.get(job_id).cloned().unwrap_or_default())
    }
}

/// On-disk layout of the JSON file store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    jobs: HashMap<String, DriverJob>,
    #[serde(default)]
    fueling: HashMap<String, Vec<FuelingRecord>>,
}

/// Whole-file JSON store: every operation reads the file, applies the
/// change and writes the file back. Matches the optimistic full-record
/// update discipline of the workflow itself.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open a store at `path`. A missing file behaves as an empty store
    /// and is created on the first write.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<StoreFile, TankflowError> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, file: &StoreFile) -> Result<(), TankflowError> {
        let json = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Seed a job, mirroring [`MemoryStore::insert_job`].
    pub fn insert_job(&mut self, job: DriverJob) -> Result<(), TankflowError> {
        let mut file = self.load()?;
        file.jobs.insert(job.id.clone(), job);
        self.save(&file)
    }
}

impl JobStore for JsonFileStore {
    fn pending_internal_jobs(&self) -> Result<Vec<DriverJob>, TankflowError> {
        let file = self.load()?;
        let mut jobs: Vec<DriverJob> = file.jobs.into_values().collect();
        sort_pending(&mut jobs);
        Ok(jobs)
    }

    fn job(&self, job_id: &str) -> Result<DriverJob, TankflowError> {
        self.load()?
            .jobs
            .remove(job_id)
            .ok_or_else(|| TankflowError::JobNotFound(job_id.to_string()))
    }

    fn update_job(&mut self, job_id: &str, job: &DriverJob) -> Result<(), TankflowError> {
        let mut file = self.load()?;
        if !file.jobs.contains_key(job_id) {
            return Err(TankflowError::JobNotFound(job_id.to_string()));
        }
        file.jobs.insert(job_id.to_string(), job.clone());
        self.save(&file)
    }

    fn add_fueling_record(
        &mut self,
        job_id: &str,
        record: &FuelingRecord,
    ) -> Result<(), TankflowError> {
        let mut file = self.load()?;
        if !file.jobs.contains_key(job_id) {
            return Err(TankflowError::JobNotFound(job_id.to_string()));
        }
        file.fueling
            .entry(job_id.to_string())
            .or_default()
            .push(record.clone());
        self.save(&file)
    }

    fn fueling_records(&self, job_id: &str) -> Result<Vec<FuelingRecord>, TankflowError> {
        Ok(self.load()?.fueling.get(job_id).cloned().unwrap_or_default())
    }
}
