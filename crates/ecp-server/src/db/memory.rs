//! In-memory store implementations for pipeline and route tests

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;
use uuid::Uuid;

use crate::ingest::models::{ProcessingRun, RegionConsumption, RunStatus};

use super::{ConsumptionStore, RunStore};

#[derive(Debug, Default)]
pub struct MemConsumptionStore {
    rows: Mutex<Vec<RegionConsumption>>,
}

impl MemConsumptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<RegionConsumption>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn rows(&self) -> Vec<RegionConsumption> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConsumptionStore for MemConsumptionStore {
    async fn count_for_month(&self, month: NaiveDate) -> Result<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|r| r.month == month).count() as i64)
    }

    async fn replace_month(&self, month: NaiveDate, new_rows: &[RegionConsumption]) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.month != month);
        let deleted = (before - rows.len()) as u64;
        rows.extend_from_slice(new_rows);
        Ok(deleted)
    }

    async fn fetch_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RegionConsumption>> {
        let mut matched: Vec<RegionConsumption> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.month >= from && r.month <= to)
            .cloned()
            .collect();
        matched.sort_by(|a, b| (a.month, &a.region).cmp(&(b.month, &b.region)));
        Ok(matched)
    }

    async fn latest_month(&self) -> Result<Option<NaiveDate>> {
        Ok(self.rows.lock().unwrap().iter().map(|r| r.month).max())
    }
}

#[derive(Debug, Default)]
pub struct MemRunStore {
    runs: Mutex<Vec<ProcessingRun>>,
    /// Every status persisted via create/update, in order.
    history: Mutex<Vec<RunStatus>>,
}

impl MemRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<ProcessingRun> {
        self.runs.lock().unwrap().clone()
    }

    /// Sequence of statuses as the pipeline persisted them.
    pub fn status_history(&self) -> Vec<RunStatus> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunStore for MemRunStore {
    async fn create(&self, run: &ProcessingRun) -> Result<()> {
        self.history.lock().unwrap().push(run.status);
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn update(&self, run: &ProcessingRun) -> Result<()> {
        self.history.lock().unwrap().push(run.status);
        let mut runs = self.runs.lock().unwrap();
        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => anyhow::bail!("run {} not found", run.id),
        }
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ProcessingRun>> {
        let mut runs = self.runs.lock().unwrap().clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingRun>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }
}
