//! `summary.json` and `run_metadata.json`.
//!
//! The summary carries every inference and audit block with its own
//! description of meaning and limitations; the metadata file pins the
//! fully resolved configuration, selection method, candidate-scan cap,
//! seed and code version, so a run can be reproduced from the artifact
//! directory alone.

use crate::bootstrap::BootstrapResult;
use crate::inference::HacInference;
use crate::leakage::LeakageAudit;
use crate::metrics::PerformanceMetrics;
use crate::reconcile::Reconciliation;
use crate::runner::BacktestRun;
use crate::stress::StressTestResult;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use ybi_core::config::Config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub eligible_trading_days: usize,
    pub days_with_errors: usize,
    /// Entry intents dropped at fill time, by reason code.
    pub rejected_intents_by_code: BTreeMap<String, usize>,
    pub metrics: PerformanceMetrics,
    pub hac_inference: HacInference,
    pub bootstrap: BootstrapResult,
    pub leakage_audit: LeakageAudit,
    pub reconciliation: Reconciliation,
    pub stress_tests: StressBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressBlock {
    pub description: String,
    pub time_shift: StressTestResult,
    pub date_shuffle: StressTestResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub code_version: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub selection_method: String,
    pub max_candidates_to_scan: usize,
    pub random_seed: u64,
    pub config: Config,
}

impl Summary {
    pub fn from_run(run: &BacktestRun) -> Self {
        let mut rejected_intents_by_code: BTreeMap<String, usize> = BTreeMap::new();
        for rejection in &run.rejected {
            *rejected_intents_by_code
                .entry(rejection.code.as_str().to_string())
                .or_insert(0) += 1;
        }
        Self {
            start: run.start,
            end: run.end,
            eligible_trading_days: run.daily.len(),
            days_with_errors: run.days_with_errors,
            rejected_intents_by_code,
            metrics: run.metrics.clone(),
            hac_inference: run.hac.clone(),
            bootstrap: run.bootstrap.clone(),
            leakage_audit: run.leakage.clone(),
            reconciliation: run.reconciliation.clone(),
            stress_tests: StressBlock {
                description: "Perturbations of the realised P&L vector. Sensitivity \
                    probes only: they do not re-simulate entries and are not \
                    leakage controls."
                    .into(),
                time_shift: run.stress_time_shift.clone(),
                date_shuffle: run.stress_date_shuffle.clone(),
            },
        }
    }
}

impl RunMetadata {
    pub fn from_run(run: &BacktestRun) -> Self {
        Self {
            code_version: env!("CARGO_PKG_VERSION").to_string(),
            start: run.start,
            end: run.end,
            selection_method: run.config.watchlist.method.as_str().to_string(),
            max_candidates_to_scan: run.config.universe.max_candidates_to_scan,
            random_seed: run.config.inference.random_seed,
            config: run.config.clone(),
        }
    }
}

pub fn write_summary(path: &Path, summary: &Summary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("serialize summary")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn write_run_metadata(path: &Path, metadata: &RunMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata).context("serialize run metadata")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
