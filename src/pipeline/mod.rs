//! The daily run: extract → validate → stage → load
//!
//! Steps run strictly in order and hand typed results to each other:
//! [`RunManifest`] → [`ValidatedRun`] → `Vec<StagedFile>` → `Vec<LoadReport>`.
//! A step whose error is retryable gets a bounded number of extra attempts
//! after a fixed delay; anything else fails the run with the step name and
//! error kind attached.

use chrono::NaiveDate;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info};

pub mod extract;
pub mod load;
pub mod partition;
pub mod stage;
pub mod validate;

pub use partition::{ManifestFile, RunLock, RunManifest, RunPartition};
pub use validate::{ValidatedFile, ValidatedRun};

use crate::config::Config;
use crate::data_fetcher::StatsApi;
use crate::error::AppError;
use crate::retry::RetryPolicy;
use crate::warehouse::{LoadReport, StagedFile, Warehouse};

/// Pipeline steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Step {
    Extract,
    Validate,
    Stage,
    Load,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Extract, Step::Validate, Step::Stage, Step::Load];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Extract => "extract",
            Step::Validate => "validate",
            Step::Stage => "stage",
            Step::Load => "load",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub manifest: RunManifest,
    pub staged: Vec<StagedFile>,
    pub loads: Vec<LoadReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn rows_loaded(&self) -> usize {
        self.loads.iter().map(|r| r.rows_loaded).sum()
    }
}

/// Runs the steps for one date at a time against one warehouse.
pub struct Pipeline<W: Warehouse> {
    config: Config,
    api: StatsApi,
    warehouse: W,
    step_policy: RetryPolicy,
}

impl<W: Warehouse> Pipeline<W> {
    pub fn new(config: Config, api: StatsApi, warehouse: W) -> Self {
        let step_policy = RetryPolicy::fixed(
            config.pipeline.step_retries.saturating_add(1),
            Duration::from_secs(config.pipeline.step_retry_delay_seconds),
        );
        Pipeline {
            config,
            api,
            warehouse,
            step_policy,
        }
    }

    /// Overrides the per-step retry budget.
    pub fn with_step_policy(mut self, policy: RetryPolicy) -> Self {
        self.step_policy = policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Runs every step from `from` onwards for `run_date`.
    ///
    /// Steps before `from` are not executed; their output is picked up from
    /// the partition directory and the staging area. Only one run per date
    /// may be active at a time.
    pub async fn run(&self, run_date: NaiveDate, from: Step) -> Result<RunSummary, AppError> {
        let started = Instant::now();
        let partition = RunPartition::new(&self.config.data_dir, run_date);
        partition.ensure_dir().await?;
        let _lock = RunLock::acquire(
            &partition,
            Duration::from_secs(self.config.pipeline.lock_stale_after_seconds),
        )?;

        info!(
            "Starting run for {} (team {}, season {}) from step '{}'",
            run_date, self.config.team_id, self.config.season, from
        );

        let manifest = if from <= Step::Extract {
            self.step(Step::Extract, || {
                extract::extract(&self.api, &self.config, &partition)
            })
            .await?
        } else {
            RunManifest::read(&partition)
                .await
                .map_err(|e| AppError::step_failed(from.name(), e))?
        };

        let validated = if from <= Step::Validate {
            self.step(Step::Validate, || {
                validate::validate(&self.config, &partition, &manifest)
            })
            .await?
        } else {
            ValidatedRun::from_manifest(&partition, manifest.clone())
        };

        let staged = if from <= Step::Stage {
            self.step(Step::Stage, || stage::stage(&self.warehouse, &validated))
                .await?
        } else {
            // Lookup only, outside the step retry policy
            stage::previously_staged(&self.warehouse, &validated)
                .await
                .map_err(|e| AppError::step_failed(Step::Load.name(), e))?
        };

        let loads = self
            .step(Step::Load, || load::load(&self.warehouse, &staged))
            .await?;

        let summary = RunSummary {
            run_date,
            manifest,
            staged,
            loads,
            elapsed: started.elapsed(),
        };
        info!(
            "Run for {} finished in {:.1}s: {} rows loaded",
            run_date,
            summary.elapsed.as_secs_f64(),
            summary.rows_loaded()
        );
        Ok(summary)
    }

    async fn step<T, F, Fut>(&self, step: Step, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        info!("Step '{step}' started");
        let started = Instant::now();
        match self.step_policy.run(step.name(), |_| op()).await {
            Ok(value) => {
                info!("Step '{step}' succeeded in {:.1}s", started.elapsed().as_secs_f64());
                Ok(value)
            }
            Err(e) => {
                let failed = AppError::step_failed(step.name(), e);
                error!("{failed}");
                Err(failed)
            }
        }
    }
}
