//! Batch task runner. Executes a list of independent, retryable tasks against an unreliable
//! remote, either one at a time with a throttle or on a bounded worker pool, and collects
//! the successful results.
//!
//! The batch is best effort: a task that fails every attempt is logged and left out of the
//! aggregate, so a run of N tasks may return fewer than N results. Callers that need
//! completeness compare the aggregate size (or [RunStats]) against what they submitted.
//!
//! Result order is submission order for sequential runs and completion order for
//! concurrent runs. Completion order differs between runs.

mod aggregate;
mod error;
mod progress;
mod retry;
mod strategy;

pub use aggregate::{Aggregation, AggregationMode, ResultAggregator, Tally};
pub use error::{ConfigError, ExecutionError, RunnerError};
pub use progress::{bars, page_spinner, NoProgress, Progress, TerminalProgress};
pub use retry::{Outcome, RetryPolicy};
pub use strategy::Strategy;

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// One unit of work. Called at most `retries + 1` times; must capture its input by value.
pub type Task<T> = Box<dyn Fn() -> Result<T, ExecutionError> + Send + Sync>;

/// Box a closure as a [Task].
pub fn task<T, F>(f: F) -> Task<T>
where
    F: Fn() -> Result<T, ExecutionError> + Send + Sync + 'static,
{
    Box::new(f)
}

const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Immutable description of one run. Build with [RunConfig::builder].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    concurrent: bool,
    max_workers: usize,
    inter_task_delay: Duration,
    retries: u32,
    retry_delay: Duration,
    progress_label: String,
    progress_unit: String,
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    pub fn concurrent(&self) -> bool {
        self.concurrent
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Pause between tasks in sequential mode. Ignored by the worker pool.
    pub fn inter_task_delay(&self) -> Duration {
        self.inter_task_delay
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn progress_label(&self) -> &str {
        &self.progress_label
    }

    pub fn progress_unit(&self) -> &str {
        &self.progress_unit
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.retry_delay)
    }
}

/// Builder for [RunConfig]. Validation happens in [build](RunConfigBuilder::build).
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    concurrent: Option<bool>,
    max_workers: usize,
    inter_task_delay_ms: u64,
    retries: u32,
    retry_delay_ms: u64,
    progress_label: String,
    progress_unit: String,
}

impl Default for RunConfigBuilder {
    fn default() -> Self {
        Self {
            concurrent: None,
            max_workers: DEFAULT_MAX_WORKERS,
            inter_task_delay_ms: 0,
            retries: 0,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            progress_label: String::new(),
            progress_unit: "items".to_string(),
        }
    }
}

impl RunConfigBuilder {
    /// Force the strategy. If never called, a run is concurrent exactly when
    /// `max_workers > 1`.
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = Some(concurrent);
        self
    }

    /// Worker pool size (default 4). Must be at least 1.
    pub fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    /// Delay between tasks in milliseconds, sequential mode only (default 0).
    pub fn inter_task_delay_ms(mut self, ms: u64) -> Self {
        self.inter_task_delay_ms = ms;
        self
    }

    /// Retries after the first failed attempt (default 0).
    pub fn retries(mut self, n: u32) -> Self {
        self.retries = n;
        self
    }

    /// Delay between a failed attempt and the next one, in milliseconds (default 1000).
    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    pub fn progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = label.into();
        self
    }

    pub fn progress_unit(mut self, unit: impl Into<String>) -> Self {
        self.progress_unit = unit.into();
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidWorkers(self.max_workers));
        }
        Ok(RunConfig {
            concurrent: self.concurrent.unwrap_or(self.max_workers > 1),
            max_workers: self.max_workers,
            inter_task_delay: Duration::from_millis(self.inter_task_delay_ms),
            retries: self.retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            progress_label: self.progress_label,
            progress_unit: self.progress_unit,
        })
    }
}

/// Lifecycle of a [TaskRunner].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Settled,
}

/// Summary of a settled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub submitted: usize,
    pub succeeded: usize,
    /// Tasks whose every attempt failed.
    pub failed: usize,
    pub elapsed: Duration,
}

/// Single-use orchestrator: owns a task list and a config, runs the batch once, then holds
/// the aggregate.
///
/// `A` picks the aggregation: `Vec<T>` for a sequence, `HashMap<K, V>` for a keyed run
/// whose tasks return `(K, V)`.
pub struct TaskRunner<T, A = Vec<T>> {
    tasks: Vec<Task<T>>,
    config: RunConfig,
    progress: Box<dyn Progress>,
    state: RunState,
    results: Option<A>,
    stats: Option<RunStats>,
}

/// Runner collecting values in a `Vec`.
pub type SequenceRunner<T> = TaskRunner<T, Vec<T>>;

/// Runner collecting `(key, value)` results in a `HashMap`.
pub type KeyedRunner<K, V> = TaskRunner<(K, V), HashMap<K, V>>;

impl<T, A> TaskRunner<T, A>
where
    T: Send,
    A: Aggregation<T>,
{
    pub fn new(tasks: Vec<Task<T>>, config: RunConfig) -> Self {
        Self {
            tasks,
            config,
            progress: Box::new(NoProgress),
            state: RunState::Created,
            results: None,
            stats: None,
        }
    }

    /// Replace the progress sink (default: none).
    pub fn with_progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn aggregation_mode(&self) -> AggregationMode {
        A::MODE
    }

    pub fn strategy(&self) -> Strategy {
        Strategy::for_config(&self.config)
    }

    /// Run the whole batch, blocking until every task has settled. Afterwards the aggregate
    /// is available from [results](Self::results). A runner can be started once.
    pub fn start(&mut self) -> Result<(), RunnerError> {
        if self.state != RunState::Created {
            return Err(RunnerError::AlreadyStarted);
        }
        self.state = RunState::Running;
        let (results, stats) = execute(&self.tasks, &self.config, self.progress.as_ref());
        self.results = Some(results);
        self.stats = Some(stats);
        self.state = RunState::Settled;
        Ok(())
    }

    /// Aggregate of a settled run; `None` before [start](Self::start) has returned.
    pub fn results(&self) -> Option<&A> {
        self.results.as_ref()
    }

    pub fn into_results(self) -> Option<A> {
        self.results
    }

    pub fn stats(&self) -> Option<RunStats> {
        self.stats
    }
}

fn execute<T, A>(tasks: &[Task<T>], config: &RunConfig, progress: &dyn Progress) -> (A, RunStats)
where
    T: Send,
    A: Aggregation<T>,
{
    let strategy = Strategy::for_config(config);
    if let Strategy::Concurrent { .. } = strategy {
        if !config.inter_task_delay().is_zero() {
            tracing::debug!("inter-task delay is ignored by the worker pool");
        }
    }
    tracing::info!(
        label = config.progress_label(),
        tasks = tasks.len(),
        ?strategy,
        retries = config.retries(),
        "starting batch"
    );

    let started = Instant::now();
    let sink: ResultAggregator<A> = ResultAggregator::new();
    progress.start(
        tasks.len() as u64,
        config.progress_label(),
        config.progress_unit(),
    );
    strategy.execute(tasks, &config.retry_policy(), &sink, progress);
    progress.finish();

    let (aggregate, tally) = sink.into_parts();
    let stats = RunStats {
        submitted: tasks.len(),
        succeeded: tally.succeeded,
        failed: tally.failed,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        label = config.progress_label(),
        succeeded = stats.succeeded,
        failed = stats.failed,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "batch settled"
    );
    (aggregate, stats)
}

/// Run `tasks` and return the values in aggregation order.
pub fn run_sequence<T: Send>(
    tasks: Vec<Task<T>>,
    config: &RunConfig,
    progress: &dyn Progress,
) -> (Vec<T>, RunStats) {
    execute(&tasks, config, progress)
}

/// Run `(key, value)` tasks and return the keyed mapping.
pub fn run_keyed<K, V>(
    tasks: Vec<Task<(K, V)>>,
    config: &RunConfig,
    progress: &dyn Progress,
) -> (HashMap<K, V>, RunStats)
where
    K: Eq + Hash + Send,
    V: Send,
{
    execute(&tasks, config, progress)
}
