//! Execution strategies: sequential with throttle, and a bounded worker pool.

use super::aggregate::{Aggregation, ResultAggregator};
use super::progress::Progress;
use super::retry::RetryPolicy;
use super::{RunConfig, Task};
use crossbeam_channel::Receiver;
use std::thread;
use std::time::Duration;

/// How a batch is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One task at a time in submission order, sleeping `delay` between tasks.
    Sequential { delay: Duration },
    /// Exactly `workers` threads pulling tasks from a shared queue. No inter-task delay.
    Concurrent { workers: usize },
}

impl Strategy {
    pub fn for_config(config: &RunConfig) -> Self {
        if config.concurrent() {
            Strategy::Concurrent {
                workers: config.max_workers(),
            }
        } else {
            Strategy::Sequential {
                delay: config.inter_task_delay(),
            }
        }
    }

    pub(crate) fn execute<T, A>(
        &self,
        tasks: &[Task<T>],
        policy: &RetryPolicy,
        sink: &ResultAggregator<A>,
        progress: &dyn Progress,
    ) where
        T: Send,
        A: Aggregation<T>,
    {
        match *self {
            Strategy::Sequential { delay } => run_sequential(tasks, policy, sink, progress, delay),
            Strategy::Concurrent { workers } => {
                run_concurrent(tasks, policy, sink, progress, workers)
            }
        }
    }
}

fn run_sequential<T, A>(
    tasks: &[Task<T>],
    policy: &RetryPolicy,
    sink: &ResultAggregator<A>,
    progress: &dyn Progress,
    delay: Duration,
) where
    A: Aggregation<T>,
{
    for (index, task) in tasks.iter().enumerate() {
        sink.record(policy.invoke(index, task), progress);
        let has_next = index + 1 < tasks.len();
        if has_next && !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

fn run_concurrent<T, A>(
    tasks: &[Task<T>],
    policy: &RetryPolicy,
    sink: &ResultAggregator<A>,
    progress: &dyn Progress,
    workers: usize,
) where
    T: Send,
    A: Aggregation<T>,
{
    let (tx_task, rx_task) = crossbeam_channel::unbounded::<(usize, &Task<T>)>();
    for job in tasks.iter().enumerate() {
        // Receiver is alive until the scope below ends.
        tx_task.send(job).ok();
    }
    drop(tx_task);

    thread::scope(|scope| {
        let mut spawned = 0;
        for id in 0..workers.min(tasks.len()) {
            let rx_task = rx_task.clone();
            let worker = thread::Builder::new()
                .name(format!("runner-{id}"))
                .spawn_scoped(scope, move || drain(&rx_task, policy, sink, progress));
            match worker {
                Ok(_) => spawned += 1,
                Err(e) => tracing::warn!(worker = id, error = %e, "could not spawn worker"),
            }
        }
        if spawned == 0 && !tasks.is_empty() {
            tracing::warn!("no worker threads available, running batch on the calling thread");
            drain(&rx_task, policy, sink, progress);
        }
    });
}

/// Worker loop: pull the next unsubmitted task until the queue is empty.
fn drain<T, A>(
    rx_task: &Receiver<(usize, &Task<T>)>,
    policy: &RetryPolicy,
    sink: &ResultAggregator<A>,
    progress: &dyn Progress,
) where
    A: Aggregation<T>,
{
    for (index, task) in rx_task.iter() {
        sink.record(policy.invoke(index, task), progress);
    }
}
