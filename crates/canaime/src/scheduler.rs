//! Fixed-interval job scheduler on top of the Tokio timer.
//!
//! Every job gets one timer task. A tick spawns the job body as its own task,
//! so cancelling the timer (on `stop`, or when the job is replaced) never
//! interrupts a run that is already in progress.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub type Task = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Interval for job '{0}' must be greater than zero")]
    InvalidInterval(String),
    #[error("Interval for job '{0}' is too long to schedule")]
    IntervalTooLong(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

struct Job {
    task: Task,
    interval: Duration,
    timer: Option<JoinHandle<()>>,
}

impl Job {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    state: SchedulerState,
    jobs: HashMap<String, Job>,
}

/// Jobs can be registered in either state; their timers only run while the
/// scheduler is [`SchedulerState::Running`]. All methods that arm timers or
/// fire tasks must be called from within a Tokio runtime.
pub struct Scheduler {
    inner: Mutex<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SchedulerState::Stopped,
                jobs: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Arms every registered job. Does nothing if already running.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.state == SchedulerState::Running {
            return;
        }
        inner.state = SchedulerState::Running;
        for (id, job) in inner.jobs.iter_mut() {
            job.timer = Some(arm(id, &job.task, job.interval));
        }
        log::info!("Scheduler started with {} job(s)", inner.jobs.len());
    }

    /// Cancels every timer. Runs already in progress finish on their own;
    /// registrations are kept for the next [`Scheduler::start`].
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state == SchedulerState::Stopped {
            return;
        }
        inner.state = SchedulerState::Stopped;
        for job in inner.jobs.values_mut() {
            job.disarm();
        }
        log::info!("Scheduler stopped");
    }

    /// Registers `task` to run every `interval` under `job_id`, replacing any
    /// job already registered with that id. The first periodic run comes one
    /// interval after the job is armed. With `start_immediately` the task is
    /// also spawned right away, without waiting for it to finish.
    pub fn add_periodic_task<F, Fut>(
        &self,
        task: F,
        interval: Duration,
        job_id: impl Into<String>,
        start_immediately: bool,
    ) -> Result<(), SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_id = job_id.into();
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(job_id));
        }
        if Instant::now().checked_add(interval).is_none() {
            return Err(SchedulerError::IntervalTooLong(job_id));
        }

        let task: Task = Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(task()) });

        let mut inner = self.lock();
        let timer = (inner.state == SchedulerState::Running).then(|| arm(&job_id, &task, interval));
        let replaced = inner.jobs.insert(
            job_id.clone(),
            Job {
                task: Arc::clone(&task),
                interval,
                timer,
            },
        );
        drop(inner);

        if let Some(mut old) = replaced {
            old.disarm();
            log::info!("Replaced existing job '{}'", job_id);
        }
        log::info!("Job '{}' scheduled every {:?}", job_id, interval);

        if start_immediately {
            tokio::spawn(task());
            log::info!("Immediate run of job '{}' started", job_id);
        }
        Ok(())
    }

    /// Unregisters a job, cancelling its timer. Returns whether it existed.
    pub fn remove_task(&self, job_id: &str) -> bool {
        match self.lock().jobs.remove(job_id) {
            Some(mut job) => {
                job.disarm();
                log::info!("Removed job '{}'", job_id);
                true
            }
            None => false,
        }
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().jobs.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        for job in inner.jobs.values_mut() {
            job.disarm();
        }
    }
}

fn arm(job_id: &str, task: &Task, interval: Duration) -> JoinHandle<()> {
    let job_id = job_id.to_string();
    let task = Arc::clone(task);
    tokio::spawn(async move {
        let Some(first_tick) = Instant::now().checked_add(interval) else {
            log::error!("Job '{}' cannot be armed: interval {:?} overflows", job_id, interval);
            return;
        };
        let mut ticker = tokio::time::interval_at(first_tick, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            log::debug!("Running job '{}'", job_id);
            tokio::spawn(task());
        }
    })
}
