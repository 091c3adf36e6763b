//! Window scheduler.
//!
//! Polls the clock every `poll_interval`; when local time falls inside a
//! configured window it runs one batch to completion, then goes back to
//! waiting. Batch errors are logged and swallowed so polling continues.

mod window;

pub use window::{within_any, ExecutionWindow, WindowError};

use std::future::Future;
use std::time::Duration;

use crate::clock::Clock;

/// Scheduler state: waiting for the next tick, or a batch in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Current time is outside every window; nothing ran.
    OutsideWindow,
    /// A batch ran and returned Ok.
    Completed,
    /// A batch ran and returned an error (already logged).
    Failed,
    /// A batch was already in flight; nothing new was started.
    Busy,
}

pub struct WindowScheduler<C: Clock> {
    windows: Vec<ExecutionWindow>,
    poll_interval: Duration,
    clock: C,
    state: SchedulerState,
}

impl<C: Clock> WindowScheduler<C> {
    pub fn new(windows: Vec<ExecutionWindow>, poll_interval: Duration, clock: C) -> Self {
        Self {
            windows,
            poll_interval,
            clock,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// True when the clock currently reads inside a window.
    pub fn is_eligible(&self) -> bool {
        within_any(&self.windows, self.clock.now())
    }

    /// One poll: if eligible and idle, run `batch` to completion.
    pub async fn tick<F, Fut, T, E>(&mut self, batch: F) -> TickOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if self.state == SchedulerState::Running {
            return TickOutcome::Busy;
        }
        let now = self.clock.now();
        if !within_any(&self.windows, now) {
            tracing::debug!("outside execution windows at {}, waiting", now.format("%H:%M:%S"));
            return TickOutcome::OutsideWindow;
        }

        tracing::info!("inside execution window at {}, starting batch", now.format("%H:%M:%S"));
        self.state = SchedulerState::Running;
        let result = batch().await;
        self.state = SchedulerState::Idle;

        match result {
            Ok(_) => TickOutcome::Completed,
            Err(e) => {
                tracing::error!("batch failed: {:#}", e);
                TickOutcome::Failed
            }
        }
    }

    /// Polls `ticks` times, sleeping `poll_interval` after each poll.
    pub async fn run_ticks<F, Fut, T, E>(&mut self, ticks: u64, mut batch: F) -> Vec<TickOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut outcomes = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            outcomes.push(self.tick(&mut batch).await);
            self.clock.sleep(self.poll_interval).await;
        }
        outcomes
    }

    /// Polls forever. Process termination is the only way out.
    pub async fn run<F, Fut, T, E>(&mut self, mut batch: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let windows: Vec<String> = self.windows.iter().map(|w| w.to_string()).collect();
        tracing::info!(
            "scheduler started; windows {:?}, poll every {}s",
            windows,
            self.poll_interval.as_secs()
        );
        loop {
            self.tick(&mut batch).await;
            self.clock.sleep(self.poll_interval).await;
        }
    }
}
