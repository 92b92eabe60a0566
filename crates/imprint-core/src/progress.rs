//! Simulated training progress and the chat gate derived from it.
//!
//! One training run per session: `Idle -> Running -> Done`, with `Done`
//! terminal. While running, a ticker task adds a bounded increment every tick
//! until the percentage reaches 100. Progress is published on a `watch`
//! channel; `SessionGate` only reads it.

use futures::future::BoxFuture;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::models::{SessionProgress, TrainingState};

/// Supplies the per-tick progress increment.
pub trait IncrementSource: Send + 'static {
    /// Next increment; callers clamp the result into `range`.
    fn next_increment(&mut self, range: RangeInclusive<u8>) -> u8;
}

/// Uniformly random increments.
pub struct RandomIncrements {
    rng: StdRng,
}

impl RandomIncrements {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomIncrements {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementSource for RandomIncrements {
    fn next_increment(&mut self, range: RangeInclusive<u8>) -> u8 {
        self.rng.random_range(range)
    }
}

/// Fixed sequence of increments; repeats the range maximum once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIncrements {
    steps: VecDeque<u8>,
}

impl ScriptedIncrements {
    pub fn new(steps: impl IntoIterator<Item = u8>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }
}

impl IncrementSource for ScriptedIncrements {
    fn next_increment(&mut self, range: RangeInclusive<u8>) -> u8 {
        self.steps.pop_front().unwrap_or(*range.end())
    }
}

/// Runs inside the training task once progress reaches 100, before `is_ready`
/// is published and before the run resolves.
pub type CompletionHook = Box<dyn FnOnce(SessionProgress) -> BoxFuture<'static, ()> + Send>;

/// Handle to a running training simulation.
#[derive(Debug)]
pub struct TrainingRun {
    handle: JoinHandle<SessionProgress>,
}

impl TrainingRun {
    /// Wait for the run to reach 100% (and for its completion hook to finish).
    pub async fn completed(self) -> Result<SessionProgress, JoinError> {
        self.handle.await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Debug)]
pub enum StartOutcome {
    Started(TrainingRun),
    /// No accepted files; state stays `Idle`.
    NothingToTrain,
    AlreadyRunning,
    /// Training already completed this session.
    AlreadyDone,
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }

    pub fn into_run(self) -> Option<TrainingRun> {
        match self {
            StartOutcome::Started(run) => Some(run),
            _ => None,
        }
    }
}

pub struct ProgressSimulator {
    progress: Arc<watch::Sender<SessionProgress>>,
    source: Mutex<Option<Box<dyn IncrementSource>>>,
    tick: Duration,
    increments: RangeInclusive<u8>,
}

impl ProgressSimulator {
    pub const DEFAULT_TICK: Duration = Duration::from_millis(300);
    pub const DEFAULT_INCREMENTS: RangeInclusive<u8> = 5..=20;

    pub fn new(
        tick: Duration,
        increments: RangeInclusive<u8>,
        source: Box<dyn IncrementSource>,
    ) -> Self {
        let (progress, _) = watch::channel(SessionProgress::default());
        Self {
            progress: Arc::new(progress),
            source: Mutex::new(Some(source)),
            tick,
            increments,
        }
    }

    pub fn from_config(config: &SessionConfig, source: Box<dyn IncrementSource>) -> Self {
        Self::new(config.tick_interval(), config.increment_range(), source)
    }

    pub fn snapshot(&self) -> SessionProgress {
        *self.progress.borrow()
    }

    pub fn state(&self) -> TrainingState {
        self.snapshot().state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionProgress> {
        self.progress.subscribe()
    }

    pub fn gate(&self) -> SessionGate {
        SessionGate::new(self.subscribe())
    }

    pub fn start(&self, accepted_files: usize) -> StartOutcome {
        self.start_with(accepted_files, None)
    }

    /// Start the run, calling `on_complete` once inside the run when it reaches 100%.
    pub fn start_with(
        &self,
        accepted_files: usize,
        on_complete: Option<CompletionHook>,
    ) -> StartOutcome {
        if accepted_files == 0 {
            tracing::debug!("Training not started: no accepted files");
            return StartOutcome::NothingToTrain;
        }

        let mut refused = None;
        self.progress.send_if_modified(|progress| match progress.state() {
            TrainingState::Done => {
                refused = Some(StartOutcome::AlreadyDone);
                false
            }
            TrainingState::Running => {
                refused = Some(StartOutcome::AlreadyRunning);
                false
            }
            TrainingState::Idle => {
                *progress = SessionProgress::running();
                true
            }
        });
        if let Some(outcome) = refused {
            tracing::debug!(?outcome, "Training start ignored");
            return outcome;
        }

        let mut source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| Box::new(RandomIncrements::new()));

        tracing::info!(accepted_files, "Training started");

        let progress = Arc::clone(&self.progress);
        let tick = self.tick;
        let increments = self.increments.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + tick, tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut percent: u8 = 0;

            loop {
                ticker.tick().await;
                let step = source
                    .next_increment(increments.clone())
                    .clamp(*increments.start(), *increments.end());
                percent = percent.saturating_add(step).min(100);
                tracing::debug!(percent, "Training tick");
                if percent == 100 {
                    break;
                }
                progress.send_modify(|p| p.percent = percent);
            }

            let finished = SessionProgress {
                percent: 100,
                is_running: false,
                is_ready: true,
            };
            // The hook finishes before the gate opens.
            if let Some(hook) = on_complete {
                hook(finished).await;
            }
            progress.send_replace(finished);
            tracing::info!("Training complete");
            finished
        });

        StartOutcome::Started(TrainingRun { handle })
    }
}

/// Chat availability, derived from training progress.
#[derive(Debug, Clone)]
pub struct SessionGate {
    progress: watch::Receiver<SessionProgress>,
}

impl SessionGate {
    pub fn new(progress: watch::Receiver<SessionProgress>) -> Self {
        Self { progress }
    }

    /// A gate that is already open, for chat logs used without training.
    pub fn open() -> Self {
        let (_, progress) = watch::channel(SessionProgress {
            percent: 100,
            is_running: false,
            is_ready: true,
        });
        Self { progress }
    }

    pub fn is_open(&self) -> bool {
        self.progress.borrow().is_ready
    }

    /// Resolve once the gate opens. Returns false if the progress source went
    /// away while the gate was still closed.
    pub async fn wait_open(&self) -> bool {
        let mut progress = self.progress.clone();
        let opened = progress.wait_for(|p| p.is_ready).await.is_ok();
        opened
    }
}
