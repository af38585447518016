//! Level generator engine - runs one generation at a time on a worker thread
//!
//! The caller starts a generation, then polls [`LevelGenerator::status`]
//! (or blocks in [`LevelGenerator::wait`]). The worker owns the grid for the
//! whole run and writes its result into a once-cell before publishing the
//! final status, so a `Complete` read always sees the finished level.
//! Cancellation is cooperative through a shared abort flag.

use crate::snapshot::{level_to_bytes, SnapshotError};
use pipegen_logic::builder::BuildError;
use pipegen_logic::level::{plan_level, GeneratedLevel};
use pipegen_logic::options::{GenerateOptions, OptionsError};
use pipegen_logic::pieces::PipeSegment;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

/// Externally visible generator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GeneratorStatus {
    Idle = 0,
    Generating = 1,
    Canceling = 2,
    Failed = 3,
    Complete = 4,
}

impl GeneratorStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Generating,
            2 => Self::Canceling,
            3 => Self::Failed,
            4 => Self::Complete,
            _ => Self::Idle,
        }
    }

    /// The run has ended and its outputs are readable.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Failed | Self::Complete)
    }
}

/// A generation request rejected before any worker started.
#[derive(Debug)]
pub enum StartError {
    Options(OptionsError),
    Spawn(std::io::Error),
}

impl From<OptionsError> for StartError {
    fn from(e: OptionsError) -> Self {
        StartError::Options(e)
    }
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::Options(e) => write!(f, "Invalid options: {}", e),
            StartError::Spawn(e) => write!(f, "Unable to start generator thread: {}", e),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartError::Options(e) => Some(e),
            StartError::Spawn(e) => Some(e),
        }
    }
}

type WorkerResult = Result<GeneratedLevel, BuildError>;

/// State shared with one run's worker thread. Every run gets a fresh one,
/// so dropping it is what clears a previous run's outputs.
struct Shared {
    status: AtomicU8,
    abort: AtomicBool,
    /// Written once by the worker, before it publishes its final status
    result: OnceLock<WorkerResult>,
}

impl Shared {
    fn idle() -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU8::new(GeneratorStatus::Idle as u8),
            abort: AtomicBool::new(false),
            result: OnceLock::new(),
        })
    }

    fn status(&self) -> GeneratorStatus {
        GeneratorStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: GeneratorStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Store the outcome, then publish it unless a cancel got there first.
    fn finish(&self, result: WorkerResult) {
        let status = if result.is_ok() {
            GeneratorStatus::Complete
        } else {
            GeneratorStatus::Failed
        };
        let _ = self.result.set(result);
        let _ = self.status.compare_exchange(
            GeneratorStatus::Generating as u8,
            status as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Main level generator
pub struct LevelGenerator {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl LevelGenerator {
    /// Create an idle generator
    pub fn new() -> Self {
        Self {
            shared: Shared::idle(),
            worker: None,
        }
    }

    /// Start generating a level in the background.
    ///
    /// Any generation already in flight is cancelled and joined first. On
    /// `Err` no worker was started and the status is `Idle`.
    pub fn generate_level(&mut self, options: &GenerateOptions) -> Result<(), StartError> {
        self.cancel_level();

        let plan = plan_level(options)?;
        self.shared.set_status(GeneratorStatus::Generating);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("level-generator".into())
            .spawn(move || {
                let result = plan.run(&shared.abort);
                shared.finish(result);
            });

        match spawned {
            Ok(handle) => {
                log::info!("Generating level {}", options.level);
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                log::error!("Unable to start generator thread: {e}");
                self.shared.set_status(GeneratorStatus::Idle);
                Err(StartError::Spawn(e))
            }
        }
    }

    /// Cancel any in-flight generation and block until the worker unwinds.
    /// Outputs are cleared and the status returns to `Idle`.
    pub fn cancel_level(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.shared.abort.store(true, Ordering::Release);
            self.shared.set_status(GeneratorStatus::Canceling);

            if handle.join().is_err() {
                log::error!("Generator thread panicked while canceling");
            }
            log::debug!("Generator worker joined");
        }

        self.shared = Shared::idle();
    }

    /// Current status (non-blocking). Once this reads `Complete` the output
    /// lists are populated.
    pub fn status(&self) -> GeneratorStatus {
        self.shared.status()
    }

    /// Current status, reaping the worker thread if it has exited.
    pub fn poll(&mut self) -> GeneratorStatus {
        if self.worker.as_ref().is_some_and(|h| h.is_finished()) {
            self.reap();
        }
        self.status()
    }

    /// Block until the current generation finishes.
    pub fn wait(&mut self) -> GeneratorStatus {
        self.reap();
        self.status()
    }

    fn reap(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        if handle.join().is_err() {
            log::error!("Generator thread panicked");
            self.shared.set_status(GeneratorStatus::Failed);
        }
    }

    /// The worker's outcome, visible only once the status is final
    fn outcome(&self) -> Option<&WorkerResult> {
        if self.status().is_finished() {
            self.shared.result.get()
        } else {
            None
        }
    }

    /// Fixed segments of the completed level
    pub fn realized_pipes(&self) -> &[PipeSegment] {
        self.level().map_or(&[], |l| l.realized.as_slice())
    }

    /// Movable segments of the completed level, sorted by type
    pub fn virtual_pipes(&self) -> &[PipeSegment] {
        self.level().map_or(&[], |l| l.virtual_pipes.as_slice())
    }

    /// The completed level, once the status reads `Complete`
    pub fn level(&self) -> Option<&GeneratedLevel> {
        self.outcome().and_then(|r| r.as_ref().ok())
    }

    /// Why the last run failed
    pub fn last_error(&self) -> Option<&BuildError> {
        self.outcome().and_then(|r| r.as_ref().err())
    }

    /// Binary snapshot of the completed level
    pub fn snapshot(&self) -> Option<Result<Vec<u8>, SnapshotError>> {
        self.level().map(level_to_bytes)
    }
}

impl Default for LevelGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LevelGenerator {
    fn drop(&mut self) {
        self.cancel_level();
    }
}
