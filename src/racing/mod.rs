//! Racing module: the race state machine, the ghost it races against, and
//! the session loop that drives both from trainer telemetry.

pub mod checkpoint;
pub mod countdown;
pub mod engine;
pub mod ghost;
pub mod gradient;
pub mod results;
pub mod session;

// Re-export commonly used types
pub use checkpoint::{evenly_spaced, Checkpoint, CheckpointTime, CheckpointTracker};
pub use countdown::{Countdown, CountdownEvent};
pub use engine::{RaceConfig, RaceEngine, RaceError, RacePhase, RaceState, TickOutcome};
pub use ghost::{Ghost, GhostPosition, RecordRun, StoredCheckpointTime, StoredRecordRun};
pub use gradient::{GradientSmoother, GradientThrottle};
pub use results::{is_new_record, HighScore, LapResult, PaceScore, RunSubmission};
pub use session::{PowerSource, RaceSession, SessionCommand, SessionOptions, SessionResult};
