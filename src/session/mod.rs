//! Per-community playback state: the queue, its connection and the
//! registry/scheduler that own them.

pub mod connection;
pub mod progress;
pub mod queue;
pub mod registry;
pub mod scheduler;

pub use connection::{ConnectionState, PlayerConnection};
pub use progress::{LIVE_MARKER, format_timestamp, progress_indicator};
pub use queue::{LoopMode, PlaybackSession, SessionMetadata, validate_volume};
pub use registry::{SessionRegistry, SessionSlot};
pub use scheduler::{ScheduledTask, Scheduler};
