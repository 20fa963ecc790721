// Time-windowed streaming playback and multi-view synchronization engine
//
// Drives VCR-style replay of large time-series sessions across multiple
// simultaneously-displayed views:
// - `eligibility`: filter pipeline producing the set of playable time indices
// - `window`: time-bounded slicing around the playback cursor
// - `downsample`: LTTB / min-max reduction to a display-safe point budget
// - `controller`: stopped/playing/paused state machine with loop/seek/tick
// - `sync`: view subscription registry and update fan-out
// - `engine`: composes the above into one object per playback session
//
// The engine is purely reactive: an external timer drives `tick()`, the
// engine never blocks and never touches a display surface.

pub mod controller;
pub mod downsample;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod sync;
pub mod types;
pub mod window;

pub use controller::{PlaybackController, TickOutcome};
pub use engine::{EngineConfig, StreamingEngine};
pub use error::{PlaybackError, Result};
pub use sync::{DispatchStats, SubscriptionGuard, SyncHub, UpdateCallback, ViewSink, ViewSubscription};
pub use types::*;
