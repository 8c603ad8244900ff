// ABOUTME: Bringing an application up: start order, sequencing and readiness waits.
// ABOUTME: Everything here talks to the engine only through the capability traits.

mod order;
mod readiness;
mod sequencer;
mod terminal;
mod wait_mode;

pub use order::{OrderedService, app_order, start_order};
pub use readiness::{Marker, OutputScanner, ReadinessMonitor, Scanned, find_marker};
pub use sequencer::{Deployed, Sequencer};
pub use terminal::{DETACH_SEQUENCE, RawModeGuard, ResizeEvents, StdinBridge, current_size};
pub use wait_mode::WaitMode;
