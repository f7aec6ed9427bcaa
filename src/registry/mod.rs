//! Relay registry and supervisor
//!
//! The registry maps each camera to its single live relay connection and
//! hands out the latest frame to any number of readers.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<RelaySupervisor>
//!                   ┌──────────────────────────────┐
//!                   │ clients: HashMap<CameraId,   │
//!                   │   Arc<RelayEntry> {          │
//!                   │     last_frame, frame_rate,  │
//!                   │     last_access, task        │
//!                   │   }                          │
//!                   │ >                            │
//!                   │ last_erroneous_close         │
//!                   └──────────────┬───────────────┘
//!                                  │
//!        ┌─────────────────────────┼─────────────────────────┐
//!        │                         │                         │
//!        ▼                         ▼                         ▼
//!   [relay task]              get_frame()               sweep (every
//!   socket → parser           get_fps()                 frame_timeout)
//!   → push_frame()            (never await)             stall / idle
//! ```
//!
//! # Recovery
//!
//! A stalled connection or two erroneous closes within one frame timeout
//! are taken as a sign that the shared capture process is unhealthy: the
//! supervisor stops it, drops every connection, and schedules a start.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod config;
pub mod entry;
pub mod frame;
pub mod store;

pub use config::SupervisorConfig;
pub use entry::RelayEntry;
pub use frame::{CameraId, Frame};
pub use store::{RelaySupervisor, SweepReport};

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
