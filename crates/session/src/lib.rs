//! `vitrina-session` — session lifecycle for the storefront client.
//!
//! Owns the authentication state machine for both principal kinds (staff
//! user, storefront client), the background token renewal task, and the
//! persisted session subset in `vitrina-store`.

pub mod clock;
pub mod manager;
pub mod scheduler;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{RefreshOutcome, SessionManager};
pub use scheduler::SchedulerConfig;
