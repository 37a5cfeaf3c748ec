//! Review-scheduling and session-state engine
//!
//! Leaf to root: `scheduler` (pure level/date math), `tasks` (daily queue)
//! and `session` (one sitting's live progression). `progress` rolls up
//! saved sessions into streak and weekly totals.

pub mod events;
pub mod models;
pub mod progress;
pub mod scheduler;
pub mod session;
pub mod tasks;

pub use events::TracingSink;
