//! Round countdown and fixed-timestep tick scheduler for Pairup.
//!
//! Two pieces work together inside the instructor console actor:
//!
//! - [`TimerState`] is the countdown value itself. It is plain data,
//!   mutated only through `start` / `pause` / `resume` / `stop` / `tick`.
//! - [`TickScheduler`] decides *when* a tick happens. It pends while the
//!   timer is paused or stopped, and re-aligns its cadence on resume so a
//!   partial second spent paused is never counted.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = scheduler.wait_for_tick() => {
//!             if timer.tick() == TickOutcome::Expired {
//!                 scheduler.pause();
//!                 /* schedule the phase transition */
//!             }
//!         }
//!     }
//! }
//! ```

mod scheduler;
mod timer;

pub use scheduler::{TickConfig, TickInfo, TickScheduler};
pub use timer::{TickOutcome, TimerState};
