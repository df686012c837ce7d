//! Flowwatch Monitor
//!
//! Client-side scheduling for tracking remote workflows:
//!
//! - [`poller`]: at most one recurring fetch per workflow, started while the
//!   job is running and torn down when it finishes or its view goes away
//! - [`notify`]: transient notifications, each expiring on its own timer
//! - [`view`]: per-page adapter that owns polling sessions and reports
//!   failures through notifications
//!
//! Everything runs on Tokio. Timers come from [`timer`], which is the only
//! place that spawns tasks.

pub mod config;
pub mod error;
pub mod notify;
pub mod poller;
pub mod service;
pub mod timer;
pub mod view;

#[cfg(test)]
mod testing;

pub use config::MonitorConfig;
pub use error::NotifyError;
pub use notify::NotificationQueue;
pub use poller::{PollEvent, PollingSessionManager};
pub use service::JobService;
pub use view::WorkflowView;
