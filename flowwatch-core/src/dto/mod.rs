//! Data Transfer Objects
//!
//! Request and response bodies exchanged with the remote workflow API.

pub mod workflow;
