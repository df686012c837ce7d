//! Core domain types
//!
//! These types describe what the monitor tracks (workflow snapshots) and what
//! it shows to the user (notifications). They carry no behaviour beyond
//! merging and classification.

pub mod notification;
pub mod workflow;
