//! Flowwatch Core
//!
//! Core types shared by the Flowwatch client, monitor and CLI.
//!
//! This crate contains:
//! - Domain types: workflows, job status, snapshots and notifications
//! - DTOs: request/response bodies of the remote workflow API

pub mod domain;
pub mod dto;
