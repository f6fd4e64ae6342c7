//! PICNew training-registration core.
//!
//! The crate is organized around the registration workflow: shareable
//! invitation links, anonymous public submissions, and the admin review
//! state machine. Persistence and outbound mail are reached through the
//! traits in [`workflows::registration`], so the composition root decides
//! which adapters back them.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
