//! Shared domain types for Windlass.
//!
//! This crate contains the core domain types used across the Windlass engine:
//! the workflow DSL (step configurations, triggers, retry and circuit-breaker
//! policy), execution envelopes, and agent definitions.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono.

pub mod agent;
pub mod workflow;
