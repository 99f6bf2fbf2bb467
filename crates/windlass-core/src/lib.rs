//! Windlass execution engine.
//!
//! Interprets a declarative step graph (the workflow DSL) and an agent tool
//! plan, drives them to completion with retries, conditional branching,
//! fallback routing, and circuit breaking, and reports structured results.
//!
//! The engine is embedded: callers construct registries, register
//! definitions, and issue `execute()` calls. Persistence, trigger scheduling,
//! and delivery channels are external collaborators.

pub mod agent;
pub mod workflow;
