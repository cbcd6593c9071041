//! Rule engine, store, and tick scheduling for the Simfeed data simulator.
//!
//! A configuration document describes collections of items, each item
//! optionally carrying per-field update rules. This crate loads that document
//! into a [`Store`], mutates it one tick at a time with the [`RuleEngine`],
//! and drives ticks on a fixed interval with the [`UpdateScheduler`], handing
//! a [`Snapshot`] to a [`Publisher`] after each one.
//!
//! # Modules
//!
//! - [`path`] -- Dot-path get/set over nested JSON values
//! - [`constraint`] -- Clamping and rounding of numeric results
//! - [`draw`] -- Overflow-safe uniform draws
//! - [`geo`] -- Jittered drift of GeoJSON Points
//! - [`incidents`] -- Probabilistic incident synthesis and eviction
//! - [`clock`] -- Monotonic update timestamps
//! - [`store`] -- Items, collections, the store, and snapshots
//! - [`engine`] -- One tick over the store, with per-tick diagnostics
//! - [`config`] -- Configuration loading into a fresh store
//! - [`scheduler`] -- Periodic tick loop with stop control
//!
//! [`Store`]: store::Store
//! [`Snapshot`]: store::Snapshot
//! [`RuleEngine`]: engine::RuleEngine
//! [`UpdateScheduler`]: scheduler::UpdateScheduler
//! [`Publisher`]: scheduler::Publisher

pub mod clock;
pub mod config;
pub mod constraint;
pub mod draw;
pub mod engine;
pub mod geo;
pub mod incidents;
pub mod path;
pub mod scheduler;
pub mod store;
