//! Shared type definitions for the Simfeed data simulator.
//!
//! This crate is the single source of truth for the declarative pieces of a
//! simulation: the rule vocabulary attached to item fields, the collection
//! kinds, and the incident objects synthesized by the incident generator.
//!
//! # Modules
//!
//! - [`enums`] -- Collection kinds, incident types, and severities
//! - [`rules`] -- The closed [`Rule`] sum type and its parameter structs
//! - [`incident`] -- The [`Incident`] annotation object
//! - [`lenient`] -- Forgiving deserializers for rule parameters

pub mod enums;
pub mod incident;
pub mod lenient;
pub mod rules;

// Re-export all public types at crate root for convenience.
pub use enums::{CollectionKind, IncidentType, Severity};
pub use incident::Incident;
pub use rules::{ChoiceRule, FloatRule, GeoBounds, GeoMovementRule, IncidentRule, IntRule, Rule};
